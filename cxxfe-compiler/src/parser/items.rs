//! Top-level and member declaration parsing (spec §3.3 `Item`, §4.4's
//! function/struct/namespace grammar).
//!
//! Grounded on `vex-parser/src/parser/items.rs`'s top-level dispatch loop,
//! generalized to C++'s struct member list (fields, constructors,
//! destructors, operator overloads including the defaulted `<=>`) and to
//! namespace/template-declaration nesting. A declared (non-template)
//! struct or function is registered with the `TemplateInstantiator` the
//! same way a template pattern is — `register_concrete_struct` just skips
//! the canonical-name suffixing a real instantiation would apply — so
//! `codegen` never needs to special-case "was this type ever instantiated".

use cxxfe_ast::ast::*;
use cxxfe_ast::loc::SourceLoc;
use cxxfe_lexer::stream::TokenStream;
use cxxfe_lexer::token::{Keyword, Punct, TokenKind};

use crate::symbols::{ScopeKind, SymbolEntry, Upgrade};
use super::{ParseError, Parser};

/// What a single pass through a struct's member-list loop produced.
enum Member {
    Field(FieldNode),
    Method(FunctionId),
}

impl<'a, S: TokenStream> Parser<'a, S> {
    /// Parses one top-level declaration, or `None` for a stray `;`.
    pub(crate) fn parse_top_level(&mut self) -> Result<Option<ItemId>, ParseError> {
        if self.match_punct(Punct::Semicolon) {
            return Ok(None);
        }

        if self.check_punct(Punct::Hash) {
            self.parse_pragma()?;
            return Ok(None);
        }

        if self.match_keyword(Keyword::StaticAssert) {
            let (cond, message) = self.parse_static_assert_clause()?;
            return Ok(Some(self.alloc_item(Item::StaticAssert { cond, message })));
        }

        if self.match_keyword(Keyword::Namespace) {
            return self.parse_namespace_item().map(Some);
        }

        // Top-level `using namespace ...;` / `using name = ...;` are
        // accepted and their effect on lookup recorded, but they produce no
        // `Item` of their own — there is nothing for `Program.items` to
        // hold that isn't already captured by the symbol table's
        // using-directive/alias bookkeeping.
        if self.match_keyword(Keyword::Using) {
            self.parse_top_level_using()?;
            return Ok(None);
        }
        if self.match_keyword(Keyword::Typedef) {
            let _ty = self.parse_type_specifier()?;
            let _name = self.consume_identifier("as typedef name")?;
            self.consume_punct(Punct::Semicolon, "after typedef")?;
            return Ok(None);
        }

        if self.check_keyword(Keyword::Template) {
            return self.parse_template_item().map(Some);
        }

        if self.check_keyword(Keyword::Struct) || self.check_keyword(Keyword::Class) || self.check_keyword(Keyword::Union) {
            let struct_id = self.parse_struct_decl(Vec::new(), false)?;
            let name = self.arena().strukt(struct_id).name;
            // Direct field access (not `arena()`/`instantiator_mut()`) so the
            // borrow checker sees two disjoint fields rather than two
            // overlapping whole-`self` borrows.
            self.instantiator.register_concrete_struct(&*self.arena, struct_id);
            self.symbols_mut().insert(name, SymbolEntry::Struct(struct_id), |a, b| {
                if a == b { Upgrade::Identical } else { Upgrade::ReplaceExisting }
            });
            return Ok(Some(self.alloc_item(Item::Struct(struct_id))));
        }

        self.parse_function_or_global_var_item().map(Some)
    }

    /// `#pragma ...`. Only `#pragma pack(...)` (spec §4.4) has an observable
    /// effect; any other directive's parenthesized argument list (if any) is
    /// skipped so the token stream stays in sync without the parser needing
    /// to know what the directive means.
    fn parse_pragma(&mut self) -> Result<(), ParseError> {
        self.consume_punct(Punct::Hash, "to start a preprocessor directive")?;
        let directive = self.consume_identifier("after '#'")?;
        if self.interner().view_str(directive) != "pragma" {
            return Err(self.error("only '#pragma' directives are supported"));
        }
        let name = self.consume_identifier("after '#pragma'")?;
        if self.interner().view_str(name) == "pack" {
            self.parse_pragma_pack()?;
        } else if self.match_punct(Punct::LParen) {
            let mut depth = 1;
            while depth > 0 && !self.is_at_end() {
                if self.match_punct(Punct::LParen) {
                    depth += 1;
                } else if self.match_punct(Punct::RParen) {
                    depth -= 1;
                } else {
                    self.advance();
                }
            }
        }
        Ok(())
    }

    /// `#pragma pack(N)`, `#pragma pack(push[, N])`, `#pragma pack(pop)`, or
    /// `#pragma pack()`, syncing the result into the instantiator so
    /// `compute_struct_layout` sees it on the very next struct it lays out.
    fn parse_pragma_pack(&mut self) -> Result<(), ParseError> {
        self.consume_punct(Punct::LParen, "after '#pragma pack'")?;
        if self.check_punct(Punct::RParen) {
            while self.ctx.current_pack_alignment().is_some() {
                self.ctx.pop_pack();
            }
        } else if self.check_identifier() && self.peek().text == "push" {
            self.advance();
            let alignment = if self.match_punct(Punct::Comma) {
                let tok = self.advance();
                tok.text.parse::<u32>().ok()
            } else {
                None
            };
            self.ctx.push_pack(alignment.or_else(|| self.ctx.current_pack_alignment()).unwrap_or(8));
        } else if self.check_identifier() && self.peek().text == "pop" {
            self.advance();
            self.ctx.pop_pack();
        } else {
            let tok = self.advance();
            if let Ok(n) = tok.text.parse::<u32>() {
                self.ctx.push_pack(n);
            }
        }
        self.consume_punct(Punct::RParen, "to close '#pragma pack'")?;
        self.instantiator.set_pack_alignment(self.ctx.current_pack_alignment());
        Ok(())
    }

    fn parse_static_assert_clause(&mut self) -> Result<(ExprId, Option<StringHandle>), ParseError> {
        self.consume_punct(Punct::LParen, "after 'static_assert'")?;
        let cond = self.parse_expression()?;
        let message = if self.match_punct(Punct::Comma) {
            if let TokenKind::StringLiteral = self.peek().kind {
                let tok = self.advance();
                Some(self.interner().intern_str(&tok.text))
            } else {
                None
            }
        } else {
            None
        };
        self.consume_punct(Punct::RParen, "to close 'static_assert'")?;
        self.consume_punct(Punct::Semicolon, "after 'static_assert'")?;
        Ok((cond, message))
    }

    fn parse_namespace_item(&mut self) -> Result<ItemId, ParseError> {
        let name = self.consume_identifier("as namespace name")?;
        self.consume_punct(Punct::LBrace, "to open namespace body")?;
        self.symbols_mut().push_namespace(name);

        let mut items = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if let Some(id) = self.parse_top_level()? {
                items.push(id);
            }
        }

        self.symbols_mut().pop_namespace();
        self.consume_punct(Punct::RBrace, "to close namespace body")?;
        Ok(self.alloc_item(Item::Namespace { name, items }))
    }

    /// `using namespace ns;`, `using ns::name;`, or `using Alias = Type;` at
    /// file scope.
    fn parse_top_level_using(&mut self) -> Result<(), ParseError> {
        if self.match_keyword(Keyword::Namespace) {
            let mut path = vec![self.consume_identifier("after 'using namespace'")?];
            while self.match_punct(Punct::ColonColon) {
                path.push(self.consume_identifier("after '::'")?);
            }
            self.consume_punct(Punct::Semicolon, "after using-directive")?;
            self.symbols_mut().add_using_directive(path);
            return Ok(());
        }

        let first = self.consume_identifier("after 'using'")?;
        if self.match_punct(Punct::Eq) {
            let _ty = self.parse_type_specifier()?;
            self.consume_punct(Punct::Semicolon, "after type alias")?;
            return Ok(());
        }
        let mut path = vec![first];
        while self.match_punct(Punct::ColonColon) {
            path.push(self.consume_identifier("after '::'")?);
        }
        let original_name = path.pop().ok_or_else(|| self.error("expected a name after 'using'"))?;
        self.consume_punct(Punct::Semicolon, "after using-declaration")?;
        self.symbols_mut().add_using_declaration(original_name, path, original_name);
        Ok(())
    }

    /// `template<params> struct Name ...` / `template<params> Ret name(...) ...`
    /// / `template<params> Type name = init;` (variable template) / `template<params> using Alias = Type;`.
    fn parse_template_item(&mut self) -> Result<ItemId, ParseError> {
        self.consume_keyword(Keyword::Template, "to start a template declaration")?;
        let template_params = self.parse_template_param_list()?;

        if self.check_keyword(Keyword::Struct) || self.check_keyword(Keyword::Class) || self.check_keyword(Keyword::Union) {
            let struct_id = self.parse_struct_decl(template_params, true)?;
            let name = self.arena().strukt(struct_id).name;
            self.instantiator_mut().register_struct_template(name, struct_id);
            self.symbols_mut().insert(name, SymbolEntry::Struct(struct_id), |a, b| {
                if a == b { Upgrade::Identical } else { Upgrade::ReplaceExisting }
            });
            return Ok(self.alloc_item(Item::Struct(struct_id)));
        }

        if self.match_keyword(Keyword::Using) {
            let name = self.consume_identifier("as alias-template name")?;
            self.consume_punct(Punct::Eq, "after alias-template name")?;
            let aliased = self.parse_type_specifier()?;
            self.consume_punct(Punct::Semicolon, "after alias-template")?;
            return Ok(self.alloc_item(Item::TemplateAliasDecl { name, template_params, aliased }));
        }

        if self.match_keyword(Keyword::Concept) {
            let name = self.consume_identifier("as concept name")?;
            self.consume_punct(Punct::Eq, "after concept name")?;
            let constraint = self.parse_assignment_expression()?;
            self.consume_punct(Punct::Semicolon, "after concept declaration")?;
            return Ok(self.alloc_item(Item::Concept { name, template_params, constraint }));
        }

        // Variable template vs. function template: both start with a type
        // specifier and a name; a following `(` makes it a function.
        let ty = self.parse_type_specifier()?;
        let name = self.consume_identifier("in template declaration")?;

        if self.check_punct(Punct::LParen) {
            let loc = self.loc();
            let fid = self.parse_function_decl(
                name,
                FunctionKind::Ordinary,
                Some(ty),
                template_params,
                false,
                false,
                false,
                Access::Public,
                loc,
            )?;
            self.instantiator_mut().register_function_template(name, fid);
            self.symbols_mut().insert(name, SymbolEntry::Function(fid), |_, _| Upgrade::DistinctOverload);
            return Ok(self.alloc_item(Item::Function(fid)));
        }

        let init = if self.match_punct(Punct::Eq) { Some(self.parse_assignment_expression()?) } else { None };
        self.consume_punct(Punct::Semicolon, "after variable-template declaration")?;
        Ok(self.alloc_item(Item::TemplateVariableDecl { name, template_params, ty, init }))
    }

    /// Disambiguates a plain top-level `Type name(...)` (function) from
    /// `Type name = init;` / `Type name;` (global variable), sharing the
    /// same leading-specifier and type-specifier parse either way.
    fn parse_function_or_global_var_item(&mut self) -> Result<ItemId, ParseError> {
        let loc = self.loc();
        let is_static = self.match_keyword(Keyword::Static);
        let is_inline = self.match_keyword(Keyword::Inline);
        let is_constexpr = self.match_keyword(Keyword::Constexpr) || self.match_keyword(Keyword::Consteval);

        let ty = self.parse_type_specifier()?;
        let name = self.consume_identifier("as declared name")?;

        if self.check_punct(Punct::LParen) {
            let fid = self.parse_function_decl(
                name,
                FunctionKind::Ordinary,
                Some(ty),
                Vec::new(),
                is_static,
                false,
                is_inline,
                Access::Public,
                loc,
            )?;
            self.symbols_mut().insert(name, SymbolEntry::Function(fid), |_, _| Upgrade::DistinctOverload);
            return Ok(self.alloc_item(Item::Function(fid)));
        }

        let init = if self.match_punct(Punct::Eq) { Some(self.parse_assignment_expression()?) } else { None };
        self.consume_punct(Punct::Semicolon, "after global variable declaration")?;
        self.symbols_mut().insert(name, SymbolEntry::Variable { is_constexpr }, |_, _| Upgrade::ReplaceExisting);
        Ok(self.alloc_item(Item::GlobalVarDecl { name, ty, init, is_constexpr }))
    }

    /// Parses `struct`/`class`/`union Name [final] [: bases] { members }`,
    /// having already decided (by the caller) whether this is a template
    /// pattern. The leading `struct`/`class`/`union` keyword is consumed
    /// here since it also decides the default member/base access.
    fn parse_struct_decl(&mut self, template_params: Vec<TemplateParam>, is_template_pattern: bool) -> Result<StructId, ParseError> {
        let loc = self.loc();
        let (is_union, default_access) = if self.match_keyword(Keyword::Union) {
            (true, Access::Public)
        } else if self.match_keyword(Keyword::Class) {
            (false, Access::Private)
        } else {
            self.consume_keyword(Keyword::Struct, "to start a struct/class/union declaration")?;
            (false, Access::Public)
        };

        let name = self.consume_identifier("as struct/class/union name")?;
        let is_final = self.match_keyword(Keyword::Final);
        self.struct_stack.push(name);

        let mut bases = Vec::new();
        if self.match_punct(Punct::Colon) {
            loop {
                let mut access = default_access;
                let mut is_virtual = false;
                loop {
                    if self.match_keyword(Keyword::Virtual) {
                        is_virtual = true;
                    } else if self.match_keyword(Keyword::Public) {
                        access = Access::Public;
                    } else if self.match_keyword(Keyword::Protected) {
                        access = Access::Protected;
                    } else if self.match_keyword(Keyword::Private) {
                        access = Access::Private;
                    } else {
                        break;
                    }
                }
                let ty = self.parse_type_specifier()?;
                let base_name = self.type_spec_name(ty);
                bases.push(BaseClassNode { name: base_name, ty, access, is_virtual });
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
        }

        self.consume_punct(Punct::LBrace, "to open struct/class/union body")?;
        self.symbols_mut().push_scope(ScopeKind::Block);

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut current_access = default_access;

        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.match_punct(Punct::Semicolon) {
                continue;
            }
            if self.match_keyword(Keyword::Public) {
                self.consume_punct(Punct::Colon, "after 'public'")?;
                current_access = Access::Public;
                continue;
            }
            if self.match_keyword(Keyword::Protected) {
                self.consume_punct(Punct::Colon, "after 'protected'")?;
                current_access = Access::Protected;
                continue;
            }
            if self.match_keyword(Keyword::Private) {
                self.consume_punct(Punct::Colon, "after 'private'")?;
                current_access = Access::Private;
                continue;
            }
            if self.match_keyword(Keyword::Friend) {
                self.skip_member_declaration()?;
                continue;
            }
            if self.match_keyword(Keyword::Using) || self.match_keyword(Keyword::Typedef) {
                self.skip_member_declaration()?;
                continue;
            }
            if self.match_keyword(Keyword::StaticAssert) {
                // A member-scope static_assert has no home in `StructDeclNode`
                // (which only tracks fields/bases/methods); parsed for effect
                // to keep the member-list loop in sync with the token stream.
                let _ = self.parse_static_assert_clause()?;
                continue;
            }

            let mut member_template_params = Vec::new();
            if self.match_keyword(Keyword::Template) {
                member_template_params = self.parse_template_param_list()?;
            }

            match self.parse_struct_member(name, current_access, member_template_params)? {
                Member::Field(field) => fields.push(field),
                Member::Method(fid) => methods.push(fid),
            }
        }

        self.symbols_mut().pop_scope();
        self.consume_punct(Punct::RBrace, "to close struct/class/union body")?;
        self.match_punct(Punct::Semicolon);
        self.struct_stack.pop();

        Ok(self.arena_mut().alloc_struct(StructDeclNode {
            loc,
            name,
            namespace_path: self.symbols_mut().current_namespace_path().to_vec(),
            template_params,
            fields,
            bases,
            methods,
            is_union,
            is_final,
            is_template_pattern,
        }))
    }

    /// A member declaration this parser doesn't otherwise model (`friend`,
    /// `using`, `typedef`) — consumed up to its terminating `;` so the
    /// member loop can continue without special-casing every skipped form
    /// at the call site.
    fn skip_member_declaration(&mut self) -> Result<(), ParseError> {
        while !self.check_punct(Punct::Semicolon) && !self.is_at_end() {
            self.advance();
        }
        self.consume_punct(Punct::Semicolon, "after skipped member declaration")?;
        Ok(())
    }

    fn type_spec_name(&self, ty: TypeSpecId) -> StringHandle {
        match &self.arena().type_spec(ty).base {
            TypeSpecBase::Named { name, .. } => *name,
            _ => self.interner().intern_str(""),
        }
    }

    /// One field or member function inside a struct/class body: constructor
    /// (`Name(...)`), destructor (`~Name(...)`), operator overload/
    /// conversion operator, or an ordinary `Type name` declarator that
    /// turns into either a field or a method depending on what follows.
    fn parse_struct_member(
        &mut self,
        struct_name: StringHandle,
        access: Access,
        template_params: Vec<TemplateParam>,
    ) -> Result<Member, ParseError> {
        let loc = self.loc();
        let is_static = self.match_keyword(Keyword::Static);
        let is_virtual = self.match_keyword(Keyword::Virtual);
        let _ = self.match_keyword(Keyword::Explicit);
        let is_inline = self.match_keyword(Keyword::Inline);
        let is_constexpr = self.match_keyword(Keyword::Constexpr) || self.match_keyword(Keyword::Consteval);
        let _ = is_constexpr; // member constexpr-ness isn't tracked separately from is_inline in FunctionDeclNode

        if self.match_punct(Punct::Tilde) {
            self.consume_identifier("as destructor name")?;
            let name = self.interner().intern_str(&format!("~{}", self.interner().view_str(struct_name)));
            let fid = self.parse_function_decl(name, FunctionKind::Destructor, None, template_params, is_static, is_virtual, is_inline, access, loc)?;
            return Ok(Member::Method(fid));
        }

        if self.check_keyword(Keyword::Operator) {
            self.advance();
            let (op_name, kind, conv_ty) = self.parse_operator_name()?;
            let fid = self.parse_function_decl(op_name, kind, conv_ty, template_params, is_static, is_virtual, is_inline, access, loc)?;
            return Ok(Member::Method(fid));
        }

        if self.check_identifier() && self.peek().text == self.interner().view_str(struct_name) {
            let cp = self.checkpoint();
            let ctor_name = self.consume_identifier("as constructor name")?;
            if self.check_punct(Punct::LParen) {
                let fid = self.parse_function_decl(ctor_name, FunctionKind::Constructor, None, template_params, is_static, is_virtual, is_inline, access, loc)?;
                return Ok(Member::Method(fid));
            }
            self.rewind(cp);
        }

        let ty = self.parse_type_specifier()?;
        let name = self.consume_identifier("as member name")?;

        if self.check_punct(Punct::LParen) {
            let fid = self.parse_function_decl(name, FunctionKind::Ordinary, Some(ty), template_params, is_static, is_virtual, is_inline, access, loc)?;
            return Ok(Member::Method(fid));
        }

        let is_reference = matches!(self.arena().type_spec(ty).reference, ReferenceKind::Lvalue);
        let is_rvalue_reference = matches!(self.arena().type_spec(ty).reference, ReferenceKind::Rvalue);

        let bitfield_width = if self.match_punct(Punct::Colon) {
            let tok = self.advance();
            match tok.kind {
                TokenKind::IntLiteral => tok.text.parse::<u32>().ok(),
                _ => None,
            }
        } else {
            None
        };

        let default_initializer = if self.match_punct(Punct::Eq) || self.check_punct(Punct::LBrace) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };

        self.consume_punct(Punct::Semicolon, "after field declaration")?;

        Ok(Member::Field(FieldNode {
            loc,
            name,
            ty,
            access,
            bitfield_width,
            default_initializer,
            is_reference,
            is_rvalue_reference,
        }))
    }

    /// Parses the operator name following the `operator` keyword, already
    /// consumed by the caller: an overloadable punctuation token, `()`,
    /// `[]`, `new`/`delete`, or (absent all of those) a type specifier for
    /// a user-defined conversion operator.
    fn parse_operator_name(&mut self) -> Result<(StringHandle, FunctionKind, Option<TypeSpecId>), ParseError> {
        if self.match_punct(Punct::LParen) {
            self.consume_punct(Punct::RParen, "to close 'operator()'")?;
            return Ok((self.interner().intern_str("operator()"), FunctionKind::OperatorOther, None));
        }
        if self.match_punct(Punct::LBracket) {
            self.consume_punct(Punct::RBracket, "to close 'operator[]'")?;
            return Ok((self.interner().intern_str("operator[]"), FunctionKind::OperatorOther, None));
        }
        if self.match_keyword(Keyword::New) {
            let is_array = self.match_punct(Punct::LBracket) && self.match_punct(Punct::RBracket);
            let text = if is_array { "operator new[]" } else { "operator new" };
            return Ok((self.interner().intern_str(text), FunctionKind::OperatorOther, None));
        }
        if self.match_keyword(Keyword::Delete) {
            let is_array = self.match_punct(Punct::LBracket) && self.match_punct(Punct::RBracket);
            let text = if is_array { "operator delete[]" } else { "operator delete" };
            return Ok((self.interner().intern_str(text), FunctionKind::OperatorOther, None));
        }

        if let TokenKind::Punct(p) = self.peek().kind {
            if let Some((text, kind)) = operator_punct_name(p) {
                self.advance();
                return Ok((self.interner().intern_str(text), kind, None));
            }
        }

        // Conversion operator: `operator TypeName()`, named by spelled-out
        // convention since it has no source token of its own.
        let ty = self.parse_type_specifier()?;
        Ok((self.interner().intern_str("operator_conv"), FunctionKind::ConversionOperator, Some(ty)))
    }

    /// Shared constructor/destructor/operator/ordinary-method tail: the
    /// parameter list, trailing `const`/`override`/`final`, then a body, a
    /// `= default`/`= delete`/`= 0` marker, or a bare `;` declaration.
    /// Member-initializer lists (`: Base(args), field(args)`) are lowered
    /// into leading `ExprStmt(Call)` statements of the body, which
    /// `codegen` recognizes by matching the callee name against base/field
    /// names (spec §4.8's "explicit base initializers taking precedence").
    #[allow(clippy::too_many_arguments)]
    fn parse_function_decl(
        &mut self,
        name: StringHandle,
        kind: FunctionKind,
        return_type: Option<TypeSpecId>,
        template_params: Vec<TemplateParam>,
        is_static: bool,
        is_virtual: bool,
        is_inline: bool,
        access: Access,
        loc: SourceLoc,
    ) -> Result<FunctionId, ParseError> {
        let enclosing_struct = self.struct_stack.last().copied();
        let namespace_path = self.symbols_mut().current_namespace_path().to_vec();

        self.symbols_mut().push_scope(ScopeKind::Function);
        let was_in_method_body = self.in_method_body;
        self.in_method_body = enclosing_struct.is_some() && !is_static;

        let (params, is_variadic) = self.parse_param_list()?;
        for p in &params {
            self.symbols_mut().insert(p.name, SymbolEntry::Variable { is_constexpr: false }, |_, _| Upgrade::ReplaceExisting);
        }

        let is_const = self.match_keyword(Keyword::Const);
        let _ = self.match_keyword(Keyword::Override);
        let _ = self.match_keyword(Keyword::Final);
        let _ = if self.match_keyword(Keyword::Noexcept) {
            if self.match_punct(Punct::LParen) {
                let _ = self.parse_expression()?;
                self.consume_punct(Punct::RParen, "to close 'noexcept(...)'")?;
            }
            true
        } else {
            false
        };

        let mut is_defaulted = false;
        let mut is_deleted = false;
        let body = if self.match_punct(Punct::Eq) {
            if self.match_keyword(Keyword::Default) {
                is_defaulted = true;
            } else if self.match_keyword(Keyword::Delete) {
                is_deleted = true;
            } else {
                // Pure-virtual `= 0`.
                self.advance();
            }
            self.consume_punct(Punct::Semicolon, "after special member declaration")?;
            None
        } else {
            let leading_inits = self.parse_optional_member_init_list()?;
            if self.check_punct(Punct::LBrace) {
                let block_id = self.parse_block()?;
                if !leading_inits.is_empty() {
                    let mut combined = leading_inits;
                    let existing = self.arena().block(block_id).statements.clone();
                    combined.extend(existing);
                    self.arena_mut().block_mut(block_id).statements = combined;
                }
                Some(block_id)
            } else {
                self.consume_punct(Punct::Semicolon, "after function declaration")?;
                None
            }
        };

        self.in_method_body = was_in_method_body;
        self.symbols_mut().pop_scope();

        Ok(self.arena_mut().alloc_function(FunctionDeclNode {
            loc,
            name,
            kind,
            namespace_path,
            enclosing_struct,
            template_params,
            params,
            return_type,
            body,
            is_variadic,
            is_static,
            is_virtual,
            is_const,
            is_defaulted,
            is_deleted,
            is_inline,
            access,
            is_template_pattern: false,
        }))
    }

    /// `: Base(args), field(args), ...` preceding a constructor body,
    /// lowered into synthetic `ExprStmt(Call { callee: Identifier(name), args })`
    /// statements.
    fn parse_optional_member_init_list(&mut self) -> Result<Vec<StmtId>, ParseError> {
        let mut inits = Vec::new();
        if !self.match_punct(Punct::Colon) {
            return Ok(inits);
        }
        loop {
            let init_name = self.consume_identifier("in member-initializer list")?;
            self.consume_punct(Punct::LParen, "after member-initializer name")?;
            let mut args = Vec::new();
            if !self.check_punct(Punct::RParen) {
                loop {
                    args.push(self.parse_assignment_expression()?);
                    if !self.match_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.consume_punct(Punct::RParen, "to close member-initializer")?;
            let callee = self.arena_mut().alloc_expr(Expr::Identifier(init_name));
            let call = self.arena_mut().alloc_expr(Expr::Call { callee, explicit_template_args: Vec::new(), args });
            inits.push(self.arena_mut().alloc_stmt(Stmt::ExprStmt(call)));
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        Ok(inits)
    }
}

/// Maps a single overloadable-operator punctuation token to its canonical
/// spelled-out name and `FunctionKind`. `None` for punctuation C++ doesn't
/// allow to be overloaded (`?`, `.`, `::`, ...).
fn operator_punct_name(p: Punct) -> Option<(&'static str, FunctionKind)> {
    use Punct::*;
    Some(match p {
        Eq => ("operator=", FunctionKind::OperatorAssign),
        Spaceship => ("operator<=>", FunctionKind::OperatorSpaceship),
        EqEq => ("operator==", FunctionKind::OperatorOther),
        NotEq => ("operator!=", FunctionKind::OperatorOther),
        Lt => ("operator<", FunctionKind::OperatorOther),
        LtEq => ("operator<=", FunctionKind::OperatorOther),
        Gt => ("operator>", FunctionKind::OperatorOther),
        GtEq => ("operator>=", FunctionKind::OperatorOther),
        Plus => ("operator+", FunctionKind::OperatorOther),
        Minus => ("operator-", FunctionKind::OperatorOther),
        Star => ("operator*", FunctionKind::OperatorOther),
        Slash => ("operator/", FunctionKind::OperatorOther),
        Percent => ("operator%", FunctionKind::OperatorOther),
        Amp => ("operator&", FunctionKind::OperatorOther),
        Pipe => ("operator|", FunctionKind::OperatorOther),
        Caret => ("operator^", FunctionKind::OperatorOther),
        Tilde => ("operator~", FunctionKind::OperatorOther),
        Bang => ("operator!", FunctionKind::OperatorOther),
        AmpAmp => ("operator&&", FunctionKind::OperatorOther),
        PipePipe => ("operator||", FunctionKind::OperatorOther),
        Shl => ("operator<<", FunctionKind::OperatorOther),
        Shr => ("operator>>", FunctionKind::OperatorOther),
        PlusEq => ("operator+=", FunctionKind::OperatorOther),
        MinusEq => ("operator-=", FunctionKind::OperatorOther),
        StarEq => ("operator*=", FunctionKind::OperatorOther),
        SlashEq => ("operator/=", FunctionKind::OperatorOther),
        PercentEq => ("operator%=", FunctionKind::OperatorOther),
        AmpEq => ("operator&=", FunctionKind::OperatorOther),
        PipeEq => ("operator|=", FunctionKind::OperatorOther),
        CaretEq => ("operator^=", FunctionKind::OperatorOther),
        ShlEq => ("operator<<=", FunctionKind::OperatorOther),
        ShrEq => ("operator>>=", FunctionKind::OperatorOther),
        PlusPlus => ("operator++", FunctionKind::OperatorOther),
        MinusMinus => ("operator--", FunctionKind::OperatorOther),
        Comma => ("operator,", FunctionKind::OperatorOther),
        Arrow => ("operator->", FunctionKind::OperatorOther),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::InstantiationQueue;
    use crate::types::registry::TypeRegistry;
    use crate::template::TemplateInstantiator;
    use cxxfe_ast::{AstArena, StringInterner};
    use crate::symbols::SymbolTable;
    use cxxfe_lexer::stream::VecTokenStream;
    use cxxfe_lexer::token::{Keyword as Kw, Token};

    fn punct(p: Punct) -> Token {
        Token { kind: TokenKind::Punct(p), text: String::new(), line: 1, column: 1, file_index: 0 }
    }
    fn ident(s: &str) -> Token {
        Token { kind: TokenKind::Identifier, text: s.to_string(), line: 1, column: 1, file_index: 0 }
    }
    fn keyword(k: Kw, text: &str) -> Token {
        Token { kind: TokenKind::Keyword(k), text: text.to_string(), line: 1, column: 1, file_index: 0 }
    }
    fn int_lit(s: &str) -> Token {
        Token { kind: TokenKind::IntLiteral, text: s.to_string(), line: 1, column: 1, file_index: 0 }
    }

    struct Harness {
        arena: AstArena,
        interner: StringInterner,
        symbols: SymbolTable,
        registry: TypeRegistry,
        queue: InstantiationQueue,
        ctx: crate::config::CompileContext,
    }

    impl Harness {
        fn new() -> Self {
            let interner = StringInterner::new();
            let mut registry = TypeRegistry::new();
            registry.seed_builtins(&interner);
            Harness {
                arena: AstArena::new(),
                interner,
                symbols: SymbolTable::new(),
                registry,
                queue: InstantiationQueue::new(),
                ctx: crate::config::CompileContext::default(),
            }
        }
    }

    #[test]
    fn parses_a_free_function_with_a_body() {
        // int add(int a, int b) { return a; }
        let tokens = vec![
            ident("int"),
            ident("add"),
            punct(Punct::LParen),
            ident("int"),
            ident("a"),
            punct(Punct::Comma),
            ident("int"),
            ident("b"),
            punct(Punct::RParen),
            punct(Punct::LBrace),
            keyword(Kw::Return, "return"),
            ident("a"),
            punct(Punct::Semicolon),
            punct(Punct::RBrace),
        ];
        let mut stream = VecTokenStream::new(tokens);
        let mut h = Harness::new();
        let mut instantiator = TemplateInstantiator::new(&mut h.registry, &h.interner, &mut h.queue);
        let mut parser = Parser::new(&mut stream, &mut h.arena, &h.interner, &mut h.symbols, &mut instantiator, &mut h.ctx, 0);

        let program = parser.parse_program().expect("a simple function should parse");
        assert_eq!(program.items.len(), 1);
        match parser.item(program.items[0]) {
            Some(Item::Function(fid)) => {
                let f = parser.arena().function(*fid);
                assert_eq!(f.kind, FunctionKind::Ordinary);
                assert!(f.body.is_some());
                assert_eq!(f.params.len(), 2);
            }
            other => panic!("expected a Function item, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_struct_with_a_field_and_a_constructor() {
        // struct Point { int x; Point(int v) : x(v) {} };
        let tokens = vec![
            keyword(Kw::Struct, "struct"),
            ident("Point"),
            punct(Punct::LBrace),
            ident("int"),
            ident("x"),
            punct(Punct::Semicolon),
            ident("Point"),
            punct(Punct::LParen),
            ident("int"),
            ident("v"),
            punct(Punct::RParen),
            punct(Punct::Colon),
            ident("x"),
            punct(Punct::LParen),
            ident("v"),
            punct(Punct::RParen),
            punct(Punct::LBrace),
            punct(Punct::RBrace),
            punct(Punct::RBrace),
            punct(Punct::Semicolon),
        ];
        let mut stream = VecTokenStream::new(tokens);
        let mut h = Harness::new();
        let mut instantiator = TemplateInstantiator::new(&mut h.registry, &h.interner, &mut h.queue);
        let mut parser = Parser::new(&mut stream, &mut h.arena, &h.interner, &mut h.symbols, &mut instantiator, &mut h.ctx, 0);

        let program = parser.parse_program().expect("a struct with a constructor should parse");
        assert_eq!(program.items.len(), 1);
        match parser.item(program.items[0]) {
            Some(Item::Struct(sid)) => {
                let s = parser.arena().strukt(*sid);
                assert_eq!(s.fields.len(), 1);
                assert_eq!(s.methods.len(), 1);
                let ctor = parser.arena().function(s.methods[0]);
                assert_eq!(ctor.kind, FunctionKind::Constructor);
                let body = parser.arena().block(ctor.body.expect("ctor has a body"));
                // The member-initializer list lowers to one leading ExprStmt.
                assert_eq!(body.statements.len(), 1);
            }
            other => panic!("expected a Struct item, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_global_variable_declaration() {
        // int counter = 0;
        let tokens = vec![ident("int"), ident("counter"), punct(Punct::Eq), int_lit("0"), punct(Punct::Semicolon)];
        let mut stream = VecTokenStream::new(tokens);
        let mut h = Harness::new();
        let mut instantiator = TemplateInstantiator::new(&mut h.registry, &h.interner, &mut h.queue);
        let mut parser = Parser::new(&mut stream, &mut h.arena, &h.interner, &mut h.symbols, &mut instantiator, &mut h.ctx, 0);

        let program = parser.parse_program().expect("a global variable declaration should parse");
        match parser.item(program.items[0]) {
            Some(Item::GlobalVarDecl { init, .. }) => assert!(init.is_some()),
            other => panic!("expected a GlobalVarDecl item, got {other:?}"),
        }
    }
}
