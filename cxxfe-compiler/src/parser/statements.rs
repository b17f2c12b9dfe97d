//! Statement parsing (spec §3.3 `Stmt`, §4.4).
//!
//! Grounded on `vex-parser/src/parser/mod.rs`'s `parse_block`/statement
//! dispatch, generalized to the wider C++ statement grammar (structured
//! bindings, ranged-for, SEH try/except/finally, using-declarations,
//! typedef, static_assert).

use cxxfe_ast::ast::*;
use cxxfe_lexer::stream::TokenStream;
use cxxfe_lexer::token::{Keyword, Punct, TokenKind};

use crate::symbols::{ScopeKind, SymbolEntry};
use super::{ParseError, Parser};

impl<'a, S: TokenStream> Parser<'a, S> {
    /// Parses a `{ ... }` block, allocating a fresh symbol-table scope for
    /// the statements inside it.
    pub(crate) fn parse_block(&mut self) -> Result<BlockId, ParseError> {
        self.consume_punct(Punct::LBrace, "to open block")?;
        self.symbols_mut().push_scope(ScopeKind::Block);
        let mut statements = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.symbols_mut().pop_scope();
        self.consume_punct(Punct::RBrace, "to close block")?;
        Ok(self.arena_mut().alloc_block(Block { statements }))
    }

    pub(crate) fn parse_statement(&mut self) -> Result<StmtId, ParseError> {
        if self.check_punct(Punct::LBrace) {
            let block = self.parse_block()?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Block(block)));
        }
        if self.match_keyword(Keyword::If) {
            return self.parse_if();
        }
        if self.match_keyword(Keyword::While) {
            return self.parse_while();
        }
        if self.match_keyword(Keyword::Do) {
            return self.parse_do_while();
        }
        if self.match_keyword(Keyword::For) {
            return self.parse_for();
        }
        if self.match_keyword(Keyword::Switch) {
            return self.parse_switch();
        }
        if self.match_keyword(Keyword::Break) {
            self.consume_punct(Punct::Semicolon, "after 'break'")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Break));
        }
        if self.match_keyword(Keyword::Continue) {
            self.consume_punct(Punct::Semicolon, "after 'continue'")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Continue));
        }
        if self.match_keyword(Keyword::Goto) {
            let label = self.consume_identifier("after 'goto'")?;
            self.consume_punct(Punct::Semicolon, "after goto label")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Goto(label)));
        }
        if self.match_keyword(Keyword::Return) {
            let value = if self.check_punct(Punct::Semicolon) { None } else { Some(self.parse_expression()?) };
            self.consume_punct(Punct::Semicolon, "after return statement")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Return(value)));
        }
        if self.match_keyword(Keyword::Throw) {
            let value = if self.check_punct(Punct::Semicolon) { None } else { Some(self.parse_expression()?) };
            self.consume_punct(Punct::Semicolon, "after throw statement")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Throw(value)));
        }
        if self.match_keyword(Keyword::Try) {
            return self.parse_try();
        }
        if self.match_keyword(Keyword::SehTry) {
            return self.parse_seh_try();
        }
        if self.match_keyword(Keyword::SehLeave) {
            self.consume_punct(Punct::Semicolon, "after '__leave'")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::SehLeave));
        }
        if self.match_keyword(Keyword::Using) {
            return self.parse_using_stmt();
        }
        if self.match_keyword(Keyword::Namespace) {
            return self.parse_namespace_alias();
        }
        if self.match_keyword(Keyword::Typedef) {
            return self.parse_typedef();
        }
        if self.match_keyword(Keyword::StaticAssert) {
            return self.parse_static_assert_stmt();
        }
        if self.check_identifier() && self.peek_is_label() {
            let label = self.consume_identifier("as statement label")?;
            self.consume_punct(Punct::Colon, "after label")?;
            let stmt = self.parse_statement()?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Labeled { label, stmt }));
        }
        if self.looks_like_decl_start() {
            return self.parse_decl_statement();
        }

        let expr = self.parse_expression()?;
        self.consume_punct(Punct::Semicolon, "after expression statement")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::ExprStmt(expr)))
    }

    /// `name:` immediately followed by a statement, disambiguated from a
    /// ternary expression or scope-resolution by lookahead: a label is an
    /// identifier, a colon, and then anything but another colon.
    fn peek_is_label(&mut self) -> bool {
        let cp = self.checkpoint();
        let is_label = self.consume_identifier("label lookahead").is_ok() && self.check_punct(Punct::Colon);
        self.rewind(cp);
        is_label
    }

    /// Heuristic used to decide whether the next statement is a
    /// declaration: a leading `const`/`static`/`constexpr`/`auto`, a
    /// recognized builtin type name, or an identifier that parses as a
    /// type specifier immediately followed by another identifier (the
    /// variable name).
    fn looks_like_decl_start(&mut self) -> bool {
        if self.check_keyword(Keyword::Const)
            || self.check_keyword(Keyword::Volatile)
            || self.check_keyword(Keyword::Static)
            || self.check_keyword(Keyword::Constexpr)
            || self.check_keyword(Keyword::Consteval)
            || self.check_keyword(Keyword::Auto)
        {
            return true;
        }
        if self.check_punct(Punct::LBracket) {
            // Structured binding: `auto [a, b] = ...;` — `auto` already
            // covered above, but `[a, b]` alone (no leading `auto`) is not
            // legal C++, so this branch only exists defensively.
            return false;
        }
        if !self.check_identifier() {
            return false;
        }
        let cp = self.checkpoint();
        let parsed = self.parse_type_specifier().is_ok() && (self.check_identifier() || self.check_punct(Punct::LBracket));
        self.rewind(cp);
        parsed
    }

    fn parse_decl_statement(&mut self) -> Result<StmtId, ParseError> {
        let is_static = self.match_keyword(Keyword::Static);
        let is_constexpr = self.match_keyword(Keyword::Constexpr) || self.match_keyword(Keyword::Consteval);

        if self.check_keyword(Keyword::Auto) {
            let cp = self.checkpoint();
            self.advance();
            if !self.match_punct(Punct::LBracket) {
                self.rewind(cp);
                return self.parse_simple_var_decl(is_static, is_constexpr);
            }
            let mut names = Vec::new();
            if !self.check_punct(Punct::RBracket) {
                loop {
                    names.push(self.consume_identifier("in structured binding")?);
                    if !self.match_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.consume_punct(Punct::RBracket, "to close structured binding")?;
            self.consume_punct(Punct::Eq, "after structured binding names")?;
            let init = self.parse_expression()?;
            self.consume_punct(Punct::Semicolon, "after structured binding")?;
            for name in &names {
                self.symbols_mut().insert(*name, SymbolEntry::Variable { is_constexpr: false }, |_, _| crate::symbols::Upgrade::ReplaceExisting);
            }
            return Ok(self.arena_mut().alloc_stmt(Stmt::StructuredBinding { names, init }));
        }

        self.parse_simple_var_decl(is_static, is_constexpr)
    }

    fn parse_simple_var_decl(&mut self, is_static: bool, is_constexpr: bool) -> Result<StmtId, ParseError> {
        let ty = Some(self.parse_type_specifier()?);
        let name = self.consume_identifier("as declared variable name")?;
        let init = if self.match_punct(Punct::Eq) {
            Some(self.parse_assignment_expression()?)
        } else if self.check_punct(Punct::LBrace) {
            Some(self.parse_expression_as_braced_init()?)
        } else {
            None
        };
        self.consume_punct(Punct::Semicolon, "after variable declaration")?;
        self.symbols_mut().insert(name, SymbolEntry::Variable { is_constexpr }, |_, _| crate::symbols::Upgrade::ReplaceExisting);
        Ok(self.arena_mut().alloc_stmt(Stmt::VarDecl { name, ty, init, is_static, is_constexpr }))
    }

    fn parse_expression_as_braced_init(&mut self) -> Result<ExprId, ParseError> {
        self.parse_expression()
    }

    fn parse_if(&mut self) -> Result<StmtId, ParseError> {
        self.consume_punct(Punct::LParen, "after 'if'")?;
        let init = self.parse_optional_init_statement()?;
        let cond = self.parse_expression()?;
        self.consume_punct(Punct::RParen, "to close 'if' condition")?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.match_keyword(Keyword::Else) { Some(self.parse_statement()?) } else { None };
        Ok(self.arena_mut().alloc_stmt(Stmt::If { init, cond, then_branch, else_branch }))
    }

    /// `if (init; cond)` / `switch (init; value)` init-statement, present
    /// when a `;` appears before the condition closes.
    fn parse_optional_init_statement(&mut self) -> Result<Option<StmtId>, ParseError> {
        if self.looks_like_decl_start() {
            let cp = self.checkpoint();
            match self.parse_decl_statement() {
                Ok(stmt) => return Ok(Some(stmt)),
                Err(_) => self.rewind(cp),
            }
        }
        Ok(None)
    }

    fn parse_while(&mut self) -> Result<StmtId, ParseError> {
        self.consume_punct(Punct::LParen, "after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume_punct(Punct::RParen, "to close 'while' condition")?;
        let body = self.parse_statement()?;
        Ok(self.arena_mut().alloc_stmt(Stmt::While { cond, body }))
    }

    fn parse_do_while(&mut self) -> Result<StmtId, ParseError> {
        let body = self.parse_statement()?;
        self.consume_keyword(Keyword::While, "to close 'do' body")?;
        self.consume_punct(Punct::LParen, "after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume_punct(Punct::RParen, "to close 'do...while' condition")?;
        self.consume_punct(Punct::Semicolon, "after 'do...while'")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::DoWhile { body, cond }))
    }

    fn parse_for(&mut self) -> Result<StmtId, ParseError> {
        self.consume_punct(Punct::LParen, "after 'for'")?;

        if self.looks_like_decl_start() {
            let cp = self.checkpoint();
            if let Ok(decl) = self.try_parse_ranged_for_binding() {
                let range = self.parse_expression()?;
                self.consume_punct(Punct::RParen, "to close range-based 'for'")?;
                let body = self.parse_statement()?;
                return Ok(self.arena_mut().alloc_stmt(Stmt::RangedFor { binding: decl, range, body }));
            }
            self.rewind(cp);
        }

        let init = if self.match_punct(Punct::Semicolon) { None } else {
            let stmt = self.parse_decl_or_expr_statement_with_semicolon()?;
            Some(stmt)
        };
        let cond = if self.check_punct(Punct::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.consume_punct(Punct::Semicolon, "after 'for' condition")?;
        let post = if self.check_punct(Punct::RParen) { None } else { Some(self.parse_expression()?) };
        self.consume_punct(Punct::RParen, "to close 'for' header")?;
        let body = self.parse_statement()?;
        Ok(self.arena_mut().alloc_stmt(Stmt::For { init, cond, post, body }))
    }

    /// Parses `auto binding : range)` up to (not including) the range
    /// expression, returning the bound name. Errors if this is not in fact
    /// a ranged-for (e.g. an ordinary `for (T x = ...; ...)`), so the
    /// caller can rewind and fall back to the classic three-clause form.
    fn try_parse_ranged_for_binding(&mut self) -> Result<cxxfe_ast::StringHandle, ParseError> {
        let _ = self.match_keyword(Keyword::Const);
        let _ = self.parse_type_specifier()?;
        let name = self.consume_identifier("as range-based 'for' binding")?;
        self.consume_punct(Punct::Colon, "to introduce range expression")?;
        self.symbols_mut().insert(name, SymbolEntry::Variable { is_constexpr: false }, |_, _| crate::symbols::Upgrade::ReplaceExisting);
        Ok(name)
    }

    fn parse_decl_or_expr_statement_with_semicolon(&mut self) -> Result<StmtId, ParseError> {
        if self.looks_like_decl_start() {
            return self.parse_decl_statement();
        }
        let expr = self.parse_expression()?;
        self.consume_punct(Punct::Semicolon, "after 'for' init expression")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::ExprStmt(expr)))
    }

    fn parse_switch(&mut self) -> Result<StmtId, ParseError> {
        self.consume_punct(Punct::LParen, "after 'switch'")?;
        let value = self.parse_expression()?;
        self.consume_punct(Punct::RParen, "to close 'switch' condition")?;
        self.consume_punct(Punct::LBrace, "to open 'switch' body")?;
        let mut cases = Vec::new();
        let mut default_case = None;
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.match_keyword(Keyword::Case) {
                let mut labels = vec![self.parse_expression()?];
                self.consume_punct(Punct::Colon, "after 'case' label")?;
                while self.match_keyword(Keyword::Case) {
                    labels.push(self.parse_expression()?);
                    self.consume_punct(Punct::Colon, "after 'case' label")?;
                }
                let body = self.parse_case_body()?;
                cases.push((labels, body));
            } else if self.match_keyword(Keyword::Default) {
                self.consume_punct(Punct::Colon, "after 'default' label")?;
                default_case = Some(self.parse_case_body()?);
            } else {
                return Err(self.error("expected 'case' or 'default' in switch body"));
            }
        }
        self.consume_punct(Punct::RBrace, "to close 'switch' body")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::Switch { value, cases, default_case }))
    }

    /// The statements following a `case`/`default` label up to (not
    /// including) the next label or the closing brace, wrapped in a single
    /// synthetic block statement.
    fn parse_case_body(&mut self) -> Result<StmtId, ParseError> {
        let mut statements = Vec::new();
        while !self.check_keyword(Keyword::Case)
            && !self.check_keyword(Keyword::Default)
            && !self.check_punct(Punct::RBrace)
            && !self.is_at_end()
        {
            statements.push(self.parse_statement()?);
        }
        let block = self.arena_mut().alloc_block(Block { statements });
        Ok(self.arena_mut().alloc_stmt(Stmt::Block(block)))
    }

    fn parse_try(&mut self) -> Result<StmtId, ParseError> {
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.match_keyword(Keyword::Catch) {
            self.consume_punct(Punct::LParen, "after 'catch'")?;
            let (exception_ty, binding) = if self.match_punct(Punct::Ellipsis) {
                (None, None)
            } else {
                let ty = self.parse_type_specifier()?;
                let binding = if self.check_identifier() { Some(self.consume_identifier("as catch binding")?) } else { None };
                (Some(ty), binding)
            };
            self.consume_punct(Punct::RParen, "to close 'catch' parameter")?;
            let catch_body = self.parse_block()?;
            catches.push(CatchClause { exception_ty, binding, body: catch_body });
        }
        Ok(self.arena_mut().alloc_stmt(Stmt::Try { body, catches }))
    }

    fn parse_seh_try(&mut self) -> Result<StmtId, ParseError> {
        let body = self.parse_block()?;
        let mut except_body = None;
        let mut finally_body = None;
        if self.match_keyword(Keyword::SehExcept) {
            self.consume_punct(Punct::LParen, "after '__except'")?;
            let _ = self.parse_expression()?;
            self.consume_punct(Punct::RParen, "to close '__except' filter")?;
            except_body = Some(self.parse_block()?);
        } else if self.match_keyword(Keyword::SehFinally) {
            finally_body = Some(self.parse_block()?);
        } else {
            return Err(self.error("expected '__except' or '__finally' after '__try'"));
        }
        Ok(self.arena_mut().alloc_stmt(Stmt::SehTry { body, except_body, finally_body }))
    }

    fn parse_using_stmt(&mut self) -> Result<StmtId, ParseError> {
        if self.match_keyword(Keyword::Namespace) {
            let mut path = vec![self.consume_identifier("after 'using namespace'")?];
            while self.match_punct(Punct::ColonColon) {
                path.push(self.consume_identifier("after '::'")?);
            }
            self.consume_punct(Punct::Semicolon, "after using-directive")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::UsingDirective { namespace_path: path }));
        }
        if self.match_keyword(Keyword::Enum) {
            let ty = self.parse_type_specifier()?;
            self.consume_punct(Punct::Semicolon, "after using-enum declaration")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::UsingEnum(ty)));
        }
        // `using name = ns::original;` (alias) or `using ns::original;`
        // (using-declaration). Both start with an identifier; the `=`
        // disambiguates.
        let first = self.consume_identifier("after 'using'")?;
        if self.match_punct(Punct::Eq) {
            let ty = self.parse_type_specifier()?;
            self.consume_punct(Punct::Semicolon, "after type alias")?;
            return Ok(self.arena_mut().alloc_stmt(Stmt::Typedef { name: first, ty }));
        }
        let mut path = vec![first];
        while self.match_punct(Punct::ColonColon) {
            path.push(self.consume_identifier("after '::'")?);
        }
        let original_name = path.pop().ok_or_else(|| self.error("expected a name after 'using'"))?;
        self.consume_punct(Punct::Semicolon, "after using-declaration")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::UsingDeclaration { local_name: original_name, namespace_path: path, original_name }))
    }

    fn parse_namespace_alias(&mut self) -> Result<StmtId, ParseError> {
        let alias = self.consume_identifier("as namespace-alias name")?;
        self.consume_punct(Punct::Eq, "after namespace-alias name")?;
        let mut target_path = vec![self.consume_identifier("in namespace-alias target")?];
        while self.match_punct(Punct::ColonColon) {
            target_path.push(self.consume_identifier("after '::'")?);
        }
        self.consume_punct(Punct::Semicolon, "after namespace-alias")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::NamespaceAlias { alias, target_path }))
    }

    fn parse_typedef(&mut self) -> Result<StmtId, ParseError> {
        let ty = self.parse_type_specifier()?;
        let name = self.consume_identifier("as typedef name")?;
        self.consume_punct(Punct::Semicolon, "after typedef")?;
        Ok(self.arena_mut().alloc_stmt(Stmt::Typedef { name, ty }))
    }

    fn parse_static_assert_stmt(&mut self) -> Result<StmtId, ParseError> {
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
        Ok(self.arena_mut().alloc_stmt(Stmt::StaticAssert { cond, message }))
    }
}
