//! Recursive-descent parser (spec §4.4).
//!
//! Grounded on `vex-parser/src/parser/mod.rs`'s cursor (`check`/`advance`/
//! `consume`/`error`) and its `items.rs`/`expressions.rs`/`statements.rs`/
//! `types.rs` module split, generalized to drive on `impl TokenStream`
//! rather than a materialized `Vec<TokenSpan>`, and to trigger template
//! instantiation on demand (spec §4.4 last bullet) through a
//! `TemplateInstantiator` held alongside the arena and symbol table. The
//! `>>`-splitting and speculative save/restore specifics are grounded on
//! `examples/original_source/src/Parser_Core.cpp`.
//!
//! `Item` nodes themselves live in the parser's own `items` vector rather
//! than `AstArena`: unlike expressions/statements/functions/structs, items
//! are never cloned or substituted by the template engine, so they need no
//! stable cross-instantiation identity — only a place to sit between
//! parsing and whatever walks `Program.items` afterward.

mod expressions;
mod items;
mod statements;
mod types;

use cxxfe_ast::ast::*;
use cxxfe_ast::loc::SourceLoc;
use cxxfe_ast::{ArenaWatermark, AstArena, StringHandle, StringInterner};
use cxxfe_lexer::token::{Keyword, Punct, Token, TokenKind};
use cxxfe_lexer::stream::{Cursor, TokenStream};

use crate::config::CompileContext;
use crate::symbols::SymbolTable;
use crate::template::TemplateInstantiator;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Snapshot of everything a speculative parse attempt needs to roll back
/// (spec §4.4: "current token, any injected-token buffer, AST arena
/// high-watermark, lexer offset"). Declarations allocated during the
/// speculative window are deliberately *not* rewound by `Parser::rewind`:
/// `FunctionId`/`StructId` nodes keep their identity because a template
/// instantiation may already have been registered against them.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    cursor: Cursor,
    watermark: ArenaWatermark,
    items_len: usize,
}

pub struct Parser<'a, S: TokenStream> {
    stream: &'a mut S,
    arena: &'a mut AstArena,
    interner: &'a StringInterner,
    symbols: &'a mut SymbolTable,
    instantiator: &'a mut TemplateInstantiator<'a>,
    /// `#pragma pack` stack (spec §4.4); direct field (not an accessor) so
    /// `parse_top_level`'s pragma handling can borrow it alongside
    /// `instantiator` without the two aliasing a single `&mut self`.
    pub(crate) ctx: &'a mut CompileContext,
    file_index: u32,
    next_lambda_id: u32,
    /// `true` while parsing the body of a non-static member function, so
    /// unqualified identifier lookup can fall back to an implicit `this->`.
    pub(crate) in_method_body: bool,
    /// Name of the struct whose member list is currently being parsed, for
    /// constructor/destructor-name recognition and `this`-typing. Spec §9
    /// open-question 2: an explicit stack, pushed/popped around nested
    /// visits, instead of the teacher's single mutable field.
    pub(crate) struct_stack: Vec<StringHandle>,
    items: Vec<Item>,
}

impl<'a, S: TokenStream> Parser<'a, S> {
    pub fn new(
        stream: &'a mut S,
        arena: &'a mut AstArena,
        interner: &'a StringInterner,
        symbols: &'a mut SymbolTable,
        instantiator: &'a mut TemplateInstantiator<'a>,
        ctx: &'a mut CompileContext,
        file_index: u32,
    ) -> Self {
        Parser {
            stream,
            arena,
            interner,
            symbols,
            instantiator,
            ctx,
            file_index,
            next_lambda_id: 0,
            in_method_body: false,
            struct_stack: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut ids = Vec::new();
        while !self.is_at_end() {
            if let Some(id) = self.parse_top_level()? {
                ids.push(id);
            }
        }
        Ok(Program { items: ids })
    }

    /// Looks up an item by the id this parser handed out. Only meaningful
    /// for ids produced by this same parser instance.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.index())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn alloc_item(&mut self, item: Item) -> ItemId {
        self.items.push(item);
        ItemId(self.items.len() as u32 - 1)
    }

    pub(crate) fn arena(&self) -> &AstArena {
        self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut AstArena {
        self.arena
    }

    pub(crate) fn interner(&self) -> &'a StringInterner {
        self.interner
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
        self.symbols
    }

    pub(crate) fn instantiator_mut(&mut self) -> &mut TemplateInstantiator<'a> {
        self.instantiator
    }

    pub(crate) fn next_lambda_id(&mut self) -> u32 {
        let id = self.next_lambda_id;
        self.next_lambda_id += 1;
        id
    }

    // ---------------------------------------------------------------
    // Cursor primitives
    // ---------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        self.stream.peek()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.stream.advance()
    }

    pub(crate) fn loc(&self) -> SourceLoc {
        let t = self.peek();
        SourceLoc { file_index: self.file_index, line: t.line, column: t.column }
    }

    pub(crate) fn check_punct(&self, p: Punct) -> bool {
        matches!(self.peek().kind, TokenKind::Punct(ref q) if *q == p)
    }

    pub(crate) fn check_keyword(&self, k: Keyword) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(ref kw) if *kw == k)
    }

    pub(crate) fn check_identifier(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier)
    }

    pub(crate) fn match_punct(&mut self, p: Punct) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_keyword(&mut self, k: Keyword) -> bool {
        if self.check_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume_punct(&mut self, p: Punct, context: &str) -> Result<Token, ParseError> {
        if self.check_punct(p) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{}' {context}", punct_text(p))))
        }
    }

    pub(crate) fn consume_keyword(&mut self, k: Keyword, context: &str) -> Result<Token, ParseError> {
        if self.check_keyword(k) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected keyword {k:?} {context}")))
        }
    }

    pub(crate) fn consume_identifier(&mut self, context: &str) -> Result<StringHandle, ParseError> {
        if self.check_identifier() {
            let tok = self.advance();
            Ok(self.interner.intern_str(&tok.text))
        } else {
            Err(self.error(format!("expected identifier {context}")))
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError { message: message.into(), line: t.line, column: t.column }
    }

    // ---------------------------------------------------------------
    // Speculative parsing
    // ---------------------------------------------------------------

    pub(crate) fn checkpoint(&mut self) -> Checkpoint {
        Checkpoint {
            cursor: self.stream.save(),
            watermark: self.arena.watermark(),
            items_len: self.items.len(),
        }
    }

    /// Rewinds the token stream and discards non-declaration nodes
    /// allocated since `cp` (spec §4.4: declarations survive a rewind).
    pub(crate) fn rewind(&mut self, cp: Checkpoint) {
        self.stream.restore(cp.cursor);
        self.arena.discard_since(cp.watermark);
        self.items.truncate(cp.items_len);
    }

    /// `>>` → `>` `>` splitting (spec §4.4 / §9): consumes a `Shr` token as
    /// the closing `>` of a template-argument list and re-injects a lone
    /// `>` for whatever follows (typically the enclosing template's own
    /// close, or an ordinary operator use).
    pub(crate) fn close_template_angle(&mut self) -> Result<(), ParseError> {
        if self.check_punct(Punct::Shr) {
            let tok = self.advance();
            self.stream.inject(Token {
                kind: TokenKind::Punct(Punct::Gt),
                text: ">".to_string(),
                line: tok.line,
                column: tok.column + 1,
                file_index: tok.file_index,
            });
            Ok(())
        } else {
            self.consume_punct(Punct::Gt, "to close template argument list").map(|_| ())
        }
    }

    /// `true` if the next token can close a template-argument list, i.e. a
    /// lone `>` or a `>>` the caller will split.
    pub(crate) fn at_template_close(&self) -> bool {
        self.check_punct(Punct::Gt) || self.check_punct(Punct::Shr)
    }
}

fn punct_text(p: Punct) -> &'static str {
    use Punct::*;
    match p {
        LParen => "(",
        RParen => ")",
        LBrace => "{",
        RBrace => "}",
        LBracket => "[",
        RBracket => "]",
        Semicolon => ";",
        Comma => ",",
        Colon => ":",
        ColonColon => "::",
        Dot => ".",
        Arrow => "->",
        Question => "?",
        Amp => "&",
        Star => "*",
        Plus => "+",
        Minus => "-",
        Slash => "/",
        Percent => "%",
        Eq => "=",
        EqEq => "==",
        NotEq => "!=",
        Lt => "<",
        LtEq => "<=",
        Gt => ">",
        GtEq => ">=",
        Spaceship => "<=>",
        AmpAmp => "&&",
        PipePipe => "||",
        Pipe => "|",
        Caret => "^",
        Tilde => "~",
        Bang => "!",
        Shl => "<<",
        Shr => ">>",
        PlusEq => "+=",
        MinusEq => "-=",
        StarEq => "*=",
        SlashEq => "/=",
        PercentEq => "%=",
        AmpEq => "&=",
        PipeEq => "|=",
        CaretEq => "^=",
        ShlEq => "<<=",
        ShrEq => ">>=",
        PlusPlus => "++",
        MinusMinus => "--",
        Ellipsis => "...",
        Hash => "#",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::InstantiationQueue;
    use crate::types::registry::TypeRegistry;
    use cxxfe_lexer::stream::VecTokenStream;
    use cxxfe_lexer::token::Punct;

    fn punct(p: Punct) -> Token {
        Token { kind: TokenKind::Punct(p), text: String::new(), line: 1, column: 1, file_index: 0 }
    }

    fn ident(s: &str) -> Token {
        Token { kind: TokenKind::Identifier, text: s.to_string(), line: 1, column: 1, file_index: 0 }
    }

    struct Harness {
        arena: AstArena,
        interner: StringInterner,
        symbols: SymbolTable,
        registry: TypeRegistry,
        queue: InstantiationQueue,
        ctx: CompileContext,
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
                ctx: CompileContext::default(),
            }
        }
    }

    #[test]
    fn nested_angle_brackets_split_a_shr_token() {
        let tokens = vec![ident("Box"), punct(Punct::Lt), ident("Box"), punct(Punct::Lt), ident("int"), punct(Punct::Shr)];
        let mut stream = VecTokenStream::new(tokens);
        let mut h = Harness::new();
        let mut instantiator = TemplateInstantiator::new(&mut h.registry, &h.interner, &mut h.queue);
        let mut parser = Parser::new(&mut stream, &mut h.arena, &h.interner, &mut h.symbols, &mut instantiator, &mut h.ctx, 0);

        assert!(parser.consume_identifier("outer").is_ok());
        assert!(parser.consume_punct(Punct::Lt, "open").is_ok());
        assert!(parser.consume_identifier("inner").is_ok());
        assert!(parser.consume_punct(Punct::Lt, "open").is_ok());
        assert!(parser.consume_identifier("arg").is_ok());
        // A single `>>` token closes both nested argument lists.
        assert!(parser.close_template_angle().is_ok());
        assert!(parser.close_template_angle().is_ok());
        assert!(parser.is_at_end());
    }

    #[test]
    fn rewind_restores_stream_position_and_discards_non_decl_nodes() {
        let tokens = vec![ident("x"), punct(Punct::Plus), ident("y"), punct(Punct::Semicolon)];
        let mut stream = VecTokenStream::new(tokens);
        let mut h = Harness::new();
        let mut instantiator = TemplateInstantiator::new(&mut h.registry, &h.interner, &mut h.queue);
        let mut parser = Parser::new(&mut stream, &mut h.arena, &h.interner, &mut h.symbols, &mut instantiator, &mut h.ctx, 0);

        let cp = parser.checkpoint();
        let speculative = parser.parse_expression().expect("additive expr should parse");
        let _ = speculative;
        parser.rewind(cp);
        assert!(parser.check_identifier());
        assert_eq!(parser.peek().text, "x");
    }
}
