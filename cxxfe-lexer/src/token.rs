//! Token contract consumed by the parser (spec §6.1).
//!
//! The real C++ lexer is an external collaborator (spec §1): this crate
//! only fixes the shape a lexer must produce. `Token` mirrors
//! `vex-lexer::Token`'s kind-plus-position shape but stays a flat struct
//! (rather than a `Logos`-derived enum carrying its own text) since several
//! different upstream lexers might want to produce it.

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub file_index: u32,
}

impl Token {
    pub fn eof(line: u32, column: u32, file_index: u32) -> Self {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line,
            column,
            file_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Struct,
    Class,
    Union,
    Enum,
    Namespace,
    Template,
    Typename,
    Using,
    Typedef,
    Const,
    Volatile,
    Constexpr,
    Consteval,
    Static,
    Virtual,
    Override,
    Final,
    Public,
    Protected,
    Private,
    Friend,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Goto,
    Try,
    Catch,
    Throw,
    New,
    Delete,
    Sizeof,
    Alignof,
    Decltype,
    Noexcept,
    Auto,
    This,
    Nullptr,
    True,
    False,
    Operator,
    Explicit,
    Inline,
    Requires,
    Concept,
    StaticAssert,
    SehTry,
    SehExcept,
    SehFinally,
    SehLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    ColonColon,
    Dot,
    Arrow,
    Question,
    Amp,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship,
    AmpAmp,
    PipePipe,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    PlusPlus,
    MinusMinus,
    Ellipsis,
    Hash,
}
