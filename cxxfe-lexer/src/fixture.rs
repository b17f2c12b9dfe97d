//! A minimal `logos`-based tokenizer for tests and demos.
//!
//! This is **not** a real C++ lexer: it has no preprocessor, no raw-string
//! handling, no universal-character-name support, and no digit-separator
//! parsing. It exists so that `cxxfe-compiler`'s parser tests and the
//! `cxxfe-cli` demo binary have something to produce a `VecTokenStream`
//! from without depending on the external lexer the spec scopes out
//! (spec §1, §6.1).

use logos::Logos;

use crate::stream::VecTokenStream;
use crate::token::{Keyword, Punct, Token, TokenKind};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
enum Lexeme {
    #[token("struct")]
    Struct,
    #[token("class")]
    Class,
    #[token("union")]
    Union,
    #[token("enum")]
    Enum,
    #[token("namespace")]
    Namespace,
    #[token("template")]
    Template,
    #[token("typename")]
    Typename,
    #[token("using")]
    Using,
    #[token("typedef")]
    Typedef,
    #[token("const")]
    Const,
    #[token("volatile")]
    Volatile,
    #[token("constexpr")]
    Constexpr,
    #[token("consteval")]
    Consteval,
    #[token("static")]
    Static,
    #[token("virtual")]
    Virtual,
    #[token("override")]
    Override,
    #[token("final")]
    Final,
    #[token("public")]
    Public,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("friend")]
    Friend,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("for")]
    For,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("goto")]
    Goto,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("throw")]
    Throw,
    #[token("new")]
    New,
    #[token("delete")]
    Delete,
    #[token("sizeof")]
    Sizeof,
    #[token("alignof")]
    Alignof,
    #[token("decltype")]
    Decltype,
    #[token("noexcept")]
    Noexcept,
    #[token("auto")]
    Auto,
    #[token("this")]
    This,
    #[token("nullptr")]
    Nullptr,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("operator")]
    Operator,
    #[token("explicit")]
    Explicit,
    #[token("inline")]
    Inline,
    #[token("requires")]
    Requires,
    #[token("concept")]
    Concept,
    #[token("static_assert")]
    StaticAssert,
    #[token("__try")]
    SehTry,
    #[token("__except")]
    SehExcept,
    #[token("__finally")]
    SehFinally,
    #[token("__leave")]
    SehLeave,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"[0-9][0-9A-Za-z_']*")]
    IntLiteral,
    #[regex(r"[0-9][0-9A-Za-z_']*\.[0-9A-Za-z_']*([eE][+-]?[0-9]+)?")]
    FloatLiteral,
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,
    #[regex(r"'([^'\\]|\\.)*'")]
    CharLiteral,

    #[token("<=>")]
    Spaceship,
    #[token("...")]
    Ellipsis,
    #[token("::")]
    ColonColon,
    #[token("->")]
    Arrow,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("?")]
    Question,
    #[token("&")]
    Amp,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("#")]
    Hash,
}

fn keyword_for(lexeme: Lexeme) -> Option<Keyword> {
    Some(match lexeme {
        Lexeme::Struct => Keyword::Struct,
        Lexeme::Class => Keyword::Class,
        Lexeme::Union => Keyword::Union,
        Lexeme::Enum => Keyword::Enum,
        Lexeme::Namespace => Keyword::Namespace,
        Lexeme::Template => Keyword::Template,
        Lexeme::Typename => Keyword::Typename,
        Lexeme::Using => Keyword::Using,
        Lexeme::Typedef => Keyword::Typedef,
        Lexeme::Const => Keyword::Const,
        Lexeme::Volatile => Keyword::Volatile,
        Lexeme::Constexpr => Keyword::Constexpr,
        Lexeme::Consteval => Keyword::Consteval,
        Lexeme::Static => Keyword::Static,
        Lexeme::Virtual => Keyword::Virtual,
        Lexeme::Override => Keyword::Override,
        Lexeme::Final => Keyword::Final,
        Lexeme::Public => Keyword::Public,
        Lexeme::Protected => Keyword::Protected,
        Lexeme::Private => Keyword::Private,
        Lexeme::Friend => Keyword::Friend,
        Lexeme::Return => Keyword::Return,
        Lexeme::If => Keyword::If,
        Lexeme::Else => Keyword::Else,
        Lexeme::While => Keyword::While,
        Lexeme::Do => Keyword::Do,
        Lexeme::For => Keyword::For,
        Lexeme::Switch => Keyword::Switch,
        Lexeme::Case => Keyword::Case,
        Lexeme::Default => Keyword::Default,
        Lexeme::Break => Keyword::Break,
        Lexeme::Continue => Keyword::Continue,
        Lexeme::Goto => Keyword::Goto,
        Lexeme::Try => Keyword::Try,
        Lexeme::Catch => Keyword::Catch,
        Lexeme::Throw => Keyword::Throw,
        Lexeme::New => Keyword::New,
        Lexeme::Delete => Keyword::Delete,
        Lexeme::Sizeof => Keyword::Sizeof,
        Lexeme::Alignof => Keyword::Alignof,
        Lexeme::Decltype => Keyword::Decltype,
        Lexeme::Noexcept => Keyword::Noexcept,
        Lexeme::Auto => Keyword::Auto,
        Lexeme::This => Keyword::This,
        Lexeme::Nullptr => Keyword::Nullptr,
        Lexeme::True => Keyword::True,
        Lexeme::False => Keyword::False,
        Lexeme::Operator => Keyword::Operator,
        Lexeme::Explicit => Keyword::Explicit,
        Lexeme::Inline => Keyword::Inline,
        Lexeme::Requires => Keyword::Requires,
        Lexeme::Concept => Keyword::Concept,
        Lexeme::StaticAssert => Keyword::StaticAssert,
        Lexeme::SehTry => Keyword::SehTry,
        Lexeme::SehExcept => Keyword::SehExcept,
        Lexeme::SehFinally => Keyword::SehFinally,
        Lexeme::SehLeave => Keyword::SehLeave,
        _ => return None,
    })
}

fn punct_for(lexeme: Lexeme) -> Option<Punct> {
    Some(match lexeme {
        Lexeme::LParen => Punct::LParen,
        Lexeme::RParen => Punct::RParen,
        Lexeme::LBrace => Punct::LBrace,
        Lexeme::RBrace => Punct::RBrace,
        Lexeme::LBracket => Punct::LBracket,
        Lexeme::RBracket => Punct::RBracket,
        Lexeme::Semicolon => Punct::Semicolon,
        Lexeme::Comma => Punct::Comma,
        Lexeme::Colon => Punct::Colon,
        Lexeme::ColonColon => Punct::ColonColon,
        Lexeme::Dot => Punct::Dot,
        Lexeme::Arrow => Punct::Arrow,
        Lexeme::Question => Punct::Question,
        Lexeme::Amp => Punct::Amp,
        Lexeme::Star => Punct::Star,
        Lexeme::Plus => Punct::Plus,
        Lexeme::Minus => Punct::Minus,
        Lexeme::Slash => Punct::Slash,
        Lexeme::Percent => Punct::Percent,
        Lexeme::Eq => Punct::Eq,
        Lexeme::EqEq => Punct::EqEq,
        Lexeme::NotEq => Punct::NotEq,
        Lexeme::Lt => Punct::Lt,
        Lexeme::LtEq => Punct::LtEq,
        Lexeme::Gt => Punct::Gt,
        Lexeme::GtEq => Punct::GtEq,
        Lexeme::Spaceship => Punct::Spaceship,
        Lexeme::AmpAmp => Punct::AmpAmp,
        Lexeme::PipePipe => Punct::PipePipe,
        Lexeme::Pipe => Punct::Pipe,
        Lexeme::Caret => Punct::Caret,
        Lexeme::Tilde => Punct::Tilde,
        Lexeme::Bang => Punct::Bang,
        Lexeme::Shl => Punct::Shl,
        Lexeme::Shr => Punct::Shr,
        Lexeme::PlusEq => Punct::PlusEq,
        Lexeme::MinusEq => Punct::MinusEq,
        Lexeme::StarEq => Punct::StarEq,
        Lexeme::SlashEq => Punct::SlashEq,
        Lexeme::PercentEq => Punct::PercentEq,
        Lexeme::AmpEq => Punct::AmpEq,
        Lexeme::PipeEq => Punct::PipeEq,
        Lexeme::CaretEq => Punct::CaretEq,
        Lexeme::ShlEq => Punct::ShlEq,
        Lexeme::ShrEq => Punct::ShrEq,
        Lexeme::PlusPlus => Punct::PlusPlus,
        Lexeme::MinusMinus => Punct::MinusMinus,
        Lexeme::Ellipsis => Punct::Ellipsis,
        Lexeme::Hash => Punct::Hash,
        _ => return None,
    })
}

#[derive(thiserror::Error, Debug)]
#[error("unrecognized character at line {line}, column {column}")]
pub struct FixtureLexError {
    pub line: u32,
    pub column: u32,
}

/// Tokenizes `source` (attributed to `file_index`) into a `VecTokenStream`.
///
/// Line/column tracking is byte-oriented and newline-counting, adequate for
/// fixtures and golden tests; it does not attempt to special-case tabs or
/// multi-byte sequences the way a production lexer would.
pub fn tokenize(source: &str, file_index: u32) -> Result<VecTokenStream, FixtureLexError> {
    let mut tokens = Vec::new();
    let mut lexer = Lexeme::lexer(source);
    let mut line: u32 = 1;
    let mut line_start: usize = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        let newlines_before = source[line_start..span.start].matches('\n').count() as u32;
        line += newlines_before;
        if newlines_before > 0 {
            line_start += source[line_start..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        }
        let column = (span.start - line_start + 1) as u32;

        let lexeme = result.map_err(|_| FixtureLexError { line, column })?;

        let kind = if let Some(kw) = keyword_for(lexeme) {
            TokenKind::Keyword(kw)
        } else if let Some(p) = punct_for(lexeme) {
            TokenKind::Punct(p)
        } else {
            match lexeme {
                Lexeme::Identifier => TokenKind::Identifier,
                Lexeme::IntLiteral => TokenKind::IntLiteral,
                Lexeme::FloatLiteral => TokenKind::FloatLiteral,
                Lexeme::StringLiteral => TokenKind::StringLiteral,
                Lexeme::CharLiteral => TokenKind::CharLiteral,
                _ => unreachable!("every Lexeme variant is a keyword, punct, or handled above"),
            }
        };

        tokens.push(Token {
            kind,
            text: text.to_string(),
            line,
            column,
            file_index,
        });

        let trailing_newlines = text.matches('\n').count() as u32;
        line += trailing_newlines;
    }

    Ok(VecTokenStream::new(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::TokenStream;

    #[test]
    fn tokenizes_a_struct_declaration() {
        let mut stream = tokenize("struct Point { int x; };", 0).unwrap();
        assert_eq!(stream.advance().kind, TokenKind::Keyword(Keyword::Struct));
        assert_eq!(stream.advance().kind, TokenKind::Identifier);
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::LBrace));
        assert_eq!(stream.advance().kind, TokenKind::Identifier);
        assert_eq!(stream.advance().kind, TokenKind::Identifier);
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::Semicolon));
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::RBrace));
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::Semicolon));
    }

    #[test]
    fn shr_is_a_single_token_for_the_parser_to_split() {
        let mut stream = tokenize("vector<vector<int>>", 0).unwrap();
        for _ in 0..4 {
            stream.advance();
        }
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::Shr));
    }

    #[test]
    fn reports_an_error_on_an_unrecognized_character() {
        assert!(tokenize("int x = `;", 0).is_err());
    }
}
