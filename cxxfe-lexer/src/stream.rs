//! The external-lexer contract: one-token lookahead, a single-slot injected
//! push-back (for `>>` → `>` `>` splitting, spec §4.4/§9), and a
//! save/restore cursor the parser uses for speculative parsing.

use crate::token::Token;

/// A `Cursor` captures everything the token-stream side of a speculative
/// parse needs to roll back: the current position and whatever sits in the
/// injected-token slot. The AST-arena side of a rewind is the parser's own
/// responsibility (`cxxfe_ast::AstArena::watermark`/`discard_since`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub position: usize,
    pub injected_present: bool,
}

pub trait TokenStream {
    /// One-token lookahead without consuming.
    fn peek(&self) -> &Token;

    /// Consumes and returns the current token, advancing the stream. If a
    /// token was injected (via `inject`), it is returned/consumed first.
    fn advance(&mut self) -> Token;

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, crate::token::TokenKind::Eof)
    }

    /// Pushes a single token to be returned by the *next* `advance`/`peek`,
    /// ahead of whatever the underlying stream would otherwise produce.
    /// Used to split a lexed `>>` into two `>` tokens during
    /// template-argument parsing. Only one slot exists: a second `inject`
    /// before the first is consumed is a parser bug.
    fn inject(&mut self, token: Token);

    fn save(&self) -> Cursor;
    fn restore(&mut self, cursor: Cursor);
}

/// A `TokenStream` over a fully materialized `Vec<Token>`. This is the only
/// concrete stream this crate ships; it is lexer-agnostic; any upstream
/// lexer that can produce a `Vec<Token>` can drive the parser through it.
pub struct VecTokenStream {
    tokens: Vec<Token>,
    position: usize,
    injected: Option<Token>,
    eof: Token,
}

impl VecTokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_loc = tokens
            .last()
            .map(|t| (t.line, t.column, t.file_index))
            .unwrap_or((1, 1, 0));
        VecTokenStream {
            tokens,
            position: 0,
            injected: None,
            eof: Token::eof(eof_loc.0, eof_loc.1, eof_loc.2),
        }
    }
}

impl TokenStream for VecTokenStream {
    fn peek(&self) -> &Token {
        if let Some(tok) = &self.injected {
            return tok;
        }
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        if let Some(tok) = self.injected.take() {
            return tok;
        }
        let tok = self.tokens.get(self.position).cloned().unwrap_or_else(|| self.eof.clone());
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        tok
    }

    fn inject(&mut self, token: Token) {
        debug_assert!(self.injected.is_none(), "injected-token slot already occupied");
        self.injected = Some(token);
    }

    fn save(&self) -> Cursor {
        Cursor {
            position: self.position,
            injected_present: self.injected.is_some(),
        }
    }

    fn restore(&mut self, cursor: Cursor) {
        self.position = cursor.position;
        if !cursor.injected_present {
            self.injected = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Punct, Token, TokenKind};

    fn punct(p: Punct) -> Token {
        Token {
            kind: TokenKind::Punct(p),
            text: String::new(),
            line: 1,
            column: 1,
            file_index: 0,
        }
    }

    #[test]
    fn save_restore_roundtrips_position_and_injection() {
        let mut stream = VecTokenStream::new(vec![punct(Punct::Gt), punct(Punct::Gt)]);
        let mark = stream.save();
        stream.advance();
        stream.inject(punct(Punct::Gt));
        stream.restore(mark);
        // After restore, the injected token from before the mark is gone
        // and the position is back to the start.
        assert_eq!(stream.peek().kind, TokenKind::Punct(Punct::Gt));
        assert_eq!(stream.save().position, 0);
    }

    #[test]
    fn inject_is_consumed_before_the_underlying_stream() {
        let mut stream = VecTokenStream::new(vec![punct(Punct::Semicolon)]);
        stream.inject(punct(Punct::Gt));
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::Gt));
        assert_eq!(stream.advance().kind, TokenKind::Punct(Punct::Semicolon));
    }
}
