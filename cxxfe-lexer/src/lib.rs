//! The token contract the parser is generic over (spec §6.1), plus a
//! fixture tokenizer for tests and demos. The real C++ lexer — with its
//! preprocessor, raw strings, and locale handling — is an external
//! collaborator per spec §1; this crate does not attempt to be it.

pub mod fixture;
pub mod stream;
pub mod token;

pub use fixture::{tokenize, FixtureLexError};
pub use stream::{Cursor, TokenStream, VecTokenStream};
pub use token::{Keyword, Punct, Token, TokenKind};
