//! Handles, string interning, the AST arena, and the IR instruction model
//! shared by the rest of the `cxxfe` front end.
//!
//! Split out of the main compiler crate the way `vex-ast` is split out of
//! `vex-compiler`: this crate owns data, the compiler crate owns behavior.

pub mod arena;
pub mod ast;
pub mod handles;
pub mod interner;
pub mod ir;
pub mod loc;

pub use arena::{AnyNodeId, ArenaWatermark, AstArena};
pub use ast::{BlockId, ExprId, FunctionId, ItemId, StmtId, StructId, TypeSpecId};
pub use handles::{NamespaceHandle, StringHandle, TempVar, TypeIndex};
pub use interner::StringInterner;
pub use loc::SourceLoc;
