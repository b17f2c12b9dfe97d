//! Symbol and type model (spec §2 component 4, §3.4, §4.3).

pub mod overload;
pub mod scope;

pub use overload::{resolve_overload, ArgType, ConversionRank, OverloadResolution};
pub use scope::{InsertOutcome, ScopeKind, SymbolEntry, SymbolTable, Upgrade};
