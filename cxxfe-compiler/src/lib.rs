pub mod codegen; // IR lowering: functions, expressions, statements, lambdas
pub mod config; // CompileContext, MangleAbi, DataModel
pub mod driver; // End-to-end source-string -> IrModule pipeline
pub mod eval; // Constant-expression evaluation
pub mod lazy_member; // Lazy, cached member-of-type resolution (spec §4.5.5)
pub mod mangle; // Name-mangling contract, not an implementation of one ABI
pub mod parser; // Recursive-descent parser driving template instantiation on demand
pub mod symbols; // Scoped symbol table and overload resolution
pub mod template; // Instantiation queue, substitutor, instantiator
pub mod types; // Type registry and type-trait evaluation

pub use cxxfe_diagnostics as diagnostics;

pub use codegen::IrGenerator;
pub use config::{CompileContext, DataModel, MangleAbi};
pub use driver::{compile_source, compile_source_with_mangler, CompilationResult, CompileSourceError};
pub use diagnostics::{error_codes, Diagnostic, DiagnosticEngine, ErrorLevel, Span};
pub use eval::{ConstExprEvaluator, ConstValue, EvalError};
pub use lazy_member::{LazyMemberResolver, MemberResolutionResult};
pub use mangle::{mangle_and_intern, DemoMangler, ManglingInputs, NameMangler};
pub use parser::{ParseError, Parser};
pub use symbols::{resolve_overload, ArgType, ConversionRank, InsertOutcome, OverloadResolution, ScopeKind, SymbolEntry, SymbolTable, Upgrade};
pub use template::{InstantiationError, InstantiationQueue, TemplateInstantiator, TypeResolver};
pub use types::{evaluate_binary_type_trait, evaluate_type_trait, TraitQuery, TypeRegistry, TypeTraitResult};
