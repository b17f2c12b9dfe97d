//! Compile-time evaluation (spec §4.6, §4.7).

pub mod constexpr;

pub use constexpr::{ConstExprEvaluator, ConstValue, EvalError};
