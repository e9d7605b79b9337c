//! The SQL expression AST rewritten by the nullsem passes, and the factory used to construct it.

pub mod ast;
pub mod factory;

pub use factory::{FunctionNullability, SqlExpressionFactory};
