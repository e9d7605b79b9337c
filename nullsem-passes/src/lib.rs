//! Rewriting passes over the nullsem SQL AST.
//!
//! The main entry point is [`SqlNullabilityProcessor`], which derives the nullability of every
//! node of a statement and rewrites comparisons so that they follow the configured null
//! semantics. [`RewriteCache`] memoizes its results across executions of the same statement.

pub mod cache;
pub mod nullability;
pub mod options;
pub mod parameters;

pub use cache::RewriteCache;
pub use nullability::{InValuesPartition, ProcessedExpr, ProcessedSelect, SqlNullabilityProcessor};
pub use options::NullSemanticsOptions;
pub use parameters::{ParameterValue, ParameterValues};
