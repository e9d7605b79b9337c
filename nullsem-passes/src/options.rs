use clap::Args;
use serde::{Deserialize, Serialize};

/// Configuration for null-semantics rewriting
#[derive(Clone, Debug, Default, PartialEq, Eq, Args, Serialize, Deserialize)]
#[group(id = "null_semantics")]
pub struct NullSemanticsOptions {
    /// Compare values using the database's native three-valued NULL semantics, in which any
    /// comparison against NULL is unknown. When unset, comparisons follow two-valued semantics,
    /// in which NULL is equal to NULL and unequal to everything else.
    #[arg(long, env = "USE_RELATIONAL_NULLS")]
    #[serde(default)]
    pub use_relational_nulls: bool,

    /// Rewrite every statement from scratch rather than reusing previously rewritten statements
    /// of the same shape
    #[arg(long, env = "DISABLE_REWRITE_CACHE")]
    #[serde(default)]
    pub disable_rewrite_cache: bool,
}

impl NullSemanticsOptions {
    pub fn relational() -> Self {
        Self {
            use_relational_nulls: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        options: NullSemanticsOptions,
    }

    #[test]
    fn defaults_to_two_valued_semantics() {
        let cli = Cli::parse_from(["nullsem"]);
        assert_eq!(cli.options, NullSemanticsOptions::default());
        assert!(!cli.options.use_relational_nulls);
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from(["nullsem", "--use-relational-nulls", "--disable-rewrite-cache"]);
        assert!(cli.options.use_relational_nulls);
        assert!(cli.options.disable_rewrite_cache);
    }
}
