//! Logging configuration for the nullsem crates.
//!
//! Everything logs through the [tracing] family of crates; binaries embedding the rewriter call
//! [`Options::init`] once at startup, and tests call [`init_test_logging`].

use clap::Args;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod error;
pub use error::Error;
mod logformat;
pub use logformat::{InvalidLogFormat, LogFormat};

#[derive(Debug, Clone, Args)]
#[group(id = "logging")]
pub struct Options {
    /// Format to use when emitting log events: one of compact, full or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "full")]
    pub log_format: LogFormat,

    /// Disable colors in all log output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log level filter for spans and events. The log level filter string is a comma separated
    /// list of directives.
    /// See [`tracing_subscriber::EnvFilter`] for full documentation on the directive syntax.
    ///
    /// Examples:
    ///
    /// Log at INFO level for all crates and dependencies.
    /// ```bash
    /// LOG_LEVEL=info
    /// ```
    ///
    /// Trace every expansion chosen by the nullability rewriter.
    /// ```bash
    /// LOG_LEVEL=info,nullsem_passes=trace
    /// ```
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Full,
            no_color: false,
            log_level: "info".to_owned(),
        }
    }
}

impl Options {
    fn filter(&self) -> Result<EnvFilter, Error> {
        Ok(EnvFilter::builder().parse(&self.log_level)?)
    }

    /// Install the global subscriber. Fails if the log level directives do not parse, or if a
    /// global subscriber has already been installed.
    pub fn init(&self) -> Result<(), Error> {
        let builder = fmt()
            .with_env_filter(self.filter()?)
            .with_ansi(!self.no_color);
        match self.log_format {
            LogFormat::Compact => builder.compact().finish().try_init()?,
            LogFormat::Full => builder.finish().try_init()?,
            LogFormat::Pretty => builder.pretty().finish().try_init()?,
        }
        Ok(())
    }
}

/// Configure the global tracing subscriber for logging inside of tests
pub fn init_test_logging() {
    // This errors out if it's already been called within the scope of a process, which we don't
    // care about, so we just discard the result
    let _ = fmt()
        .with_env_filter(EnvFilter::from_env("LOG_LEVEL"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        logging: Options,
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["nullsem"]);
        assert_eq!(cli.logging.log_format, LogFormat::Full);
        assert_eq!(cli.logging.log_level, "info");
        assert!(!cli.logging.no_color);
    }

    #[test]
    fn parses_log_format() {
        let cli = Cli::parse_from(["nullsem", "--log-format", "compact", "--no-color"]);
        assert_eq!(cli.logging.log_format, LogFormat::Compact);
        assert!(cli.logging.no_color);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let options = Options {
            log_level: "info,nullsem_passes=loud".to_owned(),
            ..Default::default()
        };
        assert!(matches!(options.filter(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_logging_can_be_initialized_twice() {
        init_test_logging();
        init_test_logging();
    }
}
