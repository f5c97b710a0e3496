//! Tracing subscriber setup shared by the panel and the CLI.
//!
//! Everything is written to stderr so `--json` output on stdout stays
//! machine readable. `RUST_LOG` replaces the filter derived from `-v`/`-q`.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose logs are shown at the chosen level.
const OWN_TARGETS: &[&str] = &["infusion_reminder", "reminder"];

/// HTTP stack crates, capped at `warn` below trace verbosity.
const HTTP_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "axum"];

/// How much the panel and the CLI log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Checkups, deliveries and changed variables.
    #[default]
    Normal,
    /// Outbound requests and form handling.
    Verbose,
    /// Everything, including the HTTP stack.
    Trace,
}

impl Verbosity {
    /// Verbosity from the `-v` count and the `-q` flag; `-q` wins.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Level applied to this crate's targets.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_directives(self) -> String {
        let level = self.level();
        let http_level = if self == Self::Trace { Level::TRACE } else { Level::WARN };
        OWN_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .chain(
                HTTP_TARGETS
                    .iter()
                    .map(|target| format!("{target}={http_level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// A second call is a no-op.
///
/// ```no_run
/// use infusion_reminder::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directives()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}
