//! Observability (logging)
//!
//! Structured logging through `tracing`, rendered to stderr so log lines
//! never interleave with the interactive prompts on stdout.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// Single-line human readable output
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown log format '{other}' (expected pretty, compact or json)"
            )),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// Number of `-v` flags given on the command line
    pub verbosity: u8,

    /// Log line format
    pub format: LogFormat,
}

impl ObservabilityConfig {
    /// Create new observability config
    #[must_use]
    pub const fn new(verbosity: u8, format: LogFormat) -> Self {
        Self { verbosity, format }
    }

    /// Filter directive used when `RUST_LOG` is not set
    #[must_use]
    pub const fn default_directive(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "warn,bulk_mailer=info",
            2 => "info,bulk_mailer=debug",
            _ => "debug,bulk_mailer=trace",
        }
    }
}

/// Initialize the logging stack
///
/// `RUST_LOG` takes precedence over the verbosity-derived filter.
///
/// # Example
///
/// ```rust,no_run
/// use bulk_mailer::observability::{self, ObservabilityConfig};
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init(&ObservabilityConfig::default())?;
/// tracing::info!("bulk-mailer started");
/// # Ok(())
/// # }
/// ```
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}
