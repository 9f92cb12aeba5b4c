//! Process-wide `tracing` subscriber setup.

use std::str::FromStr;

use flakeseg_error::{FlakeError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";
/// Environment variable selecting the [`LogFormat`].
pub const LOG_FORMAT_ENV: &str = "FLAKESEG_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = FlakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(FlakeError::invalid_config(format!(
                "{LOG_FORMAT_ENV}: unknown log format {other:?}"
            ))),
        }
    }
}

impl LogFormat {
    /// Read [`LOG_FORMAT_ENV`], defaulting to [`LogFormat::Text`].
    pub fn from_env() -> Result<Self> {
        std::env::var(LOG_FORMAT_ENV).map_or(Ok(Self::Text), |raw| raw.parse())
    }
}

/// Install the global subscriber, filtered by `RUST_LOG`.
///
/// Fails instead of panicking if a global subscriber is already set.
pub fn init_logging(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry.with(fmt::layer().compact().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    installed.map_err(|e| FlakeError::internal(format!("cannot install log subscriber: {e}")))
}
