use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::SdkError;

/// Install a console subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(default_filter: &str) -> Result<(), SdkError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| SdkError::Config(format!("log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| SdkError::Config(format!("logging already initialised: {e}")))
}
