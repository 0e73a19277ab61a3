//! `tracing` subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

use crate::config::RunConfig;
use crate::{GraphError, Result};

/// Install a formatting subscriber.
///
/// `RUST_LOG` takes precedence over `filter` when set. Returns `false` when a global
/// subscriber was already installed.
pub fn init(filter: &str) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env) => env,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| GraphError::config(format!("invalid log filter '{}': {}", filter, e)))?,
    };
    Ok(tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok())
}

/// Install a subscriber using the filter of a run configuration.
pub fn init_from_config(config: &RunConfig) -> Result<bool> {
    init(&config.log_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_reported() {
        // Another test may have installed one first; the second call never succeeds.
        let _ = init("warn").unwrap();
        assert!(!init("warn").unwrap());
    }
}
