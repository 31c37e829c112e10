use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::GatewayError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Calling this a second time returns
/// [`GatewayError::Telemetry`] instead of panicking.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), GatewayError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| GatewayError::Telemetry(e.to_string()))
}
