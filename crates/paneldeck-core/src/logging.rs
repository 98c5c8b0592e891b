#![forbid(unsafe_code)]

//! Opt-in tracing subscriber installation.
//!
//! Library code only emits `tracing` events. Hosts that want them printed
//! enable the `tracing-subscriber` feature and call [`init`] once at startup.
//! The filter is read from `PANELDECK_LOG` (same syntax as `RUST_LOG`) and
//! defaults to `info`.

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "PANELDECK_LOG";

/// Output encoding for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global subscriber. Returns `false` if one was already set or
/// the feature is disabled.
#[cfg(feature = "tracing-subscriber")]
pub fn init(format: LogFormat) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Install a global subscriber. Returns `false` if one was already set or
/// the feature is disabled.
#[cfg(not(feature = "tracing-subscriber"))]
pub fn init(_format: LogFormat) -> bool {
    false
}
