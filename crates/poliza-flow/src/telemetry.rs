use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

// The HTTP stack logs every connection at debug; keep it out of wizard logs
// unless RUST_LOG asks for it explicitly.
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper=warn", "reqwest=warn", "h2=warn"];

#[derive(Debug)]
pub enum TelemetryError {
    InvalidFilter { value: String, source: ParseError },
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter { value, .. } => {
                write!(f, "APP_LOG_LEVEL '{value}' is not a valid tracing filter")
            }
            TelemetryError::AlreadyInstalled(err) => {
                write!(f, "could not install the log subscriber: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::AlreadyInstalled(err) => Some(&**err),
        }
    }
}

/// Filter for the configured level with HTTP-client chatter capped at warn.
/// `RUST_LOG`, when set and valid, replaces it entirely.
pub fn filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter =
        EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::InvalidFilter {
            value: config.log_level.clone(),
            source,
        })?;
    for quiet in QUIET_DEPENDENCIES {
        if let Ok(directive) = quiet.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

/// Installs the global subscriber on stderr, leaving stdout to command output.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(config.ansi)
        .compact()
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}
