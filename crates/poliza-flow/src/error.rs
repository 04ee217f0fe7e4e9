use crate::backoffice::GatewayError;
use crate::config::ConfigError;
use crate::flows::FlowError;
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Input(String),
    Gateway(GatewayError),
    Flow(FlowError),
}

impl AppError {
    /// True when the back office rejected our credentials and the user must sign in again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AppError::Gateway(GatewayError::Unauthorized) | AppError::Flow(FlowError::Unauthorized)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Input(message) => write!(f, "invalid input: {}", message),
            AppError::Gateway(err) => write!(f, "back-office error: {}", err),
            AppError::Flow(err) => write!(f, "flow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Input(_) => None,
            AppError::Gateway(err) => Some(err),
            AppError::Flow(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<FlowError> for AppError {
    fn from(value: FlowError) -> Self {
        Self::Flow(value)
    }
}
