use std::env;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Distinguishes runtime behavior for different stages of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub backoffice: BackOfficeConfig,
    pub flow: FlowConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let raw_url =
            env::var("BACKOFFICE_URL").unwrap_or_else(|_| "http://localhost:5000/".to_string());
        let base_url = parse_base_url(&raw_url)?;

        let token_path = env::var("BACKOFFICE_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".poliza-flow/token"));

        let max_upload_mb = env::var("UPLOAD_MAX_MB")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|mb| *mb > 0)
            .ok_or(ConfigError::InvalidUploadLimit)?;

        let confidence_threshold = env::var("SCAN_CONFIDENCE_THRESHOLD")
            .unwrap_or_else(|_| "70".to_string())
            .parse::<f64>()
            .ok()
            .filter(|value| (0.0..=100.0).contains(value))
            .ok_or(ConfigError::InvalidConfidenceThreshold)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            backoffice: BackOfficeConfig {
                base_url,
                token_path,
            },
            flow: FlowConfig {
                max_upload_mb,
                confidence_threshold,
            },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
        })
    }
}

/// Where the back-office REST API lives and where its bearer token is persisted.
#[derive(Debug, Clone)]
pub struct BackOfficeConfig {
    pub base_url: Url,
    pub token_path: PathBuf,
}

/// Limits applied by the wizard flows before anything reaches the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConfig {
    pub max_upload_mb: u64,
    pub confidence_threshold: f64,
}

impl FlowConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: 10,
            confidence_threshold: 70.0,
        }
    }
}

/// Tracing controls. `log_level` takes any `EnvFilter` directive string.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

// Url::join drops the last path segment unless the base ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|source| ConfigError::InvalidBaseUrl { source })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBaseUrl { source: url::ParseError },
    InvalidUploadLimit,
    InvalidConfidenceThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl { .. } => {
                write!(f, "BACKOFFICE_URL must be an absolute http(s) URL")
            }
            ConfigError::InvalidUploadLimit => {
                write!(f, "UPLOAD_MAX_MB must be a positive whole number")
            }
            ConfigError::InvalidConfidenceThreshold => {
                write!(f, "SCAN_CONFIDENCE_THRESHOLD must be between 0 and 100")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidBaseUrl { source } => Some(source),
            ConfigError::InvalidUploadLimit | ConfigError::InvalidConfidenceThreshold => None,
        }
    }
}
