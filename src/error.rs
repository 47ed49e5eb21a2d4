use thiserror::Error;

/// Errors surfaced by the omakase.in session client.
///
/// Transport and HTTP-status failures are transient and go through the retry
/// envelope; the auth variants signal that the session itself is the problem.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("login page did not contain a CSRF token")]
    AuthTokenMissing,

    #[error("authentication required (401) - login session may have expired")]
    SessionExpired,

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "configuration file '{0}' not found. \
         Please copy config.yaml.example to config.yaml and configure it."
    )]
    NotFound(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}
