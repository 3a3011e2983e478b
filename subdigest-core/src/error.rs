use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Fetch stage failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Generation stage failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Delivery stage failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Source unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Request to {url} timed out")]
    RequestTimeout { url: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Community not found: {community}")]
    CommunityNotFound { community: String },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Unexpected status {status_code} from {url}")]
    UnexpectedStatus { status_code: u16, url: String },

    #[error("Invalid response: {details}")]
    InvalidResponse { details: String },

    #[error("HTTP client could not be built: {reason}")]
    ClientBuild { reason: String },
}

/// Why a single provider attempt did not yield a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Network,
    Timeout,
    Authentication,
    RateLimited,
    QuotaExceeded,
    ServerError,
    ApiError,
    EmptyResponse,
    MalformedResponse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Authentication => "authentication",
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::QuotaExceeded => "quota exceeded",
            ProviderErrorKind::ServerError => "server error",
            ProviderErrorKind::ApiError => "api error",
            ProviderErrorKind::EmptyResponse => "empty response",
            ProviderErrorKind::MalformedResponse => "malformed response",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error(
        "All LLM providers failed (primary: {primary}; backup: {})",
        describe_backup(.backup)
    )]
    AllProvidersFailed {
        primary: ProviderFailure,
        backup: Option<ProviderFailure>,
    },

    #[error("HTTP client could not be built for {provider}: {reason}")]
    ClientBuild { provider: String, reason: String },
}

fn describe_backup(backup: &Option<ProviderFailure>) -> String {
    match backup {
        Some(failure) => failure.to_string(),
        None => "not configured".to_string(),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("No recipients configured")]
    NoRecipients,

    #[error("Invalid email address: {address}")]
    InvalidAddress { address: String },

    #[error("Failed to build email message: {reason}")]
    MessageBuild { reason: String },

    #[error("SMTP transport setup failed for {server}: {reason}")]
    TransportSetup { server: String, reason: String },

    #[error("SMTP send failed: {reason}")]
    Smtp { reason: String, transient: bool },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Could not read configuration file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
