use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Fetch(e) => {
                error!("Fetch error details: {:?}", e);
            }
            CoreError::Generation(GenerationError::AllProvidersFailed { primary, backup }) => {
                error!(kind = %primary.kind, "Primary provider failure: {}", primary.message);
                match backup {
                    Some(backup) => {
                        error!(kind = %backup.kind, "Backup provider failure: {}", backup.message)
                    }
                    None => error!("No backup provider was configured"),
                }
            }
            CoreError::Generation(e) => {
                error!("Generation error details: {:?}", e);
            }
            CoreError::Delivery(e) => {
                error!("Delivery error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            CoreError::Snapshot(e) => {
                error!("Snapshot error details: {:?}", e);
            }
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Fetch(e) => e.is_retryable(),
            CoreError::Generation(e) => e.is_retryable(),
            CoreError::Delivery(e) => e.is_retryable(),
            CoreError::Config(e) => e.is_retryable(),
            CoreError::Snapshot(e) => e.is_retryable(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Fetch(e) => e.retry_after(),
            CoreError::Generation(e) => e.retry_after(),
            CoreError::Delivery(e) => e.retry_after(),
            CoreError::Config(e) => e.retry_after(),
            CoreError::Snapshot(e) => e.retry_after(),
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Fetch(e) => e.user_friendly_message(),
            CoreError::Generation(e) => e.user_friendly_message(),
            CoreError::Delivery(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Snapshot(e) => e.user_friendly_message(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Fetch(e) => e.error_code(),
            CoreError::Generation(e) => e.error_code(),
            CoreError::Delivery(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Snapshot(e) => e.error_code(),
        }
    }
}

impl CoreError {
    /// Name of the pipeline stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            CoreError::Fetch(_) => "fetch",
            CoreError::Generation(_) => "generate",
            CoreError::Delivery(_) => "deliver",
            CoreError::Config(_) => "config",
            CoreError::Snapshot(_) => "snapshot",
        }
    }
}

impl ErrorExt for FetchError {
    fn log_error(&self) -> &Self {
        error!("FetchError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("FetchError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Unreachable { .. } => true,
            FetchError::RequestTimeout { .. } => true,
            FetchError::RateLimitExceeded { .. } => true,
            FetchError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            FetchError::Unreachable { .. } => {
                "The forum could not be reached. Please check your internet connection."
                    .to_string()
            }
            FetchError::RequestTimeout { .. } => {
                "Request to the forum timed out. Please try again.".to_string()
            }
            FetchError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            FetchError::CommunityNotFound { community } => {
                format!("Community '{}' not found or is private.", community)
            }
            FetchError::Forbidden { resource } => format!(
                "Access denied to {}. The community may be private or quarantined.",
                resource
            ),
            _ => "The forum returned an unexpected response. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            FetchError::Unreachable { .. } => "FETCH_UNREACHABLE".to_string(),
            FetchError::RequestTimeout { .. } => "FETCH_TIMEOUT".to_string(),
            FetchError::RateLimitExceeded { .. } => "FETCH_RATE_LIMIT".to_string(),
            FetchError::CommunityNotFound { .. } => "FETCH_COMMUNITY_NOT_FOUND".to_string(),
            FetchError::Forbidden { .. } => "FETCH_FORBIDDEN".to_string(),
            FetchError::ServerError { .. } => "FETCH_SERVER_ERROR".to_string(),
            FetchError::UnexpectedStatus { .. } => "FETCH_UNEXPECTED_STATUS".to_string(),
            FetchError::InvalidResponse { .. } => "FETCH_INVALID_RESPONSE".to_string(),
            FetchError::ClientBuild { .. } => "FETCH_CLIENT_BUILD".to_string(),
        }
    }
}

impl ErrorExt for GenerationError {
    fn log_error(&self) -> &Self {
        error!("GenerationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("GenerationError (warning): {}", self);
        self
    }

    // Both providers have already been tried once; the run is not retried.
    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            GenerationError::AllProvidersFailed { primary, backup } => {
                let mut message = format!(
                    "The primary AI provider failed ({}): {}",
                    primary.kind,
                    primary.user_friendly_message()
                );
                match backup {
                    Some(backup) => message.push_str(&format!(
                        " The backup AI provider also failed ({}): {}",
                        backup.kind,
                        backup.user_friendly_message()
                    )),
                    None => message.push_str(" No backup provider is configured."),
                }
                message
            }
            GenerationError::ClientBuild { provider, .. } => {
                format!("Could not set up the connection to {}.", provider)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            GenerationError::AllProvidersFailed { .. } => {
                "GENERATION_ALL_PROVIDERS_FAILED".to_string()
            }
            GenerationError::ClientBuild { .. } => "GENERATION_CLIENT_BUILD".to_string(),
        }
    }
}

impl ErrorExt for ProviderFailure {
    fn log_error(&self) -> &Self {
        error!("ProviderFailure: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ProviderFailure (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Network
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::ServerError
        )
    }

    // A provider is never retried against itself within a run.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self.kind {
            ProviderErrorKind::Authentication => {
                "Authentication failed. Please check your API key.".to_string()
            }
            ProviderErrorKind::QuotaExceeded => {
                "The account has run out of credits or quota.".to_string()
            }
            ProviderErrorKind::RateLimited => {
                "Rate limit exceeded. Please wait before trying again.".to_string()
            }
            ProviderErrorKind::EmptyResponse | ProviderErrorKind::MalformedResponse => {
                "The AI provider returned an unusable response.".to_string()
            }
            _ => "AI service error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self.kind {
            ProviderErrorKind::Network => "LLM_NETWORK".to_string(),
            ProviderErrorKind::Timeout => "LLM_TIMEOUT".to_string(),
            ProviderErrorKind::Authentication => "LLM_AUTH_FAILED".to_string(),
            ProviderErrorKind::RateLimited => "LLM_RATE_LIMIT".to_string(),
            ProviderErrorKind::QuotaExceeded => "LLM_QUOTA_EXCEEDED".to_string(),
            ProviderErrorKind::ServerError => "LLM_SERVER_ERROR".to_string(),
            ProviderErrorKind::ApiError => "LLM_API_ERROR".to_string(),
            ProviderErrorKind::EmptyResponse => "LLM_EMPTY_RESPONSE".to_string(),
            ProviderErrorKind::MalformedResponse => "LLM_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for DeliveryError {
    fn log_error(&self) -> &Self {
        error!("DeliveryError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DeliveryError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Smtp { transient: true, .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(30))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DeliveryError::NoRecipients => {
                "No recipients configured. Set EMAIL_TO to one or more addresses.".to_string()
            }
            DeliveryError::InvalidAddress { address } => {
                format!("'{}' is not a valid email address.", address)
            }
            DeliveryError::TransportSetup { server, .. } => {
                format!("Could not connect to the SMTP server {}.", server)
            }
            DeliveryError::Smtp { transient: false, .. } => {
                "The SMTP server rejected the message. Check your username and password."
                    .to_string()
            }
            _ => "Email delivery failed. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DeliveryError::NoRecipients => "DELIVERY_NO_RECIPIENTS".to_string(),
            DeliveryError::InvalidAddress { .. } => "DELIVERY_INVALID_ADDRESS".to_string(),
            DeliveryError::MessageBuild { .. } => "DELIVERY_MESSAGE_BUILD".to_string(),
            DeliveryError::TransportSetup { .. } => "DELIVERY_TRANSPORT_SETUP".to_string(),
            DeliveryError::Smtp { .. } => "DELIVERY_SMTP".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors need user intervention
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::Unreadable { .. } => "CONFIG_FILE_UNREADABLE".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

impl ErrorExt for SnapshotError {
    fn log_error(&self) -> &Self {
        error!("SnapshotError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SnapshotError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SnapshotError::Io { path, .. } => {
                format!("Could not write the snapshot file {}.", path.display())
            }
            SnapshotError::Serialization(_) => {
                "Collected content could not be serialized.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            SnapshotError::Io { .. } => "SNAPSHOT_IO".to_string(),
            SnapshotError::Serialization(_) => "SNAPSHOT_SERIALIZATION".to_string(),
        }
    }
}

/// What the reporter logged about one error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummary {
    pub stage: &'static str,
    pub code: String,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ErrorSummary {
    pub fn of(error: &CoreError) -> Self {
        Self {
            stage: error.stage(),
            code: error.error_code(),
            message: error.user_friendly_message(),
            retry_after: error.retry_after().filter(|_| error.is_retryable()),
        }
    }
}

/// Logs stage, code and friendly message for pipeline errors.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    /// Fatal: the run stops after this.
    pub fn report_error(&self, error: &CoreError) -> ErrorSummary {
        let summary = ErrorSummary::of(error);
        error.log_error();
        info!("Failed stage: {}", summary.stage);
        info!("Error code: {}", summary.code);
        info!("User message: {}", summary.message);
        if let Some(retry_after) = summary.retry_after {
            info!("Error is retryable. Retry after: {:?}", retry_after);
        }
        summary
    }

    /// Absorbed: the run continues.
    pub fn report_warning(&self, error: &CoreError) -> ErrorSummary {
        let summary = ErrorSummary::of(error);
        error.log_warn();
        warn!(
            stage = summary.stage,
            error_code = %summary.code,
            "{}",
            summary.message
        );
        summary
    }
}
