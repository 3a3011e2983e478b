//! Run configuration.
//!
//! Built once at process start from built-in defaults, an optional TOML
//! tuning file and the environment (in increasing precedence), then handed
//! to each component by reference.

use crate::error::ConfigError;
use crate::types::ProviderRole;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REDDIT_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_USER_AGENT: &str = concat!("subdigest/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_POST_LIMIT: usize = 20;
pub const DEFAULT_COMMENTS_PER_POST: usize = 5;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;
pub const DEFAULT_FETCH_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_PRIMARY_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_PRIMARY_MODEL: &str = "deepseek-chat";
pub const DEFAULT_LANGUAGE: &str = "Brazilian Portuguese";
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 60_000;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_NEWSLETTER_TITLE: &str = "LocalLLaMA Community Newsletter";
pub const DEFAULT_SNAPSHOT_PATH: &str = "reddit_content.json";

/// One LLM completion backend.
#[derive(Clone)]
pub struct ProviderConfig {
    pub role: ProviderRole,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("role", &self.role)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub base_url: String,
    pub user_agent: String,
    pub post_limit: usize,
    pub comments_per_post: usize,
    /// Pause before each per-discussion request.
    pub request_delay: Duration,
    pub retry_attempts: u32,
    pub timeout: Duration,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REDDIT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            post_limit: DEFAULT_POST_LIMIT,
            comments_per_post: DEFAULT_COMMENTS_PER_POST,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            retry_attempts: DEFAULT_FETCH_RETRY_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Language the digest prose is written in.
    pub language: String,
    pub max_prompt_chars: usize,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub community: String,
    pub newsletter_title: String,
    pub collection: CollectionSettings,
    pub generation: GenerationSettings,
    pub primary: ProviderConfig,
    /// Without a backup, a primary failure ends generation.
    pub backup: Option<ProviderConfig>,
    /// `None` only when delivery is disabled.
    pub smtp: Option<SmtpSettings>,
    pub snapshot_path: PathBuf,
}

/// Optional tuning file. Secrets are never read from it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningFile {
    pub collection: CollectionTuning,
    pub generation: GenerationTuning,
    pub output: OutputTuning,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionTuning {
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    pub post_limit: Option<usize>,
    pub comments_per_post: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationTuning {
    pub language: Option<String>,
    pub max_prompt_chars: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputTuning {
    pub snapshot_path: Option<PathBuf>,
    pub newsletter_title: Option<String>,
}

impl TuningFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Key lookup with blank values treated as unset.
struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: key.to_string(),
            })
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    field: key.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }
}

impl AppConfig {
    /// Reads the process environment, layered over an optional tuning file.
    pub fn load(config_path: Option<&Path>, require_smtp: bool) -> Result<Self, ConfigError> {
        let tuning = match config_path {
            Some(path) => TuningFile::load(path)?,
            None => TuningFile::default(),
        };
        Self::from_lookup(|key| std::env::var(key).ok(), tuning, require_smtp)
    }

    pub fn from_lookup<F>(
        lookup: F,
        tuning: TuningFile,
        require_smtp: bool,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Source { lookup };
        let defaults = CollectionSettings::default();
        let collection = CollectionSettings {
            base_url: env
                .optional("REDDIT_BASE_URL")
                .or(tuning.collection.base_url)
                .unwrap_or(defaults.base_url),
            user_agent: env
                .optional("USER_AGENT")
                .or(tuning.collection.user_agent)
                .unwrap_or(defaults.user_agent),
            post_limit: env
                .parsed("POST_LIMIT")?
                .or(tuning.collection.post_limit)
                .unwrap_or(defaults.post_limit),
            comments_per_post: env
                .parsed("COMMENTS_PER_POST")?
                .or(tuning.collection.comments_per_post)
                .unwrap_or(defaults.comments_per_post),
            request_delay: env
                .parsed("REQUEST_DELAY_MS")?
                .or(tuning.collection.request_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            retry_attempts: env
                .parsed("FETCH_RETRY_ATTEMPTS")?
                .or(tuning.collection.retry_attempts)
                .unwrap_or(defaults.retry_attempts),
            timeout: env
                .parsed("FETCH_TIMEOUT_SECS")?
                .or(tuning.collection.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            language: env
                .optional("DIGEST_LANGUAGE")
                .or(tuning.generation.language)
                .unwrap_or(defaults.language),
            max_prompt_chars: env
                .parsed("MAX_PROMPT_CHARS")?
                .or(tuning.generation.max_prompt_chars)
                .unwrap_or(defaults.max_prompt_chars),
            timeout: env
                .parsed("LLM_TIMEOUT_SECS")?
                .or(tuning.generation.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: env
                .parsed("LLM_TEMPERATURE")?
                .or(tuning.generation.temperature)
                .unwrap_or(defaults.temperature),
        };

        let primary = ProviderConfig {
            role: ProviderRole::Primary,
            api_key: env
                .optional("PRIMARY_API_KEY")
                .or_else(|| env.optional("OPENAI_API_KEY"))
                .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                    var_name: "PRIMARY_API_KEY".to_string(),
                })?,
            base_url: env
                .optional("PRIMARY_BASE_URL")
                .or_else(|| env.optional("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_PRIMARY_BASE_URL.to_string()),
            model: env
                .optional("PRIMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
        };

        let backup = match env.optional("BACKUP_API_KEY") {
            Some(api_key) => Some(ProviderConfig {
                role: ProviderRole::Backup,
                api_key,
                base_url: env.required("BACKUP_BASE_URL")?,
                model: env.required("BACKUP_MODEL")?,
            }),
            None => None,
        };

        let smtp = if require_smtp {
            let username = env.required("SMTP_USERNAME")?;
            let to = env
                .required("EMAIL_TO")?
                .split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_string)
                .collect();
            Some(SmtpSettings {
                server: env.required("SMTP_SERVER")?,
                port: env.parsed("SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT),
                password: env.required("SMTP_PASSWORD")?,
                from: env.optional("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                username,
                to,
            })
        } else {
            None
        };

        let config = Self {
            community: env.required("REDDIT_SUBREDDIT")?,
            newsletter_title: env
                .optional("NEWSLETTER_TITLE")
                .or(tuning.output.newsletter_title)
                .unwrap_or_else(|| DEFAULT_NEWSLETTER_TITLE.to_string()),
            collection,
            generation,
            primary,
            backup,
            smtp,
            snapshot_path: env
                .optional("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .or(tuning.output.snapshot_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.community.contains('/') || self.community.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "REDDIT_SUBREDDIT".to_string(),
                value: self.community.clone(),
            });
        }
        if self.collection.post_limit == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "POST_LIMIT must be at least 1".to_string(),
            });
        }
        if self.collection.retry_attempts == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "FETCH_RETRY_ATTEMPTS must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "LLM_TEMPERATURE".to_string(),
                value: self.generation.temperature.to_string(),
            });
        }
        validate_http_url("REDDIT_BASE_URL", &self.collection.base_url)?;
        validate_http_url("PRIMARY_BASE_URL", &self.primary.base_url)?;
        if let Some(backup) = &self.backup {
            validate_http_url("BACKUP_BASE_URL", &backup.base_url)?;
        }
        if let Some(smtp) = &self.smtp {
            if smtp.to.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: "EMAIL_TO must list at least one address".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid()),
    }
}
