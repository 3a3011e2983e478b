use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use subdigest_core::{
    GenerationError, GenerationSettings, ProviderConfig, ProviderErrorKind, ProviderFailure,
    ProviderRole,
};
use tracing::debug;

use super::{CompletionRequest, LlmProvider};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const MAX_ERROR_SNIPPET_CHARS: usize = 200;

/// Remote LLM provider using an OpenAI-compatible chat completions API
pub struct OpenAiCompatibleProvider {
    role: ProviderRole,
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        config: &ProviderConfig,
        settings: &GenerationSettings,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GenerationError::ClientBuild {
                provider: config.role.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            role: config.role,
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> String {
        format!("{} ({})", self.role, self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderFailure> {
        let req_body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            provider = %self.role,
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_failure(&e))?;
        let parsed = serde_json::from_str::<ChatResponse>(&body);

        debug!(provider = %self.role, status = status.as_u16(), "Received completion response");

        if !status.is_success() {
            let api_error = match parsed {
                Ok(ChatResponse::Error { error }) => Some(error),
                _ => None,
            };
            return Err(status_failure(status, api_error, &body));
        }

        match parsed {
            Ok(ChatResponse::Error { error }) => Err(error.into_failure(ProviderErrorKind::ApiError)),
            Ok(ChatResponse::Completion(completion)) => completion.into_text(),
            Err(e) => Err(ProviderFailure::new(
                ProviderErrorKind::MalformedResponse,
                format!("undecodable completion ({}): {}", e, snippet(&body)),
            )),
        }
    }
}

/// Appends the chat completions path unless the base URL already names it.
pub fn chat_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CHAT_COMPLETIONS_PATH)
    }
}

pub fn kind_for_status(status: StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        401 | 403 => ProviderErrorKind::Authentication,
        402 => ProviderErrorKind::QuotaExceeded,
        429 => ProviderErrorKind::RateLimited,
        500..=599 => ProviderErrorKind::ServerError,
        _ => ProviderErrorKind::ApiError,
    }
}

fn status_failure(status: StatusCode, api_error: Option<ApiErrorBody>, body: &str) -> ProviderFailure {
    let kind = kind_for_status(status);
    match api_error {
        Some(error) => {
            let failure = error.into_failure(kind);
            ProviderFailure::new(failure.kind, format!("HTTP {}: {}", status.as_u16(), failure.message))
        }
        None => ProviderFailure::new(kind, format!("HTTP {}: {}", status.as_u16(), snippet(body))),
    }
}

fn transport_failure(error: &reqwest::Error) -> ProviderFailure {
    if error.is_timeout() {
        ProviderFailure::new(ProviderErrorKind::Timeout, error.to_string())
    } else {
        ProviderFailure::new(ProviderErrorKind::Network, error.to_string())
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_ERROR_SNIPPET_CHARS).collect();
    if cut.len() < trimmed.len() {
        cut.push('…');
    }
    cut
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// A response body is either an API error payload or a completion, whatever the status.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatResponse {
    Error { error: ApiErrorBody },
    Completion(ChatCompletion),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Detailed {
        message: String,
        #[serde(rename = "type", default)]
        error_type: Option<String>,
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    Text(String),
}

impl ApiErrorBody {
    /// Refines `fallback` with what the payload says about the cause.
    fn into_failure(self, fallback: ProviderErrorKind) -> ProviderFailure {
        match self {
            ApiErrorBody::Detailed {
                message,
                error_type,
                code,
            } => {
                let code = code.map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                });
                let markers = format!(
                    "{} {}",
                    error_type.as_deref().unwrap_or_default(),
                    code.as_deref().unwrap_or_default()
                )
                .to_lowercase();

                let kind = if markers.contains("quota") || markers.contains("balance") {
                    ProviderErrorKind::QuotaExceeded
                } else if markers.contains("rate_limit") {
                    ProviderErrorKind::RateLimited
                } else if markers.contains("api_key") || markers.contains("authentication") {
                    ProviderErrorKind::Authentication
                } else {
                    fallback
                };
                ProviderFailure::new(kind, message)
            }
            ApiErrorBody::Text(message) => ProviderFailure::new(fallback, message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletion {
    fn into_text(self) -> Result<String, ProviderFailure> {
        let model = self.model.unwrap_or_default();
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            ProviderFailure::new(ProviderErrorKind::EmptyResponse, "response has no choices")
        })?;

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => {
                debug!(
                    model = %model,
                    finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
                    chars = content.chars().count(),
                    "Completion received"
                );
                Ok(content)
            }
            _ => Err(ProviderFailure::new(
                ProviderErrorKind::EmptyResponse,
                "completion content is empty",
            )),
        }
    }
}
