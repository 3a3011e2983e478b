use subdigest_core::{
    AppConfig, CollectionResult, Digest, ErrorExt, GenerationError, GenerationSettings,
    ProviderErrorKind, ProviderFailure, ProviderRole,
};
use tracing::{debug, error, info, warn};

use crate::prompt::PromptBuilder;
use crate::remote::OpenAiCompatibleProvider;
use crate::{CompletionRequest, LlmProvider};

/// Progress of one digest generation across the primary and backup providers.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationState {
    NotStarted,
    TryingPrimary,
    TryingBackup { primary_failure: ProviderFailure },
    Success { role: ProviderRole, digest: Digest },
    Failed {
        primary: ProviderFailure,
        backup: Option<ProviderFailure>,
    },
}

impl GenerationState {
    pub fn start(self) -> Self {
        match self {
            GenerationState::NotStarted => GenerationState::TryingPrimary,
            other => other,
        }
    }

    /// Applies the outcome of the attempt the current state is waiting on.
    /// Blank text counts as a failed attempt.
    pub fn on_outcome(self, outcome: Result<String, ProviderFailure>, has_backup: bool) -> Self {
        let outcome = outcome.and_then(|text| {
            Digest::new(text).ok_or_else(|| {
                ProviderFailure::new(ProviderErrorKind::EmptyResponse, "provider returned blank text")
            })
        });

        match (self, outcome) {
            (GenerationState::TryingPrimary, Ok(digest)) => GenerationState::Success {
                role: ProviderRole::Primary,
                digest,
            },
            (GenerationState::TryingPrimary, Err(failure)) if has_backup => {
                GenerationState::TryingBackup {
                    primary_failure: failure,
                }
            }
            (GenerationState::TryingPrimary, Err(failure)) => GenerationState::Failed {
                primary: failure,
                backup: None,
            },
            (GenerationState::TryingBackup { .. }, Ok(digest)) => GenerationState::Success {
                role: ProviderRole::Backup,
                digest,
            },
            (GenerationState::TryingBackup { primary_failure }, Err(failure)) => {
                GenerationState::Failed {
                    primary: primary_failure,
                    backup: Some(failure),
                }
            }
            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationState::Success { .. } | GenerationState::Failed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::NotStarted => "not_started",
            GenerationState::TryingPrimary => "trying_primary",
            GenerationState::TryingBackup { .. } => "trying_backup",
            GenerationState::Success { .. } => "success",
            GenerationState::Failed { .. } => "failed",
        }
    }
}

/// Turns a collection into a digest, falling back to the backup provider once.
pub struct DigestGenerator {
    primary: Box<dyn LlmProvider>,
    backup: Option<Box<dyn LlmProvider>>,
    prompts: PromptBuilder,
    temperature: f32,
}

impl DigestGenerator {
    pub fn new(
        primary: Box<dyn LlmProvider>,
        backup: Option<Box<dyn LlmProvider>>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            primary,
            backup,
            prompts: PromptBuilder::new(settings),
            temperature: settings.temperature,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        let primary: Box<dyn LlmProvider> = Box::new(OpenAiCompatibleProvider::new(
            &config.primary,
            &config.generation,
        )?);

        let backup = match &config.backup {
            Some(backup_config) => Some(Box::new(OpenAiCompatibleProvider::new(
                backup_config,
                &config.generation,
            )?) as Box<dyn LlmProvider>),
            None => None,
        };

        Ok(Self::new(primary, backup, &config.generation))
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    pub async fn generate(
        &self,
        result: &CollectionResult,
        title: &str,
    ) -> Result<Digest, GenerationError> {
        let prompt = self.prompts.build(result, title);
        info!(
            discussions = prompt.included,
            omitted = prompt.omitted,
            prompt_chars = prompt.text.chars().count(),
            has_backup = self.has_backup(),
            "Generating digest"
        );

        let request = CompletionRequest {
            system: self.prompts.system_message(&result.community),
            prompt: prompt.text,
            temperature: self.temperature,
            max_tokens: None,
        };

        let mut state = GenerationState::NotStarted.start();
        while let Some(provider) = self.provider_for(&state) {
            let name = provider.name();
            debug!(provider = %name, state = state.label(), "Requesting completion");

            let outcome = provider.complete(&request).await;
            if let Err(failure) = &outcome {
                warn!(
                    provider = %name,
                    kind = %failure.kind,
                    error_code = %failure.error_code(),
                    transient = failure.is_retryable(),
                    "Provider attempt failed: {}",
                    failure.message
                );
            }

            state = state.on_outcome(outcome, self.has_backup());
            match &state {
                GenerationState::TryingBackup { .. } => {
                    info!("Falling back to backup provider");
                }
                GenerationState::Failed { backup: None, .. } => {
                    error!("Primary provider failed and no backup provider is configured");
                }
                _ => {}
            }
        }

        match state {
            GenerationState::Success { role, digest } => {
                info!(
                    provider = %role,
                    chars = digest.as_str().chars().count(),
                    "Digest generated"
                );
                Ok(digest)
            }
            GenerationState::Failed { primary, backup } => {
                Err(GenerationError::AllProvidersFailed { primary, backup })
            }
            other => Err(GenerationError::AllProvidersFailed {
                primary: ProviderFailure::new(
                    ProviderErrorKind::ApiError,
                    format!("generation stopped in state {}", other.label()),
                ),
                backup: None,
            }),
        }
    }

    fn provider_for(&self, state: &GenerationState) -> Option<&dyn LlmProvider> {
        match state {
            GenerationState::TryingPrimary => Some(self.primary.as_ref()),
            GenerationState::TryingBackup { .. } => self.backup.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: ProviderErrorKind) -> ProviderFailure {
        ProviderFailure::new(kind, "boom")
    }

    #[test]
    fn test_start_only_moves_from_not_started() {
        assert_eq!(GenerationState::NotStarted.start(), GenerationState::TryingPrimary);
        let failed = GenerationState::Failed {
            primary: failure(ProviderErrorKind::Network),
            backup: None,
        };
        assert_eq!(failed.clone().start(), failed);
    }

    #[test]
    fn test_primary_success() {
        let state = GenerationState::TryingPrimary.on_outcome(Ok("# Digest".to_string()), true);
        assert_eq!(
            state,
            GenerationState::Success {
                role: ProviderRole::Primary,
                digest: Digest::new("# Digest").unwrap(),
            }
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn test_primary_failure_with_backup() {
        let state = GenerationState::TryingPrimary
            .on_outcome(Err(failure(ProviderErrorKind::QuotaExceeded)), true);
        assert_eq!(
            state,
            GenerationState::TryingBackup {
                primary_failure: failure(ProviderErrorKind::QuotaExceeded)
            }
        );
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_primary_failure_without_backup_is_terminal() {
        let state =
            GenerationState::TryingPrimary.on_outcome(Err(failure(ProviderErrorKind::Timeout)), false);
        assert_eq!(
            state,
            GenerationState::Failed {
                primary: failure(ProviderErrorKind::Timeout),
                backup: None,
            }
        );
    }

    #[test]
    fn test_blank_text_is_a_failure() {
        let state = GenerationState::TryingPrimary.on_outcome(Ok("  \n".to_string()), true);
        match state {
            GenerationState::TryingBackup { primary_failure } => {
                assert_eq!(primary_failure.kind, ProviderErrorKind::EmptyResponse);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_backup_outcomes() {
        let trying_backup = GenerationState::TryingBackup {
            primary_failure: failure(ProviderErrorKind::Authentication),
        };

        let success = trying_backup
            .clone()
            .on_outcome(Ok("texto".to_string()), true);
        assert!(matches!(
            success,
            GenerationState::Success {
                role: ProviderRole::Backup,
                ..
            }
        ));

        let failed = trying_backup.on_outcome(Err(failure(ProviderErrorKind::ServerError)), true);
        assert_eq!(
            failed,
            GenerationState::Failed {
                primary: failure(ProviderErrorKind::Authentication),
                backup: Some(failure(ProviderErrorKind::ServerError)),
            }
        );
    }

    #[test]
    fn test_terminal_states_ignore_outcomes() {
        let success = GenerationState::Success {
            role: ProviderRole::Primary,
            digest: Digest::new("done").unwrap(),
        };
        assert_eq!(
            success.clone().on_outcome(Err(failure(ProviderErrorKind::Network)), true),
            success
        );
    }
}
