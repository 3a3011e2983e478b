use llm_interface::{CompletionRequest, DigestGenerator, LlmProvider};
use mailer::DigestSink;
use reddit_client::ContentSource;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use subdigest::Pipeline;
use subdigest_core::{
    AppConfig, CollectionResult, CoreError, DeliveryError, Digest, Discussion, FetchError,
    GenerationError, ProviderErrorKind, ProviderFailure, TuningFile,
};
use tempfile::TempDir;

type EventLog = Arc<Mutex<Vec<String>>>;

fn record(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

struct StubSource {
    log: EventLog,
    fail: bool,
}

impl ContentSource for StubSource {
    async fn collect_daily_content(
        &self,
        community: &str,
        post_limit: usize,
        comments_per_post: usize,
    ) -> Result<CollectionResult, FetchError> {
        record(&self.log, "fetch");
        if self.fail {
            return Err(FetchError::Unreachable {
                url: "http://127.0.0.1:1/r/LocalLLaMA/top.json".to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let mut result = CollectionResult::new(community, post_limit, comments_per_post);
        result.discussions.push(Discussion {
            id: "abc".to_string(),
            title: "X".to_string(),
            author: "alice".to_string(),
            score: 10,
            permalink: "https://www.reddit.com/r/LocalLLaMA/comments/abc/x/".to_string(),
            external_url: None,
            body: String::new(),
            created_utc: result.collected_at,
            num_comments: 0,
            comments: Vec::new(),
            links: BTreeSet::new(),
        });
        Ok(result)
    }
}

/// Records whether the snapshot already exists when it is asked for a completion.
struct StubProvider {
    log: EventLog,
    snapshot_path: PathBuf,
    outcome: Result<String, ProviderFailure>,
}

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> String {
        "stub".to_string()
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderFailure> {
        let snapshot_state = if self.snapshot_path.exists() {
            "generate(snapshot present)"
        } else {
            "generate(snapshot missing)"
        };
        record(&self.log, snapshot_state);
        self.outcome.clone()
    }
}

struct RecordingSink {
    log: EventLog,
    delivered: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl DigestSink for RecordingSink {
    async fn deliver(&self, title: &str, digest: &Digest) -> Result<(), DeliveryError> {
        record(&self.log, "deliver");
        if self.fail {
            return Err(DeliveryError::Smtp {
                reason: "535 authentication failed".to_string(),
                transient: false,
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((title.to_string(), digest.as_str().to_string()));
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    snapshot_path: PathBuf,
    config: AppConfig,
    log: EventLog,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("reddit_content.json");
        let snapshot_value = snapshot_path.display().to_string();
        let config = AppConfig::from_lookup(
            |key| match key {
                "REDDIT_SUBREDDIT" => Some("LocalLLaMA".to_string()),
                "PRIMARY_API_KEY" => Some("sk-test".to_string()),
                "SNAPSHOT_PATH" => Some(snapshot_value.clone()),
                _ => None,
            },
            TuningFile::default(),
            false,
        )
        .unwrap();

        Self {
            _dir: dir,
            snapshot_path,
            config,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn pipeline(
        &self,
        fetch_fails: bool,
        outcome: Result<String, ProviderFailure>,
        delivery_fails: bool,
    ) -> Pipeline<StubSource, RecordingSink> {
        let source = StubSource {
            log: self.log.clone(),
            fail: fetch_fails,
        };
        let generator = DigestGenerator::new(
            Box::new(StubProvider {
                log: self.log.clone(),
                snapshot_path: self.snapshot_path.clone(),
                outcome,
            }),
            None,
            &self.config.generation,
        );
        let sink = RecordingSink {
            log: self.log.clone(),
            delivered: Mutex::new(Vec::new()),
            fail: delivery_fails,
        };
        Pipeline::new(&self.config, source, generator, sink)
    }

    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(false, Ok("# Newsletter\n## Tema 1 🚀\nConteúdo".to_string()), false);

    let report = pipeline.run().await.unwrap();

    assert_eq!(
        harness.events(),
        vec!["fetch", "generate(snapshot present)", "deliver"]
    );
    assert_eq!(report.discussions, 1);
    assert_eq!(report.snapshot.as_deref(), Some(harness.snapshot_path.as_path()));
    assert_eq!(report.digest.as_str(), "# Newsletter\n## Tema 1 🚀\nConteúdo");

    let delivered = pipeline.sink().delivered.lock().unwrap().clone();
    assert_eq!(
        delivered,
        vec![(
            "LocalLLaMA Community Newsletter".to_string(),
            "# Newsletter\n## Tema 1 🚀\nConteúdo".to_string()
        )]
    );
}

#[tokio::test]
async fn test_fetch_failure_stops_the_run() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(true, Ok("# unused".to_string()), false);

    let error = pipeline.run().await.unwrap_err();

    assert!(matches!(error, CoreError::Fetch(FetchError::Unreachable { .. })));
    assert_eq!(harness.events(), vec!["fetch"]);
    assert!(!harness.snapshot_path.exists());
}

#[tokio::test]
async fn test_generation_failure_skips_delivery() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        false,
        Err(ProviderFailure::new(ProviderErrorKind::QuotaExceeded, "Insufficient Balance")),
        false,
    );

    let error = pipeline.run().await.unwrap_err();

    match error {
        CoreError::Generation(GenerationError::AllProvidersFailed { primary, backup }) => {
            assert_eq!(primary.kind, ProviderErrorKind::QuotaExceeded);
            assert!(backup.is_none());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.events(), vec!["fetch", "generate(snapshot present)"]);
    // The snapshot is kept for inspection even though the run failed
    assert!(harness.snapshot_path.exists());
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(false, Ok("# Digest".to_string()), true);

    let error = pipeline.run().await.unwrap_err();

    assert!(matches!(error, CoreError::Delivery(DeliveryError::Smtp { .. })));
    assert_eq!(error.stage(), "deliver");
    assert_eq!(
        harness.events(),
        vec!["fetch", "generate(snapshot present)", "deliver"]
    );
}

#[tokio::test]
async fn test_snapshot_failure_is_not_fatal() {
    let mut harness = Harness::new();
    let blocker = harness._dir.path().join("blocker");
    std::fs::write(&blocker, "a file where a directory is expected").unwrap();
    harness.config.snapshot_path = blocker.join("reddit_content.json");
    harness.snapshot_path = harness.config.snapshot_path.clone();

    let pipeline = harness.pipeline(false, Ok("# Digest".to_string()), false);
    let report = pipeline.run().await.unwrap();

    assert!(report.snapshot.is_none());
    assert_eq!(
        harness.events(),
        vec!["fetch", "generate(snapshot missing)", "deliver"]
    );
}
