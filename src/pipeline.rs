//! Fetch → Snapshot → Generate → Deliver, one stage after the other.

use llm_interface::DigestGenerator;
use mailer::DigestSink;
use reddit_client::ContentSource;
use snapshot::SnapshotWriter;
use std::io::Write;
use std::path::PathBuf;
use subdigest_core::{AppConfig, CoreError, DeliveryError, Digest, ErrorReporter};
use tracing::{info, warn};
use uuid::Uuid;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub discussions: usize,
    pub comments: usize,
    /// `None` when the snapshot could not be written.
    pub snapshot: Option<PathBuf>,
    pub digest: Digest,
}

pub struct Pipeline<S, D> {
    source: S,
    generator: DigestGenerator,
    snapshot: SnapshotWriter,
    sink: D,
    reporter: ErrorReporter,
    community: String,
    title: String,
    post_limit: usize,
    comments_per_post: usize,
}

impl<S, D> Pipeline<S, D>
where
    S: ContentSource,
    D: DigestSink,
{
    pub fn new(config: &AppConfig, source: S, generator: DigestGenerator, sink: D) -> Self {
        Self {
            source,
            generator,
            snapshot: SnapshotWriter::new(config.snapshot_path.clone()),
            sink,
            reporter: ErrorReporter::new(),
            community: config.community.clone(),
            title: config.newsletter_title.clone(),
            post_limit: config.collection.post_limit,
            comments_per_post: config.collection.comments_per_post,
        }
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub async fn run(&self) -> Result<RunReport, CoreError> {
        info!(stage = "fetch", community = %self.community, "Collecting content");
        let result = self
            .source
            .collect_daily_content(&self.community, self.post_limit, self.comments_per_post)
            .await?;

        info!(stage = "snapshot", run_id = %result.run_id, "Writing snapshot");
        let snapshot = match self.snapshot.write(&result).await {
            Ok(path) => Some(path),
            Err(e) => {
                self.reporter.report_warning(&CoreError::Snapshot(e));
                warn!("Snapshot not written, continuing");
                None
            }
        };

        info!(stage = "generate", run_id = %result.run_id, "Generating digest");
        let digest = self.generator.generate(&result, &self.title).await?;

        info!(stage = "deliver", run_id = %result.run_id, "Delivering digest");
        self.sink.deliver(&self.title, &digest).await?;

        info!(
            run_id = %result.run_id,
            discussions = result.discussions.len(),
            comments = result.comment_count(),
            "Run complete"
        );

        Ok(RunReport {
            run_id: result.run_id,
            discussions: result.discussions.len(),
            comments: result.comment_count(),
            snapshot,
            digest,
        })
    }
}

/// Prints the digest instead of mailing it.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl DigestSink for StdoutSink {
    async fn deliver(&self, _title: &str, digest: &Digest) -> Result<(), DeliveryError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", digest)
            .and_then(|_| stdout.flush())
            .map_err(|e| DeliveryError::MessageBuild {
                reason: format!("could not write digest to stdout: {}", e),
            })
    }
}
