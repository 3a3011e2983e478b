use clap::Parser;
use llm_interface::DigestGenerator;
use mailer::{DigestSink, EmailSender};
use reddit_client::RedditClient;
use std::path::PathBuf;
use subdigest::{Pipeline, StdoutSink, DEFAULT_LOG_FILTER};
use subdigest_core::{AppConfig, ConfigError, CoreError, ErrorReporter};
use tracing_subscriber::EnvFilter;

/// Daily digest of a subreddit's top discussions, written by an LLM and sent by e-mail.
#[derive(Parser, Debug)]
#[command(name = "subdigest", version, about)]
struct Cli {
    /// TOML file with collection, generation and output tuning
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the digest to stdout instead of sending it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CoreError> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(dry_run = cli.dry_run, "Starting subdigest");

    let reporter = ErrorReporter::new();
    run(cli).await.map_err(|e| {
        reporter.report_error(&e);
        e
    })
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = AppConfig::load(cli.config.as_deref(), !cli.dry_run)?;
    tracing::info!(
        community = %config.community,
        post_limit = config.collection.post_limit,
        comments_per_post = config.collection.comments_per_post,
        has_backup = config.backup.is_some(),
        "Configuration loaded"
    );

    let source = RedditClient::new(&config.collection)?;
    let generator = DigestGenerator::from_config(&config)?;

    if cli.dry_run {
        execute(&config, source, generator, StdoutSink).await
    } else {
        let smtp = config
            .smtp
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: "SMTP_SERVER".to_string(),
            })?;
        execute(&config, source, generator, EmailSender::new(smtp)?).await
    }
}

async fn execute<D: DigestSink>(
    config: &AppConfig,
    source: RedditClient,
    generator: DigestGenerator,
    sink: D,
) -> Result<(), CoreError> {
    let report = Pipeline::new(config, source, generator, sink).run().await?;
    tracing::info!(
        run_id = %report.run_id,
        discussions = report.discussions,
        snapshot = ?report.snapshot,
        "Digest pipeline finished"
    );
    Ok(())
}
