pub mod pipeline;

pub use pipeline::{Pipeline, RunReport, StdoutSink};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "subdigest=info,reddit_client=info,llm_interface=info,snapshot=info,mailer=info";
