pub mod api;
pub mod links;
pub mod retry;


pub use api::RedditApiClient;
pub use retry::{RetryConfig, RetryExecutor};

use std::time::Duration;
use subdigest_core::{
    CollectionResult, CollectionSettings, Comment, Discussion, ErrorExt, FetchError,
};
use tracing::{debug, info, info_span, warn, Instrument};

/// Anything that can produce the day's ranked discussions for a community.
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    async fn collect_daily_content(
        &self,
        community: &str,
        post_limit: usize,
        comments_per_post: usize,
    ) -> Result<CollectionResult, FetchError>;
}

/// Anonymous client for the public JSON listing endpoints.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    retry: RetryExecutor,
    request_delay: Duration,
}

impl RedditClient {
    pub fn new(settings: &CollectionSettings) -> Result<Self, FetchError> {
        let api = RedditApiClient::new(
            settings.base_url.clone(),
            settings.user_agent.clone(),
            settings.timeout,
        )?;

        Ok(Self {
            api,
            retry: RetryExecutor::new(RetryConfig::reddit(settings.retry_attempts)),
            request_delay: settings.request_delay,
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    async fn fetch_discussions(
        &self,
        community: &str,
        post_limit: usize,
    ) -> Result<Vec<Discussion>, FetchError> {
        let operation_name = format!("top posts of r/{}", community);
        let posts = self
            .retry
            .execute(&operation_name, || {
                self.api.get_top_daily_posts(community, post_limit)
            })
            .await?;

        Ok(posts.into_iter().map(Discussion::from).collect())
    }

    /// Attaches comments and their links; a failure leaves the discussion without comments.
    async fn attach_comments(
        &self,
        community: &str,
        discussion: &mut Discussion,
        comments_per_post: usize,
    ) {
        if comments_per_post == 0 {
            return;
        }

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        match self
            .api
            .get_post_comments(community, &discussion.id, comments_per_post)
            .await
        {
            Ok(comments) => {
                discussion.comments = comments.into_iter().map(Comment::from).collect();
                let comment_links =
                    links::collect_links(discussion.comments.iter().map(|c| c.body.as_str()));
                discussion.links.extend(comment_links);
                debug!(
                    post_id = %discussion.id,
                    comments = discussion.comments.len(),
                    links = discussion.links.len(),
                    "Attached comments"
                );
            }
            Err(e) => {
                warn!(
                    post_id = %discussion.id,
                    error_code = %e.error_code(),
                    "Comments unavailable, keeping discussion without them: {}",
                    e
                );
                discussion.comments.clear();
            }
        }
    }
}

impl ContentSource for RedditClient {
    async fn collect_daily_content(
        &self,
        community: &str,
        post_limit: usize,
        comments_per_post: usize,
    ) -> Result<CollectionResult, FetchError> {
        let mut result = CollectionResult::new(community, post_limit, comments_per_post);
        let span = info_span!("collect", run_id = %result.run_id, community);

        async move {
            info!(post_limit, comments_per_post, "Collecting top discussions of the day");

            let mut discussions = self.fetch_discussions(community, post_limit).await?;
            for discussion in discussions.iter_mut() {
                self.attach_comments(community, discussion, comments_per_post)
                    .await;
            }

            result.discussions = discussions;
            info!(
                discussions = result.discussions.len(),
                comments = result.comment_count(),
                "Collection finished"
            );
            Ok::<_, FetchError>(result)
        }
        .instrument(span)
        .await
    }
}
