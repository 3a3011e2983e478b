use crate::links;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use subdigest_core::{Comment, Discussion, FetchError};
use tracing::{debug, error, info, warn};

/// Public host used for permalinks, independent of the API host queried.
pub const PERMALINK_BASE: &str = "https://www.reddit.com";

/// Largest page the listing endpoints will return.
pub const MAX_LISTING_LIMIT: usize = 100;

const UNKNOWN_AUTHOR: &str = "[unknown]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: u64,
    pub stickied: bool,
    pub is_self: bool,
    pub domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditCommentData {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    pub stickied: bool,
}

/// The comments endpoint answers with the post listing followed by the comment listing.
type CommentsResponse = (IgnoredAny, RedditListing<serde_json::Value>);

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: String,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let user_agent = user_agent.into();
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        endpoint: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);

        debug!("Making Reddit request: GET {}", endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for GET {}: {}", endpoint, e);
                transport_error(&url, &e)
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                FetchError::RateLimitExceeded { retry_after }
            }
            StatusCode::FORBIDDEN => FetchError::Forbidden {
                resource: endpoint.to_string(),
            },
            s if s.is_server_error() => FetchError::ServerError {
                status_code: s.as_u16(),
            },
            s => FetchError::UnexpectedStatus {
                status_code: s.as_u16(),
                url,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.make_request(endpoint, query_params).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, &e))?;

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response from {}: {}", endpoint, e);
            FetchError::InvalidResponse {
                details: format!("{} returned unparseable JSON: {}", endpoint, e),
            }
        })
    }

    /// Top posts of the current day, in the source's ranking order.
    pub async fn get_top_daily_posts(
        &self,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<RedditPostData>, FetchError> {
        let endpoint = format!("/r/{}/top.json", subreddit);
        let params = [
            ("t", "day".to_string()),
            ("limit", limit.min(MAX_LISTING_LIMIT).to_string()),
        ];

        let listing: RedditListing<RedditPostData> = self
            .get_json(&endpoint, &params)
            .await
            .map_err(|e| match e {
                FetchError::UnexpectedStatus {
                    status_code: 404, ..
                } => FetchError::CommunityNotFound {
                    community: subreddit.to_string(),
                },
                other => other,
            })?;

        let posts: Vec<RedditPostData> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .take(limit)
            .collect();

        info!("Retrieved {} posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    /// Top-level comments of a post in the source's default order, at most `limit`.
    pub async fn get_post_comments(
        &self,
        subreddit: &str,
        post_id: &str,
        limit: usize,
    ) -> Result<Vec<RedditCommentData>, FetchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let endpoint = format!("/r/{}/comments/{}.json", subreddit, post_id);
        let params = [
            ("limit", limit.to_string()),
            ("depth", "1".to_string()),
        ];

        let (_, listing): CommentsResponse = self.get_json(&endpoint, &params).await?;

        let comments: Vec<RedditCommentData> = listing
            .data
            .children
            .into_iter()
            .filter(|child| child.kind == "t1")
            .filter_map(|child| match serde_json::from_value(child.data) {
                Ok(comment) => Some(comment),
                Err(e) => {
                    warn!(post_id, "Skipping undecodable comment: {}", e);
                    None
                }
            })
            .take(limit)
            .collect();

        debug!("Retrieved {} comments for post {}", comments.len(), post_id);
        Ok(comments)
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::RequestTimeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Unreachable {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

fn timestamp(seconds: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds as i64, 0).unwrap_or_default()
}

fn author_or_unknown(author: String) -> String {
    if author.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        author
    }
}

impl From<RedditPostData> for Discussion {
    fn from(post_data: RedditPostData) -> Self {
        let external_url = if !post_data.is_self && links::is_external(&post_data.url) {
            Some(post_data.url.clone())
        } else {
            None
        };

        let mut post_links: BTreeSet<String> = links::collect_links([post_data.selftext.as_str()]);
        if let Some(url) = &external_url {
            post_links.extend(links::extract_urls(url));
        }

        Self {
            id: post_data.id,
            title: post_data.title,
            author: author_or_unknown(post_data.author),
            score: post_data.score,
            permalink: format!("{}{}", PERMALINK_BASE, post_data.permalink),
            external_url,
            body: post_data.selftext,
            created_utc: timestamp(post_data.created_utc),
            num_comments: post_data.num_comments,
            comments: Vec::new(),
            links: post_links,
        }
    }
}

impl From<RedditCommentData> for Comment {
    fn from(comment_data: RedditCommentData) -> Self {
        Self {
            author: author_or_unknown(comment_data.author),
            body: comment_data.body,
            score: comment_data.score,
            created_utc: timestamp(comment_data.created_utc),
        }
    }
}
