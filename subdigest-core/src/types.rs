use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A top-level comment, owned by its discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
}

/// A top-level post with its retained comments and the links mentioned in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub permalink: String,
    /// Link target of a link post, when it points outside the forum.
    pub external_url: Option<String>,
    pub body: String,
    pub created_utc: DateTime<Utc>,
    pub num_comments: u64,
    pub comments: Vec<Comment>,
    pub links: BTreeSet<String>,
}

/// Everything one run collected; the only value passed from the fetcher to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub run_id: Uuid,
    pub community: String,
    pub collected_at: DateTime<Utc>,
    pub post_limit: usize,
    pub comments_per_post: usize,
    pub discussions: Vec<Discussion>,
}

impl CollectionResult {
    pub fn new(community: impl Into<String>, post_limit: usize, comments_per_post: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            community: community.into(),
            collected_at: Utc::now(),
            post_limit,
            comments_per_post,
            discussions: Vec::new(),
        }
    }

    /// Day the content was collected, formatted `YYYY-MM-DD`.
    pub fn collection_date(&self) -> String {
        self.collected_at.format("%Y-%m-%d").to_string()
    }

    pub fn comment_count(&self) -> usize {
        self.discussions.iter().map(|d| d.comments.len()).sum()
    }
}

/// Generated newsletter body in Markdown. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(String);

impl Digest {
    /// Wraps provider output, rejecting text that is empty or whitespace only.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Primary,
    Backup,
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderRole::Primary => f.write_str("primary"),
            ProviderRole::Backup => f.write_str("backup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_rejects_blank_text() {
        assert!(Digest::new("").is_none());
        assert!(Digest::new("  \n\t").is_none());
    }

    #[test]
    fn test_digest_keeps_text_verbatim() {
        let digest = Digest::new("  # Title\n").unwrap();
        assert_eq!(digest.as_str(), "  # Title\n");
    }

    #[test]
    fn test_collection_date_format() {
        let mut result = CollectionResult::new("rust", 20, 5);
        result.collected_at = "2024-03-09T18:30:00Z".parse().unwrap();
        assert_eq!(result.collection_date(), "2024-03-09");
        assert_eq!(result.comment_count(), 0);
    }
}
