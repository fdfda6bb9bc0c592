use chrono::{DateTime, TimeZone, Utc};
use instasense_core::{Comment, Post};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Actor ID for apify/instagram-post-scraper.
pub const INSTAGRAM_POST_SCRAPER: &str = "nH2AHrwxeTRJoN5hX";

/// Actor ID for apify/instagram-comment-scraper.
pub const INSTAGRAM_COMMENT_SCRAPER: &str = "SbK00X0JYCPblD2wp";

/// Input for the apify/instagram-post-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramPostScraperInput {
    pub username: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// Input for the apify/instagram-comment-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramCommentScraperInput {
    #[serde(rename = "directUrls")]
    pub direct_urls: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl RunData {
    pub fn run_status(&self) -> RunStatus {
        match self.status.as_str() {
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" | "ABORTED" | "TIMED-OUT" | "TIMED_OUT" => RunStatus::Failed,
            _ => RunStatus::InProgress,
        }
    }
}

/// A post item from the instagram-post-scraper dataset. Only the fields
/// the analysis reads are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct InstagramPostItem {
    pub url: Option<String>,
    #[serde(
        rename = "likesCount",
        default = "missing_count",
        deserialize_with = "lenient_count"
    )]
    pub likes_count: Option<u64>,
    #[serde(
        rename = "commentsCount",
        default = "missing_count",
        deserialize_with = "lenient_count"
    )]
    pub comments_count: Option<u64>,
}

impl InstagramPostItem {
    /// Items without a URL cannot be joined to comments and are dropped.
    pub fn into_post(self) -> Option<Post> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(Post {
            url,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
        })
    }
}

/// A comment item from the instagram-comment-scraper dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct InstagramCommentItem {
    pub text: Option<String>,
    #[serde(
        rename = "likesCount",
        default = "missing_count",
        deserialize_with = "lenient_count"
    )]
    pub likes_count: Option<u64>,
    #[serde(
        rename = "repliesCount",
        default = "missing_count",
        deserialize_with = "lenient_count"
    )]
    pub replies_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InstagramCommentItem {
    /// Items without a `text` field are not comments and are dropped.
    pub fn into_comment(self, post_url: &str) -> Option<Comment> {
        let comment_text = self.text?;
        Some(Comment {
            post_url: post_url.to_string(),
            comment_text,
            likes_count: self.likes_count,
            replies_count: self.replies_count,
            timestamp: self.timestamp,
        })
    }
}

/// A counter absent from the item counts as zero.
fn missing_count() -> Option<u64> {
    Some(0)
}

/// Best-effort numeric coercion: integers, integral floats and numeric
/// strings are accepted; anything else (null, negative, text) is `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

pub(crate) fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_timestamp(&value))
}

/// RFC 3339 strings or unix seconds; unparseable values become `None`.
pub(crate) fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}
