use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single Instagram publication with its aggregate engagement counters.
///
/// Counters are `None` when the upstream value could not be read as a
/// non-negative integer; such rows are left out of numeric aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub url: String,
    pub likes_count: Option<u64>,
    pub comments_count: Option<u64>,
}

impl Post {
    pub fn new(url: impl Into<String>, likes_count: u64, comments_count: u64) -> Self {
        Self {
            url: url.into(),
            likes_count: Some(likes_count),
            comments_count: Some(comments_count),
        }
    }
}

/// A reply on a [`Post`], joined to it through `post_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub post_url: String,
    pub comment_text: String,
    pub likes_count: Option<u64>,
    pub replies_count: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(
        post_url: impl Into<String>,
        comment_text: impl Into<String>,
        likes_count: u64,
        replies_count: u64,
    ) -> Self {
        Self {
            post_url: post_url.into(),
            comment_text: comment_text.into(),
            likes_count: Some(likes_count),
            replies_count: Some(replies_count),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Label produced by a successful classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Positive => "Positive",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment attached to a comment after annotation. `Error` marks a
/// comment whose classification failed and keeps it visible in aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
    Error,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::Positive => "Positive",
            Sentiment::Error => "Error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Sentiment::Error)
    }
}

impl From<SentimentLabel> for Sentiment {
    fn from(label: SentimentLabel) -> Self {
        match label {
            SentimentLabel::Negative => Sentiment::Negative,
            SentimentLabel::Neutral => Sentiment::Neutral,
            SentimentLabel::Positive => Sentiment::Positive,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    /// Model confidence in `[0, 1]`.
    pub score: f32,
}

impl SentimentResult {
    pub fn new(label: SentimentLabel, score: f32) -> Self {
        Self { label, score }
    }
}

/// A comment together with its derived sentiment fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub sentiment: Sentiment,
    /// `None` exactly when `sentiment` is [`Sentiment::Error`].
    pub sentiment_confidence: Option<f32>,
}

impl AnnotatedComment {
    pub fn classified(comment: Comment, result: SentimentResult) -> Self {
        Self {
            comment,
            sentiment: result.label.into(),
            sentiment_confidence: Some(result.score),
        }
    }

    pub fn failed(comment: Comment) -> Self {
        Self {
            comment,
            sentiment: Sentiment::Error,
            sentiment_confidence: None,
        }
    }

    /// Combined form used in tables, e.g. `Positive (0.93)` or `Error`.
    pub fn sentiment_display(&self) -> String {
        match self.sentiment_confidence {
            Some(score) if !self.sentiment.is_error() => {
                format!("{} ({:.2})", self.sentiment, score)
            }
            _ => Sentiment::Error.to_string(),
        }
    }
}

/// Which engagement counter of a comment to rank or summarise by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngagementField {
    Likes,
    Replies,
}

impl EngagementField {
    pub fn value_of(&self, comment: &Comment) -> Option<u64> {
        match self {
            EngagementField::Likes => comment.likes_count,
            EngagementField::Replies => comment.replies_count,
        }
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            EngagementField::Likes => "likesCount",
            EngagementField::Replies => "repliesCount",
        }
    }
}

impl fmt::Display for EngagementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Width of the fixed intervals used for sentiment trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketWidth {
    Daily,
    #[default]
    Weekly,
    Hours(u32),
}

impl BucketWidth {
    pub fn duration(&self) -> Duration {
        match self {
            BucketWidth::Daily => Duration::days(1),
            BucketWidth::Weekly => Duration::weeks(1),
            BucketWidth::Hours(hours) => Duration::hours(i64::from(*hours)),
        }
    }
}

impl FromStr for BucketWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "daily" | "day" | "d" => Ok(BucketWidth::Daily),
            "weekly" | "week" | "w" => Ok(BucketWidth::Weekly),
            other => {
                let hours = other
                    .strip_suffix('h')
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("unsupported bucket width '{}'", s))?;
                Ok(BucketWidth::Hours(hours))
            }
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketWidth::Daily => f.write_str("daily"),
            BucketWidth::Weekly => f.write_str("weekly"),
            BucketWidth::Hours(hours) => write!(f, "{}h", hours),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_display_includes_score() {
        let comment = Comment::new("p1", "great!", 3, 0);
        let annotated = AnnotatedComment::classified(
            comment.clone(),
            SentimentResult::new(SentimentLabel::Positive, 0.934),
        );
        assert_eq!(annotated.sentiment_display(), "Positive (0.93)");

        let failed = AnnotatedComment::failed(comment);
        assert_eq!(failed.sentiment_display(), "Error");
        assert_eq!(failed.sentiment_confidence, None);
    }

    #[test]
    fn test_bucket_width_parsing() {
        assert_eq!("weekly".parse::<BucketWidth>(), Ok(BucketWidth::Weekly));
        assert_eq!(" Daily ".parse::<BucketWidth>(), Ok(BucketWidth::Daily));
        assert_eq!("6h".parse::<BucketWidth>(), Ok(BucketWidth::Hours(6)));
        assert!("0h".parse::<BucketWidth>().is_err());
        assert!("monthly".parse::<BucketWidth>().is_err());
        assert_eq!(BucketWidth::Hours(6).duration(), Duration::hours(6));
    }

    #[test]
    fn test_annotated_comment_serializes_flat() {
        let annotated = AnnotatedComment::classified(
            Comment::new("p1", "bad", 1, 1),
            SentimentResult::new(SentimentLabel::Negative, 0.5),
        );
        let json = serde_json::to_value(&annotated).unwrap();
        assert_eq!(json["postUrl"], "p1");
        assert_eq!(json["commentText"], "bad");
        assert_eq!(json["sentiment"], "Negative");
        assert_eq!(json["repliesCount"], 1);
    }
}
