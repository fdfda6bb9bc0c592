use crate::annotate::AnnotationSummary;
use crate::averages::{compute_averages, PostAverages};
use crate::grouping::{group_by_sentiment, sentiment_distribution, SentimentGroup};
use crate::pipeline::AnalysisOptions;
use crate::ranking::top_k_by_field;
use crate::stats::{
    box_stats_by_sentiment, engagement_overview, histogram, EngagementOverview, Histogram,
    SentimentBoxStats,
};
use crate::timeline::{bucket_by_time, SentimentTimeline};
use chrono::{DateTime, Utc};
use instasense_core::{AnnotatedComment, CoreError, EngagementField, Post, Sentiment};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const TEXT_PREVIEW_CHARS: usize = 60;

/// A post whose comments could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPost {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementReport {
    pub run_id: Uuid,
    pub account: String,
    pub generated_at: DateTime<Utc>,
    pub post_count: usize,
    pub comment_count: usize,
    pub averages: PostAverages,
    pub annotation: AnnotationSummary,
    pub sentiment_groups: Vec<SentimentGroup>,
    pub sentiment_distribution: Vec<(Sentiment, usize)>,
    pub overview: EngagementOverview,
    pub top_liked: Vec<AnnotatedComment>,
    pub top_replied: Vec<AnnotatedComment>,
    pub timeline: Option<SentimentTimeline>,
    pub likes_histogram: Histogram,
    pub replies_histogram: Histogram,
    pub likes_by_sentiment: Vec<SentimentBoxStats>,
    pub replies_by_sentiment: Vec<SentimentBoxStats>,
    pub skipped_posts: Vec<SkippedPost>,
}

impl EngagementReport {
    /// Runs every aggregation over already-annotated comments.
    pub fn build(
        account: &str,
        posts: &[Post],
        annotated: &[AnnotatedComment],
        annotation: AnnotationSummary,
        skipped_posts: Vec<SkippedPost>,
        options: &AnalysisOptions,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            account: account.to_string(),
            generated_at: Utc::now(),
            post_count: posts.len(),
            comment_count: annotated.len(),
            averages: compute_averages(posts),
            annotation,
            sentiment_groups: group_by_sentiment(annotated),
            sentiment_distribution: sentiment_distribution(annotated),
            overview: engagement_overview(annotated),
            top_liked: top_k_by_field(annotated, EngagementField::Likes, options.top_k),
            top_replied: top_k_by_field(annotated, EngagementField::Replies, options.top_k),
            timeline: bucket_by_time(annotated, options.bucket),
            likes_histogram: histogram(annotated, EngagementField::Likes, options.histogram_bins),
            replies_histogram: histogram(
                annotated,
                EngagementField::Replies,
                options.histogram_bins,
            ),
            likes_by_sentiment: box_stats_by_sentiment(annotated, EngagementField::Likes),
            replies_by_sentiment: box_stats_by_sentiment(annotated, EngagementField::Replies),
            skipped_posts,
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(CoreError::Serialization)
    }
}

impl fmt::Display for EngagementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engagement report for @{}", self.account)?;
        writeln!(
            f,
            "Run {} at {}",
            self.run_id,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        writeln!(f)?;
        writeln!(f, "Posts analysed: {}", self.post_count)?;
        writeln!(f, "  Average likes:    {:.2}", self.averages.avg_likes)?;
        writeln!(f, "  Average comments: {:.2}", self.averages.avg_comments)?;

        writeln!(f)?;
        writeln!(
            f,
            "Comments: {} ({} classified, {} failed, {} timed out)",
            self.comment_count,
            self.annotation.classified,
            self.annotation.failed,
            self.annotation.timed_out
        )?;
        writeln!(f, "  Mean likes:   {}", fmt_mean(self.overview.mean_likes))?;
        writeln!(f, "  Mean replies: {}", fmt_mean(self.overview.mean_replies))?;

        if !self.sentiment_distribution.is_empty() {
            writeln!(f)?;
            writeln!(f, "Sentiment distribution")?;
            for (sentiment, count) in &self.sentiment_distribution {
                writeln!(f, "  {:<9} {:>5}", sentiment.as_str(), count)?;
            }
        }

        if !self.sentiment_groups.is_empty() {
            writeln!(f)?;
            writeln!(f, "Engagement by sentiment")?;
            writeln!(
                f,
                "  {:<9} {:>5} {:>10} {:>10} {:>12} {:>12}",
                "Sentiment", "Count", "Likes", "Replies", "Mean likes", "Mean replies"
            )?;
            for group in &self.sentiment_groups {
                writeln!(
                    f,
                    "  {:<9} {:>5} {:>10} {:>10} {:>12} {:>12}",
                    group.sentiment.as_str(),
                    group.count,
                    group.sum_likes,
                    group.sum_replies,
                    fmt_mean(group.mean_likes),
                    fmt_mean(group.mean_replies)
                )?;
            }
        }

        write_box_stats(f, "Likes by sentiment", &self.likes_by_sentiment)?;
        write_box_stats(f, "Replies by sentiment", &self.replies_by_sentiment)?;

        write_top(f, "Top comments by likes", &self.top_liked)?;
        write_top(f, "Top comments by replies", &self.top_replied)?;

        writeln!(f)?;
        match &self.timeline {
            Some(timeline) => {
                writeln!(f, "Sentiment trend ({})", timeline.width)?;
                for bucket in &timeline.buckets {
                    write!(f, "  {}", bucket.start.format("%Y-%m-%d %H:%M"))?;
                    for count in &bucket.counts {
                        write!(f, "  {} {}", count.sentiment.as_str(), count.count)?;
                    }
                    writeln!(f)?;
                }
            }
            None => writeln!(f, "Sentiment trend unavailable: no comment timestamps")?,
        }

        if !self.skipped_posts.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped posts ({})", self.skipped_posts.len())?;
            for skipped in &self.skipped_posts {
                writeln!(f, "  {}: {}", skipped.url, skipped.reason)?;
            }
        }

        Ok(())
    }
}

fn fmt_mean(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

fn write_box_stats(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    stats: &[SentimentBoxStats],
) -> fmt::Result {
    if stats.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f, "{title} (min / q1 / median / q3 / max)")?;
    for entry in stats {
        let s = &entry.stats;
        writeln!(
            f,
            "  {:<9} {:.0} / {:.1} / {:.1} / {:.1} / {:.0}",
            entry.sentiment.as_str(),
            s.min,
            s.q1,
            s.median,
            s.q3,
            s.max
        )?;
    }
    Ok(())
}

fn write_top(f: &mut fmt::Formatter<'_>, title: &str, rows: &[AnnotatedComment]) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f, "{title}")?;
    for (rank, row) in rows.iter().enumerate() {
        writeln!(
            f,
            "  {}. [{}] {} likes, {} replies: \"{}\"",
            rank + 1,
            row.sentiment_display(),
            fmt_count(row.comment.likes_count),
            fmt_count(row.comment.replies_count),
            preview(&row.comment.comment_text)
        )?;
    }
    Ok(())
}

fn fmt_count(value: Option<u64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn preview(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= TEXT_PREVIEW_CHARS {
        return single_line;
    }
    let mut truncated: String = single_line.chars().take(TEXT_PREVIEW_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}
