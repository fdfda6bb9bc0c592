use chrono::{DateTime, TimeZone, Utc};
use instasense_core::{AnnotatedComment, BucketWidth, Sentiment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Bucket boundaries are aligned to this instant (Monday 1970-01-05 00:00 UTC)
/// so weekly buckets start on Mondays.
const BUCKET_ANCHOR_SECS: i64 = 4 * 24 * 60 * 60;

/// Upper bound on the number of buckets in one timeline.
pub const MAX_TIMELINE_BUCKETS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentCount {
    pub sentiment: Sentiment,
    pub count: usize,
}

/// Comments per sentiment over `[start, start + width)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub counts: Vec<SentimentCount>,
}

impl TimeBucket {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn count_of(&self, sentiment: Sentiment) -> usize {
        self.counts
            .iter()
            .find(|c| c.sentiment == sentiment)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentTimeline {
    pub width: String,
    pub sentiments: Vec<Sentiment>,
    pub buckets: Vec<TimeBucket>,
}

/// Counts comments per sentiment in consecutive buckets of `width`.
///
/// Comments without a timestamp are ignored. Returns `None` when no
/// comment carries a timestamp, or when the span would need more than
/// [`MAX_TIMELINE_BUCKETS`] buckets. Buckets run contiguously from the first
/// to the last populated one; every bucket lists every sentiment that
/// occurs in the timeline, with zero where it is absent.
pub fn bucket_by_time(
    annotated: &[AnnotatedComment],
    width: BucketWidth,
) -> Option<SentimentTimeline> {
    let width_secs = width.duration().num_seconds().max(1);

    let stamped: Vec<(i64, Sentiment)> = annotated
        .iter()
        .filter_map(|row| {
            row.comment
                .timestamp
                .map(|ts| (bucket_start(ts.timestamp(), width_secs), row.sentiment))
        })
        .collect();

    let first = stamped.iter().map(|(start, _)| *start).min()?;
    let last = stamped.iter().map(|(start, _)| *start).max()?;

    let sentiments: Vec<Sentiment> = stamped
        .iter()
        .map(|(_, sentiment)| *sentiment)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let bucket_count = usize::try_from((last - first) / width_secs).ok()? + 1;
    if bucket_count > MAX_TIMELINE_BUCKETS {
        warn!(
            "Timeline of {} buckets of {} exceeds the limit of {}, skipping it",
            bucket_count, width, MAX_TIMELINE_BUCKETS
        );
        return None;
    }
    let mut counts = vec![vec![0usize; sentiments.len()]; bucket_count];
    for (start, sentiment) in &stamped {
        let bucket = ((start - first) / width_secs) as usize;
        if let Some(column) = sentiments.iter().position(|s| s == sentiment) {
            counts[bucket][column] += 1;
        }
    }

    let buckets = counts
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let start = first + i as i64 * width_secs;
            let start = Utc.timestamp_opt(start, 0).single()?;
            Some(TimeBucket {
                start,
                counts: sentiments
                    .iter()
                    .zip(row)
                    .map(|(sentiment, count)| SentimentCount {
                        sentiment: *sentiment,
                        count,
                    })
                    .collect(),
            })
        })
        .collect();

    Some(SentimentTimeline {
        width: width.to_string(),
        sentiments,
        buckets,
    })
}

fn bucket_start(ts: i64, width_secs: i64) -> i64 {
    BUCKET_ANCHOR_SECS + (ts - BUCKET_ANCHOR_SECS).div_euclid(width_secs) * width_secs
}
