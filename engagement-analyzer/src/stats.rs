//! Descriptive statistics behind the engagement charts: overall means,
//! equal-width histograms and per-sentiment box-plot summaries.

use crate::averages::mean;
use crate::grouping::first_seen_sentiments;
use instasense_core::{AnnotatedComment, EngagementField, Sentiment};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementOverview {
    pub mean_likes: Option<f64>,
    pub mean_replies: Option<f64>,
}

pub fn engagement_overview(annotated: &[AnnotatedComment]) -> EngagementOverview {
    let values = |field: EngagementField| {
        annotated
            .iter()
            .filter_map(move |row| field.value_of(&row.comment))
    };
    EngagementOverview {
        mean_likes: mean(values(EngagementField::Likes)),
        mean_replies: mean(values(EngagementField::Replies)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub field: EngagementField,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Equal-width histogram over the valued rows of `field`. The last bin
/// includes its upper edge. A single distinct value gives one bin.
pub fn histogram(annotated: &[AnnotatedComment], field: EngagementField, bins: usize) -> Histogram {
    let values: Vec<f64> = annotated
        .iter()
        .filter_map(|row| field.value_of(&row.comment))
        .map(|v| v as f64)
        .collect();

    let empty = Histogram {
        field,
        bins: Vec::new(),
    };
    if bins == 0 {
        return empty;
    }
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return empty;
    };

    if min == max {
        return Histogram {
            field,
            bins: vec![HistogramBin {
                lower: min,
                upper: max,
                count: values.len(),
            }],
        };
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let index = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[index] += 1;
    }

    Histogram {
        field,
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: min + width * i as f64,
                upper: if i + 1 == bins {
                    max
                } else {
                    min + width * (i + 1) as f64
                },
                count,
            })
            .collect(),
    }
}

/// Five-number summary with linearly interpolated quartiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub count: usize,
}

impl BoxStats {
    pub fn from_values(values: &mut [f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        Some(Self {
            min: values[0],
            q1: quantile(values, 0.25),
            median: quantile(values, 0.5),
            q3: quantile(values, 0.75),
            max: values[values.len() - 1],
            count: values.len(),
        })
    }
}

/// `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBoxStats {
    pub sentiment: Sentiment,
    pub stats: BoxStats,
}

/// Box-plot summary of `field` per sentiment, in first-seen order.
/// Sentiments without any valued row are omitted.
pub fn box_stats_by_sentiment(
    annotated: &[AnnotatedComment],
    field: EngagementField,
) -> Vec<SentimentBoxStats> {
    first_seen_sentiments(annotated)
        .into_iter()
        .filter_map(|sentiment| {
            let mut values: Vec<f64> = annotated
                .iter()
                .filter(|row| row.sentiment == sentiment)
                .filter_map(|row| field.value_of(&row.comment))
                .map(|v| v as f64)
                .collect();
            BoxStats::from_values(&mut values).map(|stats| SentimentBoxStats { sentiment, stats })
        })
        .collect()
}
