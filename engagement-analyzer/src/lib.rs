pub mod annotate;
pub mod averages;
pub mod grouping;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod stats;
pub mod timeline;

pub use annotate::{annotate_sentiment, AnnotationOptions, AnnotationSummary};
pub use averages::{compute_averages, PostAverages};
pub use grouping::{group_by_sentiment, sentiment_distribution, SentimentGroup};
pub use pipeline::{AnalysisOptions, AnalysisPipeline};
pub use ranking::{top_k_by_field, DEFAULT_TOP_K};
pub use report::{EngagementReport, SkippedPost};
pub use stats::{
    box_stats_by_sentiment, engagement_overview, histogram, BoxStats, EngagementOverview,
    Histogram, HistogramBin, SentimentBoxStats, DEFAULT_HISTOGRAM_BINS,
};
pub use timeline::{
    bucket_by_time, SentimentCount, SentimentTimeline, TimeBucket, MAX_TIMELINE_BUCKETS,
};
