use crate::averages::mean;
use instasense_core::{AnnotatedComment, EngagementField, Sentiment};
use serde::{Deserialize, Serialize};

/// Engagement aggregated over all comments sharing a sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentGroup {
    pub sentiment: Sentiment,
    /// Every comment in the group, including ones with unreadable counters.
    pub count: usize,
    pub sum_likes: u64,
    pub sum_replies: u64,
    pub mean_likes: Option<f64>,
    pub mean_replies: Option<f64>,
}

/// Groups comments by sentiment in first-seen order. `Error` rows form a
/// group of their own.
pub fn group_by_sentiment(annotated: &[AnnotatedComment]) -> Vec<SentimentGroup> {
    first_seen_sentiments(annotated)
        .into_iter()
        .map(|sentiment| {
            let rows: Vec<&AnnotatedComment> = annotated
                .iter()
                .filter(|row| row.sentiment == sentiment)
                .collect();
            let values = |field: EngagementField| {
                rows.iter()
                    .filter_map(move |row| field.value_of(&row.comment))
            };

            SentimentGroup {
                sentiment,
                count: rows.len(),
                sum_likes: saturating_sum(values(EngagementField::Likes)),
                sum_replies: saturating_sum(values(EngagementField::Replies)),
                mean_likes: mean(values(EngagementField::Likes)),
                mean_replies: mean(values(EngagementField::Replies)),
            }
        })
        .collect()
}

/// Sums clamp at `u64::MAX` instead of wrapping.
fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

pub(crate) fn first_seen_sentiments(annotated: &[AnnotatedComment]) -> Vec<Sentiment> {
    let mut order: Vec<Sentiment> = Vec::new();
    for row in annotated {
        if !order.contains(&row.sentiment) {
            order.push(row.sentiment);
        }
    }
    order
}

/// Comments per sentiment, most frequent first; ties keep first-seen order.
pub fn sentiment_distribution(annotated: &[AnnotatedComment]) -> Vec<(Sentiment, usize)> {
    let mut counts: Vec<(Sentiment, usize)> = group_by_sentiment(annotated)
        .into_iter()
        .map(|group| (group.sentiment, group.count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use instasense_core::{Comment, SentimentLabel, SentimentResult};

    fn row(label: Option<SentimentLabel>, likes: u64, replies: u64) -> AnnotatedComment {
        let comment = Comment::new("https://www.instagram.com/p/1/", "text", likes, replies);
        match label {
            Some(label) => AnnotatedComment::classified(comment, SentimentResult::new(label, 0.9)),
            None => AnnotatedComment::failed(comment),
        }
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let rows = vec![
            row(Some(SentimentLabel::Neutral), 1, 0),
            row(None, 4, 1),
            row(Some(SentimentLabel::Positive), 10, 2),
            row(Some(SentimentLabel::Neutral), 3, 0),
        ];
        let groups = group_by_sentiment(&rows);

        let order: Vec<Sentiment> = groups.iter().map(|g| g.sentiment).collect();
        assert_eq!(
            order,
            vec![Sentiment::Neutral, Sentiment::Error, Sentiment::Positive]
        );
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].sum_likes, 4);
        assert_eq!(groups[0].mean_likes, Some(2.0));
        assert_eq!(groups[0].mean_replies, Some(0.0));
        assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), rows.len());
    }

    #[test]
    fn test_unreadable_counters_excluded_from_means() {
        let mut broken = row(Some(SentimentLabel::Positive), 0, 0);
        broken.comment.likes_count = None;
        let rows = vec![broken, row(Some(SentimentLabel::Positive), 8, 1)];

        let groups = group_by_sentiment(&rows);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].sum_likes, 8);
        assert_eq!(groups[0].mean_likes, Some(8.0));
        assert_eq!(groups[0].mean_replies, Some(0.5));
    }

    #[test]
    fn test_group_without_values_has_no_mean() {
        let mut broken = row(None, 0, 0);
        broken.comment.replies_count = None;
        let groups = group_by_sentiment(&[broken]);
        assert_eq!(groups[0].mean_replies, None);
        assert_eq!(groups[0].sum_replies, 0);
    }

    #[test]
    fn test_huge_counters_saturate() {
        let big = u64::MAX / 2 + 1;
        let rows = vec![
            row(Some(SentimentLabel::Positive), big, big),
            row(Some(SentimentLabel::Positive), big, 1),
        ];
        let groups = group_by_sentiment(&rows);
        assert_eq!(groups[0].sum_likes, u64::MAX);
        assert_eq!(groups[0].sum_replies, big + 1);
        assert_eq!(groups[0].mean_likes, Some(big as f64));
    }

    #[test]
    fn test_distribution_sorted_by_count() {
        let rows = vec![
            row(Some(SentimentLabel::Negative), 0, 0),
            row(Some(SentimentLabel::Positive), 0, 0),
            row(Some(SentimentLabel::Positive), 0, 0),
            row(None, 0, 0),
        ];
        assert_eq!(
            sentiment_distribution(&rows),
            vec![
                (Sentiment::Positive, 2),
                (Sentiment::Negative, 1),
                (Sentiment::Error, 1)
            ]
        );
        assert!(sentiment_distribution(&[]).is_empty());
    }
}
