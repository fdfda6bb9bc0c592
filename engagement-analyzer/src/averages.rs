use instasense_core::Post;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAverages {
    pub avg_likes: f64,
    pub avg_comments: f64,
    /// Number of posts the averages were taken over.
    pub sample_size: usize,
}

/// Mean likes and comments per post. Posts with an unreadable counter are
/// left out of that counter's mean; an empty list averages to zero.
pub fn compute_averages(posts: &[Post]) -> PostAverages {
    PostAverages {
        avg_likes: mean_or_zero(posts.iter().filter_map(|p| p.likes_count)),
        avg_comments: mean_or_zero(posts.iter().filter_map(|p| p.comments_count)),
        sample_size: posts.len(),
    }
}

pub(crate) fn mean(values: impl Iterator<Item = u64>) -> Option<f64> {
    let (sum, count) = values.fold((0u128, 0usize), |(sum, count), v| {
        (sum + u128::from(v), count + 1)
    });
    (count > 0).then(|| sum as f64 / count as f64)
}

fn mean_or_zero(values: impl Iterator<Item = u64>) -> f64 {
    mean(values).unwrap_or(0.0)
}
