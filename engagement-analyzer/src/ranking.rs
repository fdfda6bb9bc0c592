use instasense_core::{AnnotatedComment, EngagementField};
use std::cmp::Ordering;

pub const DEFAULT_TOP_K: usize = 5;

/// The `k` comments with the highest value in `field`. Ties keep input
/// order and rows with an unreadable value rank below every valued row.
pub fn top_k_by_field(
    annotated: &[AnnotatedComment],
    field: EngagementField,
    k: usize,
) -> Vec<AnnotatedComment> {
    let mut ranked: Vec<&AnnotatedComment> = annotated.iter().collect();
    ranked.sort_by(|a, b| {
        match (field.value_of(&a.comment), field.value_of(&b.comment)) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    ranked.into_iter().take(k).cloned().collect()
}
