use std::cmp::Ordering;

use crate::types::ScoreEntry;

/// Score descending, display name descending, then player id ascending so
/// the order is total even for identical names.
pub(super) fn compare_rank(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.name.cmp(&a.name))
        .then_with(|| a.player_id.cmp(&b.player_id))
}
