use std::cmp::Reverse;

use crate::classifier::BucketTable;
use crate::models::ScoredItem;

/// Build the shortlist from the scored pool.
///
/// The pool is sorted once by score then recency (both descending; the sort is
/// stable so remaining ties keep fetch order). Each bucket, in declaration
/// order, then takes its first `quota` items from that order. A bucket that
/// runs short is not topped up from the others, so the result can be smaller
/// than `total`.
pub fn select(
    mut pool: Vec<ScoredItem>,
    table: &BucketTable,
    quotas: &[usize],
    total: usize,
) -> Vec<ScoredItem> {
    pool.sort_by_key(|s| (Reverse(s.score), Reverse(s.item.published)));

    let mut picks = Vec::with_capacity(total);
    for (name, &quota) in table.names().zip(quotas) {
        picks.extend(
            pool.iter()
                .filter(|s| s.bucket == name)
                .take(quota)
                .cloned(),
        );
    }

    picks.truncate(total);
    picks
}
