use std::collections::HashSet;

/// Picks the ids that make it into the feed.
///
/// The upstream list is already ranked, so selection is plain truncation:
/// the first `limit` distinct ids in source order, or all of them when fewer
/// exist. A repeated id keeps its first position and does not use up a slot.
/// A `limit` of 0 yields an empty selection, which renders as a valid feed
/// with no entries.
pub fn select(candidate_ids: &[u64], limit: usize) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(limit.min(candidate_ids.len()));
    candidate_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}
