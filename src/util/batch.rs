//! Helpers for the catalog's `?ids=` endpoints.

use std::collections::BTreeSet;

/// Upstream limit on IDs per request.
pub const MAX_IDS_PER_REQUEST: usize = 200;

/// Deduplicate and split IDs into request-sized batches, preserving first-seen order.
pub fn batches(ids: &[u32], size: usize) -> Vec<Vec<u32>> {
    let size = size.clamp(1, MAX_IDS_PER_REQUEST);
    let mut seen = BTreeSet::new();
    let unique: Vec<u32> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    unique.chunks(size).map(<[u32]>::to_vec).collect()
}

/// Render a batch as the comma-separated `ids` query value.
pub fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_the_request_limit() {
        let ids: Vec<u32> = (1..=450).collect();
        let chunks = batches(&ids, 1000);
        assert_eq!(
            chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![200, 200, 50]
        );
    }

    #[test]
    fn drops_duplicates() {
        assert_eq!(batches(&[4, 2, 4, 9, 2], 2), vec![vec![4, 2], vec![9]]);
        assert!(batches(&[], 200).is_empty());
    }

    #[test]
    fn joins_with_commas() {
        assert_eq!(join_ids(&[1, 22, 333]), "1,22,333");
    }
}
