// ============================================================
// MERGE ENGINE
// ============================================================
// Combine an uploaded result set with the currently held one. The
// merge is a shallow key union; the strategy only decides collision
// winners, individual result fields are never deep-merged.

use std::collections::BTreeMap;

use crate::domain::result::{ExportableResult, MergeStats};

pub type ResultMap = BTreeMap<String, ExportableResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Uploaded records win on key collision.
    Replace,
    /// Existing records win on key collision.
    Keep,
}

pub fn merge(existing: &ResultMap, uploaded: &ResultMap, strategy: MergeStrategy) -> ResultMap {
    let mut merged = existing.clone();
    match strategy {
        MergeStrategy::Replace => {
            for (key, result) in uploaded {
                merged.insert(key.clone(), result.clone());
            }
        }
        MergeStrategy::Keep => {
            for (key, result) in uploaded {
                merged.entry(key.clone()).or_insert_with(|| result.clone());
            }
        }
    }
    merged
}

/// Conflict accounting for a prospective merge. Always agrees with
/// `merge`: applying it and counting keys equals `total_after_merge`.
pub fn compute_stats(existing: &ResultMap, uploaded: &ResultMap) -> MergeStats {
    let conflict_count = uploaded
        .keys()
        .filter(|key| existing.contains_key(*key))
        .count();
    MergeStats {
        existing_count: existing.len(),
        uploaded_count: uploaded.len(),
        conflict_count,
        total_after_merge: existing.len() + uploaded.len() - conflict_count,
    }
}
