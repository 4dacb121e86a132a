//! Layer assignment for overlapping clips on one track.
//!
//! A clip gets the lowest layer index not already used by a clip whose time
//! range intersects its own. Existing layers are never compacted: removing a
//! clip frees its slot for future inserts but does not shift anyone else.

use crate::types::{Clip, TimeUs};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Half-open interval intersection of `[a_start, a_end)` and `[b_start, b_end)`.
pub fn ranges_overlap(a_start: TimeUs, a_end: TimeUs, b_start: TimeUs, b_end: TimeUs) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// First-fit layer for a candidate occupying `[start, end)` among `existing`.
///
/// `exclude` skips the candidate's own entry when it is being re-resolved in
/// place (moves, trims).
pub fn resolve_layer(start: TimeUs, end: TimeUs, existing: &[Clip], exclude: Option<Uuid>) -> u32 {
    let used: BTreeSet<u32> = existing
        .iter()
        .filter(|c| Some(c.id) != exclude)
        .filter(|c| ranges_overlap(start, end, c.start_time, c.end_time()))
        .map(|c| c.layer_index)
        .collect();

    let mut layer = 0;
    while used.contains(&layer) {
        layer += 1;
    }
    layer
}

/// Pairs of clip ids on the same track that overlap in time and share a layer.
pub fn find_layer_conflicts(clips: &[Clip]) -> Vec<(Uuid, Uuid)> {
    let mut conflicts = Vec::new();
    for (i, a) in clips.iter().enumerate() {
        for b in &clips[i + 1..] {
            // Sorted by start: nothing further along can overlap `a`.
            if b.start_time >= a.end_time() {
                break;
            }
            if a.layer_index == b.layer_index
                && ranges_overlap(a.start_time, a.end_time(), b.start_time, b.end_time())
            {
                conflicts.push((a.id, b.id));
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_at(start_s: i64, end_s: i64, layer: u32) -> Clip {
        let mut clip = Clip::text(
            "c",
            TimeUs(start_s * 1_000_000),
            TimeUs((end_s - start_s) * 1_000_000),
        );
        clip.layer_index = layer;
        clip
    }

    fn secs(s: i64) -> TimeUs {
        TimeUs(s * 1_000_000)
    }

    #[test]
    fn adjacent_ranges_dont_overlap() {
        assert!(!ranges_overlap(secs(0), secs(5), secs(5), secs(10)));
        assert!(!ranges_overlap(secs(5), secs(10), secs(0), secs(5)));
        assert!(ranges_overlap(secs(0), secs(5), TimeUs(4_999_999), secs(10)));
    }

    #[test]
    fn empty_conflict_set_yields_zero() {
        assert_eq!(resolve_layer(secs(0), secs(5), &[], None), 0);

        // Non-overlapping neighbours don't count.
        let existing = vec![clip_at(5, 10, 0), clip_at(10, 12, 1)];
        assert_eq!(resolve_layer(secs(0), secs(5), &existing, None), 0);
    }

    #[test]
    fn fully_packed_set_yields_next_index() {
        let existing = vec![clip_at(0, 10, 0), clip_at(0, 10, 1), clip_at(0, 10, 2)];
        assert_eq!(resolve_layer(secs(2), secs(3), &existing, None), 3);
    }

    #[test]
    fn first_fit_fills_gap() {
        // Layer 1 is free in the conflict set {0, 2}.
        let existing = vec![clip_at(0, 10, 0), clip_at(0, 10, 2)];
        assert_eq!(resolve_layer(secs(1), secs(2), &existing, None), 1);
    }

    #[test]
    fn excluded_clip_is_ignored() {
        let a = clip_at(0, 10, 0);
        let existing = vec![a.clone(), clip_at(0, 10, 1)];
        assert_eq!(resolve_layer(secs(0), secs(10), &existing, Some(a.id)), 0);
    }

    #[test]
    fn conflicts_reported_only_for_shared_layers() {
        let a = clip_at(0, 5, 0);
        let b = clip_at(2, 7, 0);
        let c = clip_at(3, 4, 1);
        let conflicts = find_layer_conflicts(&[a.clone(), b.clone(), c]);
        assert_eq!(conflicts, vec![(a.id, b.id)]);
    }
}
