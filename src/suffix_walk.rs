//! Suffix-tree walker (C4): per bucket, a depth-first traversal of the
//! generalized suffix tree of reads between depths `[kmin, kmax]`, testing
//! the "erroneous node" predicate at each node and collecting sibling
//! "correct" subtrees for C5.
//!
//! The tree is never materialized explicitly. A bucket's suffixes are
//! sorted once (comparison-sort over at most `kmax` bytes per suffix, in
//! place of a linear-time suffix-array construction — a simplification
//! documented in DESIGN.md), after which any prefix depth's groups are
//! contiguous runs, and the traversal walks an explicit stack of
//! `(range, matched_len)` frames rather than recursing, so traversal depth
//! is bounded only by heap, not call-stack, space.

use crate::qgram::SuffixEntry;
use crate::reads::{is_known_base, ReadStore};
use crate::stats::StatisticalModel;

/// An erroneous-node event handed off to C5, together with the sibling
/// groups eligible as correct candidates.
pub struct ErroneousNode {
    /// `parentRepLength` of the node.
    pub l: usize,
    pub error_entries: Vec<SuffixEntry>,
    pub correct_groups: Vec<Vec<SuffixEntry>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WalkerStats {
    pub investigated_nodes: u64,
    pub emitted_nodes: u64,
}

const ENDED: u8 = 0;

#[inline]
fn char_at(store: &ReadStore, entry: SuffixEntry, pos: usize) -> u8 {
    let seq = store.sequence(entry.read_id);
    let idx = entry.offset as usize + pos;
    if idx < seq.len() {
        seq[idx]
    } else {
        ENDED
    }
}

/// Period-`p` self-repetition covering at least half of `label`'s length,
/// for `p` in `1..=6`.
fn is_self_repetitive(label: &[u8]) -> bool {
    let len = label.len();
    if len < 2 {
        return false;
    }
    for period in 1..=6.min(len - 1) {
        let mut matches = 0usize;
        for i in period..len {
            if label[i] == label[i - period] {
                matches += 1;
            }
        }
        if matches * 2 >= len {
            return true;
        }
    }
    false
}

struct Frame {
    start: usize,
    end: usize,
    matched_len: usize,
}

/// Walk one bucket's suffixes, invoking `emit` for each erroneous-emit
/// node discovered.
#[allow(clippy::too_many_arguments)]
pub fn walk_bucket(
    store: &ReadStore,
    model: &StatisticalModel,
    bucket_entries: &[SuffixEntry],
    q: usize,
    kmin: usize,
    kmax: usize,
    depth_sample_rate: u32,
    round: u32,
    mut emit: impl FnMut(ErroneousNode),
) -> WalkerStats {
    let mut stats = WalkerStats::default();
    if bucket_entries.len() < 3 {
        return stats;
    }

    let mut work: Vec<SuffixEntry> = bucket_entries.to_vec();
    work.sort_unstable_by(|&a, &b| {
        for pos in 0..kmax {
            let ca = char_at(store, a, pos);
            let cb = char_at(store, b, pos);
            if ca != cb {
                return ca.cmp(&cb);
            }
        }
        std::cmp::Ordering::Equal
    });

    // The q-gram node itself: no siblings (its siblings live in other
    // buckets, each processed as an independent unit of work).
    let root_matched_len = q.max(1);
    evaluate_node(
        store,
        model,
        &work,
        0,
        work.len(),
        root_matched_len,
        Vec::new(),
        kmin,
        kmax,
        depth_sample_rate,
        round,
        &mut stats,
        &mut emit,
    );

    let mut stack = vec![Frame {
        start: 0,
        end: work.len(),
        matched_len: root_matched_len,
    }];

    while let Some(frame) = stack.pop() {
        if frame.matched_len > kmax {
            continue;
        }
        let groups = partition_children(store, &work, frame.start, frame.end, frame.matched_len);
        for (gi, &(gs, ge)) in groups.iter().enumerate() {
            let siblings: Vec<Vec<SuffixEntry>> = groups
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != gi)
                .map(|(_, &(s, e))| work[s..e].to_vec())
                .collect();
            let descend = evaluate_node(
                store,
                model,
                &work,
                gs,
                ge,
                frame.matched_len + 1,
                siblings,
                kmin,
                kmax,
                depth_sample_rate,
                round,
                &mut stats,
                &mut emit,
            );
            if descend && frame.matched_len + 1 <= kmax {
                stack.push(Frame {
                    start: gs,
                    end: ge,
                    matched_len: frame.matched_len + 1,
                });
            }
        }
    }

    stats
}

/// Partition `work[start..end]` (already globally sorted) into contiguous
/// runs sharing the same character at `matched_len`.
fn partition_children(
    store: &ReadStore,
    work: &[SuffixEntry],
    start: usize,
    end: usize,
    matched_len: usize,
) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut i = start;
    while i < end {
        let c = char_at(store, work[i], matched_len);
        let mut j = i + 1;
        while j < end && char_at(store, work[j], matched_len) == c {
            j += 1;
        }
        groups.push((i, j));
        i = j;
    }
    groups
}

/// Test the erroneous-node predicate for one node and, if eligible, call
/// `emit`. Returns whether the walker should still descend into this
/// node's children — a node can be ineligible to emit a correction while
/// its children are still worth visiting, so the two decisions are kept
/// separate (see DESIGN.md).
#[allow(clippy::too_many_arguments)]
fn evaluate_node(
    store: &ReadStore,
    model: &StatisticalModel,
    work: &[SuffixEntry],
    start: usize,
    end: usize,
    matched_len: usize,
    correct_groups: Vec<Vec<SuffixEntry>>,
    kmin: usize,
    kmax: usize,
    depth_sample_rate: u32,
    round: u32,
    stats: &mut WalkerStats,
    emit: &mut impl FnMut(ErroneousNode),
) -> bool {
    stats.investigated_nodes += 1;
    let l = matched_len - 1;
    let count = end - start;
    let representative = work[start];
    let edge_char = char_at(store, representative, l);

    // Hard skip: never descend, never emit.
    if l > kmax || edge_char == ENDED || !is_known_base(edge_char) || count < 3 {
        return false;
    }
    let label_end = (representative.offset as usize + matched_len).min(store.sequence(representative.read_id).len());
    let label = &store.sequence(representative.read_id)[representative.offset as usize..label_end];
    if is_self_repetitive(label) {
        return false;
    }

    // Soft skip: still descend, but this node is not itself emitted.
    let sampled = depth_sample_rate <= 1
        || (l as i64 + round as i64 - kmin as i64).rem_euclid(depth_sample_rate as i64) == 0;
    if l < kmin || !sampled {
        return true;
    }
    if (count as i64) >= model.error_cutoff(l + 1) {
        return true; // "probably correct" — descend but don't emit
    }

    stats.emitted_nodes += 1;
    let error_entries = work[start..end].to_vec();
    let mut qualifying: Vec<Vec<SuffixEntry>> = correct_groups
        .iter()
        .filter(|g| {
            let c = g.len() as i64;
            c >= model.error_cutoff(l + 1) && (c as u32) < model.repeat_cutoff(l + 1)
        })
        .cloned()
        .collect();
    if qualifying.is_empty() {
        if let Some(thickest) = correct_groups.iter().max_by_key(|g| g.len()) {
            if !thickest.is_empty() {
                qualifying.push(thickest.clone());
            }
        }
    }

    emit(ErroneousNode {
        l,
        error_entries,
        correct_groups: qualifying,
    });
    true
}
