//! Overlap-extension scorer (C5): for an erroneous subtree, enumerate
//! sibling "correct" subtrees and score each candidate indel kind by
//! extending left and right with bounded mismatch counting, emitting
//! correction proposals to C6.

use crate::budget::Budget;
use crate::corrections::CorrectionList;
use crate::reads::{bases_match, ReadStore};
use crate::stats::StatisticalModel;
use crate::suffix_walk::ErroneousNode;

/// `Delta`: the maximum indel magnitude considered.
const MAX_DELTA: i32 = 4;

#[derive(Debug, Default, Clone, Copy)]
pub struct ScorerStats {
    pub candidates_considered: u64,
    pub corrections_emitted: u64,
}

/// Score one erroneous node's occurrences against its correct-candidate
/// siblings and append accepted proposals to `corrections`.
#[allow(clippy::too_many_arguments)]
pub fn score_node(
    store: &ReadStore,
    model: &StatisticalModel,
    budget: &Budget,
    corrections: &CorrectionList,
    node: &ErroneousNode,
    l: usize,
    max_indel_length: i32,
    overlap_error_rate: f64,
) -> ScorerStats {
    let mut stats = ScorerStats::default();
    let delta = max_indel_length.min(MAX_DELTA);

    for &err_entry in &node.error_entries {
        let forward_id = store.forward_id(err_entry.read_id);
        if budget.remaining(forward_id) == 0 {
            continue;
        }
        let reverse = store.is_reverse(err_entry.read_id);
        let err_seq = store.sequence(err_entry.read_id);
        let p_err = err_entry.offset as usize + l;

        // Aggregate per-indel-kind scoring across every correct candidate.
        let num_kinds = (2 * delta + 1) as usize;
        let mut overlap_sum = vec![0u32; num_kinds];
        let mut support = vec![0u32; num_kinds];
        let mut min_errors_right = vec![u32::MAX; num_kinds];
        let mut consensus: Vec<rustc_hash::FxHashMap<u8, u32>> = Vec::new();

        for correct_group in &node.correct_groups {
            for &correct_entry in correct_group {
                stats.candidates_considered += 1;
                let correct_seq = store.sequence(correct_entry.read_id);
                let p_c = correct_entry.offset as usize;

                let max_accepted = model.max_accepted_mismatches as i64;
                let (left_matches, accepted_left, left_max_errors) = extend_left(
                    err_seq,
                    p_err,
                    correct_seq,
                    p_c + l,
                    max_accepted,
                    overlap_error_rate,
                );
                if left_matches.is_none() {
                    continue;
                }
                let accepted_left = accepted_left as u32;
                // Mismatches actually spent on the left extension, i.e. this
                // candidate's own accepted-mismatch budget minus what's left
                // of it — not `model.max_accepted_mismatches`, which is a
                // read-length-wide figure unrelated to this candidate's
                // (possibly larger) per-candidate budget.
                let left_errors = (left_max_errors - accepted_left as i64).max(0) as u32;

                for (ki, indel) in (-delta..=delta).enumerate() {
                    let err_cursor = if indel == 0 {
                        p_err + 1
                    } else if indel > 0 {
                        p_err + indel as usize
                    } else {
                        p_err
                    };
                    let correct_cursor = if indel <= 0 {
                        (p_c + l + 1).saturating_sub(indel.unsigned_abs() as usize)
                    } else {
                        (p_c + l).saturating_sub(indel as usize)
                    };

                    let (errors_right, remaining_e, remaining_c) = extend_right(
                        err_seq,
                        err_cursor,
                        correct_seq,
                        correct_cursor,
                        accepted_left as i64,
                    );
                    if errors_right > accepted_left {
                        continue;
                    }

                    let overlap_left = p_err.saturating_sub(left_errors as usize);
                    let extra = if indel == 0 { 1 } else { 0 };
                    let overlap_right = (remaining_e.min(remaining_c) as i64 + extra + indel.min(0) as i64
                        - errors_right as i64)
                        .max(0) as u32;
                    let this_overlap = overlap_left as u32 + overlap_right;

                    overlap_sum[ki] = overlap_sum[ki].saturating_add(this_overlap);
                    if errors_right < min_errors_right[ki] {
                        min_errors_right[ki] = errors_right;
                    }

                    if indel <= 0 {
                        if consensus.len() <= ki {
                            consensus.resize_with(ki + 1, Default::default);
                        }
                        if correct_cursor < correct_seq.len() {
                            *consensus[ki].entry(correct_seq[correct_cursor]).or_insert(0) += 1;
                        }
                    }
                }
            }
        }

        // Support tally: count candidates whose right-overlap error count
        // equals the minimum across kinds.
        let global_min = min_errors_right.iter().copied().filter(|&e| e != u32::MAX).min();
        let Some(global_min) = global_min else { continue };
        for (ki, &errs) in min_errors_right.iter().enumerate() {
            if errs == global_min {
                support[ki] = 1;
            }
        }
        let Some((best_ki, _)) = support
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s > 0)
            .max_by_key(|&(ki, _)| overlap_sum[ki])
        else {
            continue;
        };

        let best_indel = best_ki as i32 - delta;
        let best_overlap = overlap_sum[best_ki];
        if best_overlap == 0 {
            continue;
        }

        let error_pos_forward = if reverse {
            store.mirror_position(forward_id, p_err, best_indel)
        } else {
            p_err
        };

        if let Some((replacement, donor_read_id)) = replacement_bases(store, node, l, best_indel) {
            let overlap_u16 = best_overlap.min(u16::MAX as u32) as u16;
            corrections.add(
                forward_id,
                error_pos_forward as u32,
                reverse,
                best_indel as i8,
                replacement,
                overlap_u16,
                donor_read_id,
            );
            stats.corrections_emitted += 1;
        }

        // Consensus mismatch pass: additional low-confidence corrections
        // at positions right of p_err where the column has a clear
        // majority base the erroneous read disagrees with.
        if best_indel == 0 {
            if let Some(col) = consensus.get(best_ki) {
                let total: u32 = col.values().sum();
                if let Some((&majority_base, &majority_count)) = col.iter().max_by_key(|&(_, c)| *c) {
                    if majority_count >= 2 && total > 0 {
                        let pos = p_err + 1;
                        if pos < err_seq.len() && err_seq[pos] != majority_base {
                            let cons_overlap =
                                ((majority_count as u64 * best_overlap as u64) / total as u64)
                                    .saturating_sub(1)
                                    .max(1)
                                    .min(u16::MAX as u64) as u16;
                            let fwd_pos = if reverse {
                                store.mirror_position(forward_id, pos, 0)
                            } else {
                                pos
                            };
                            let donor_read_id = node
                                .correct_groups
                                .iter()
                                .flatten()
                                .next()
                                .map(|e| store.forward_id(e.read_id))
                                .unwrap_or(forward_id);
                            corrections.add(
                                forward_id,
                                fwd_pos as u32,
                                reverse,
                                0,
                                [majority_base, 0, 0, 0],
                                cons_overlap,
                                donor_read_id,
                            );
                        }
                    }
                }
            }
        }
    }

    stats
}

/// Extend leftward from `(p_err, p_c)` counting mismatches, aborting if
/// they exceed `max(2, overlap_errorrate * min(remaining))`. Returns
/// `(matched_len, accepted_errors_budget_left, max_errors)`: the last two
/// are this candidate's own per-candidate budget, not
/// `model.max_accepted_mismatches` — their difference is the count of
/// mismatches actually spent on the left extension.
fn extend_left(
    err_seq: &[u8],
    p_err: usize,
    correct_seq: &[u8],
    p_c: usize,
    max_accepted: i64,
    overlap_error_rate: f64,
) -> (Option<usize>, i64, i64) {
    let left_remaining_e = p_err;
    let left_remaining_c = p_c;
    let max_errors = (max_accepted).max((overlap_error_rate * left_remaining_e.min(left_remaining_c) as f64).ceil() as i64).max(2);

    let mut errors = 0i64;
    let mut i = 1usize;
    while i <= left_remaining_e.min(left_remaining_c) {
        if !bases_match(err_seq[p_err - i], correct_seq[p_c - i]) {
            errors += 1;
            if errors > max_errors {
                return (None, 0, max_errors);
            }
        }
        i += 1;
    }
    (Some(i - 1), max_errors - errors, max_errors)
}

/// Extend rightward counting mismatches up to `accepted_left` remaining
/// budget. Returns `(errors, remaining_e, remaining_c)` where the
/// remaining counts are the unconsumed read lengths past the cursor.
fn extend_right(
    err_seq: &[u8],
    err_cursor: usize,
    correct_seq: &[u8],
    correct_cursor: usize,
    accepted_left: i64,
) -> (u32, u32, u32) {
    let remaining_e = err_seq.len().saturating_sub(err_cursor);
    let remaining_c = correct_seq.len().saturating_sub(correct_cursor);
    let span = remaining_e.min(remaining_c);
    let mut errors = 0u32;
    for i in 0..span {
        let a = err_seq[err_cursor + i];
        let b = correct_seq[correct_cursor + i];
        if !bases_match(a, b) {
            errors += 1;
            if errors as i64 > accepted_left {
                break;
            }
        }
    }
    (errors, remaining_e as u32, remaining_c as u32)
}

/// Compute the forward-strand replacement bases for the chosen indel kind,
/// along with the forward-strand id of the donor correct-candidate read
/// (carried only for `appendCorrectionInfo` tagging).
fn replacement_bases(store: &ReadStore, node: &ErroneousNode, l: usize, indel: i32) -> Option<([u8; 4], u32)> {
    let correct_entry = node
        .correct_groups
        .iter()
        .flatten()
        .next()
        .copied()?;
    let donor_read_id = store.forward_id(correct_entry.read_id);
    let correct_seq = store.sequence(correct_entry.read_id);
    let p_c = correct_entry.offset as usize;
    let mut out = [0u8; 4];
    if indel == 0 {
        let idx = p_c + l;
        if idx >= correct_seq.len() {
            return None;
        }
        out[0] = correct_seq[idx];
    } else if indel < 0 {
        let width = indel.unsigned_abs() as usize;
        if p_c + l + width > correct_seq.len() {
            return None;
        }
        out[..width].copy_from_slice(&correct_seq[p_c + l..p_c + l + width]);
    }
    // indel > 0 (deletion): no replacement bases needed.
    Some((out, donor_read_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectorConfig;
    use crate::qgram::QgramIndex;
    use crate::suffix_walk::walk_bucket;

    fn build_model(store: &ReadStore) -> StatisticalModel {
        let mut cfg = CorrectorConfig::default();
        cfg.method = crate::config::CutoffMethod::Count;
        cfg.strictness = 3.0;
        cfg.genome_length = 1000.0;
        let hist = store.length_histogram();
        StatisticalModel::build(&hist, &cfg)
    }

    #[test]
    fn extend_left_budget_can_exceed_a_small_model_cap_without_underflow() {
        // A long, perfectly matching left flank (`errors == 0`) with a
        // generous `overlap_error_rate` makes `max_errors` (and hence
        // `accepted_left`) exceed a small per-model mismatch cap —
        // subtracting that cap from `accepted_left` would underflow as an
        // unsigned value. `score_node` must instead derive the spent-error
        // count from this candidate's own `max_errors`, which never
        // underflows.
        let err_seq = vec![b'A'; 100];
        let correct_seq = vec![b'A'; 100];
        let small_model_cap = 2i64;
        let overlap_error_rate = 0.5; // pushes this candidate's own max_errors well above small_model_cap
        let (matched, accepted_left, max_errors) =
            extend_left(&err_seq, 100, &correct_seq, 100, small_model_cap, overlap_error_rate);
        assert!(matched.is_some());
        assert!(
            accepted_left > small_model_cap,
            "this scenario only reproduces the bug when the per-candidate budget exceeds the model cap"
        );

        // What the old code computed (`model.max_accepted_mismatches - accepted_left`)
        // would underflow here; the fix subtracts the per-candidate
        // `max_errors` instead, which by construction cannot.
        let left_errors = (max_errors - accepted_left).max(0) as usize;
        assert_eq!(left_errors, 0, "a perfectly matching flank spends zero mismatches");
        assert_eq!(100usize.saturating_sub(left_errors), 100);
    }

    #[test]
    fn mismatch_is_scored_and_proposed() {
        let mut records = Vec::new();
        for i in 0..20 {
            records.push((format!("r{i}"), b"ACGTACGTACGTACGTACGT".to_vec()));
        }
        records.push(("variant".into(), b"ACGTACGTAGGTACGTACGT".to_vec()));
        let store = ReadStore::new(records);
        let model = build_model(&store);
        let index = QgramIndex::build(&store, 8, 0.0);
        let corrections = CorrectionList::new(store.len());
        let budget = Budget::new(&store, 0.5);

        for &bi in &index.buckets_by_descending_size() {
            let entries = index.bucket_entries(bi).to_vec();
            walk_bucket(&store, &model, &entries, 8, 8, 14, 1, 0, |node| {
                score_node(&store, &model, &budget, &corrections, &node, node.l, 1, 0.04);
            });
        }

        assert!(!corrections.is_empty());
    }
}
