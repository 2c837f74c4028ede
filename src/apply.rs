//! Apply phase (C7): resolves each read's correction chain into an ordered,
//! conflict-free edit list and rewrites the read.
//!
//! Edits are applied in descending position order so that earlier
//! (lower-offset) edits never need their positions adjusted for indels
//! already spliced in further downstream.

use crate::budget::Budget;
use crate::corrections::{CorrectionList, Record};
use crate::reads::ReadStore;
use crate::stats::StatisticalModel;

#[derive(Debug, Default, Clone, Copy)]
pub struct ApplyStats {
    pub reads_touched: u64,
    pub corrections_applied: u64,
}

/// One applied correction's `appendCorrectionInfo` tag text,
/// keyed by the forward read it was applied to.
#[derive(Debug, Clone)]
pub struct CorrectionInfo {
    pub forward_id: u32,
    pub tag: String,
}

/// Resolve and apply every read's pending corrections. Returns aggregate
/// counts and, when `collect_info` is set, a tag per applied correction
/// for `appendCorrectionInfo`; the correction list is left
/// untouched (it is rebuilt fresh each round by C9).
pub fn apply_round(
    store: &mut ReadStore,
    model: &StatisticalModel,
    corrections: &CorrectionList,
    budget: &Budget,
    limit_corr_per_round: bool,
    round: u32,
    collect_info: bool,
) -> (ApplyStats, Vec<CorrectionInfo>) {
    let mut stats = ApplyStats::default();
    let mut info = Vec::new();
    let forward_ids: Vec<u32> = store.forward_ids().collect();

    for forward_id in forward_ids {
        let chain = corrections.read().chain(forward_id);
        if chain.is_empty() {
            continue;
        }
        let read_len = store.length(forward_id);
        let original_seq = store.sequence(forward_id).to_vec();
        let accepted = select_corrections(
            model,
            budget,
            forward_id,
            read_len,
            &original_seq,
            &chain,
            limit_corr_per_round,
        );
        if accepted.is_empty() {
            continue;
        }

        let mut seq = original_seq.clone();
        for record in &accepted {
            if collect_info {
                info.push(CorrectionInfo {
                    forward_id,
                    tag: correction_info_tag(&original_seq, record, round),
                });
            }
            apply_one(&mut seq, record);
            budget.consume(forward_id);
        }
        store.apply_forward_sequence(forward_id, seq);

        stats.reads_touched += 1;
        stats.corrections_applied += accepted.len() as u64;
    }

    (stats, info)
}

/// Render one accepted correction as `position(round, overlapSum,
/// donorReadId):op`. `original_seq` is the read's sequence
/// before this round's edits so the substitution op can report the
/// replaced base. Integer fields are rendered with `itoa` rather than
/// `write!`, since every number here is already an unsigned integer and
/// this runs once per accepted correction.
fn correction_info_tag(original_seq: &[u8], record: &Record, round: u32) -> String {
    let pos = record.error_pos as usize;
    let op = match record.indel_len.cmp(&0) {
        std::cmp::Ordering::Equal => {
            let from = original_seq.get(pos).copied().unwrap_or(b'?') as char;
            let to = record.correct_seq[0] as char;
            format!("{from}\u{2192}{to}")
        }
        std::cmp::Ordering::Greater => {
            let width = record.indel_len as usize;
            let end = (pos + width).min(original_seq.len());
            let removed: String = original_seq[pos.min(original_seq.len())..end]
                .iter()
                .map(|&b| b as char)
                .collect();
            format!("-{removed}")
        }
        std::cmp::Ordering::Less => {
            let width = record.indel_len.unsigned_abs() as usize;
            let inserted: String = record.correct_seq[..width].iter().map(|&b| b as char).collect();
            format!("+{inserted}")
        }
    };

    let mut buf = itoa::Buffer::new();
    let mut tag = String::with_capacity(24 + op.len());
    tag.push_str(buf.format(record.error_pos));
    tag.push('(');
    tag.push_str(buf.format(round));
    tag.push_str(", ");
    tag.push_str(buf.format(record.overlap_combined()));
    tag.push_str(", ");
    tag.push_str(buf.format(record.donor_read_id));
    tag.push_str("):");
    tag.push_str(&op);
    tag
}

/// Lower rank sorts first: mismatches (`indel_len == 0`) rank above every
/// indel, and among indels a larger positive (deletion) ranks above a
/// smaller positive or negative (insertion) one — spec §4.7 steps 2 and 4's
/// "preferring mismatch, then larger positive indel" tie-break.
#[inline]
fn indel_tie_break_rank(indel_len: i8) -> (u8, i32) {
    if indel_len == 0 {
        (0, 0)
    } else {
        (1, -(indel_len as i32))
    }
}

/// Sort by descending position, tie-break descending combined overlap,
/// tie-break preferring mismatch then larger positive indel (spec §4.7
/// steps 2 and 4 — one sort suffices here since no separate dedup pass
/// runs between them), then greedily accept corrections that clear the
/// overlap-sum cutoff, stay within budget, and do not overlap a position
/// already claimed by an earlier (higher-position) acceptance — except
/// positions that would replace an `N`, which are always accepted.
fn select_corrections(
    model: &StatisticalModel,
    budget: &Budget,
    forward_id: u32,
    read_len: usize,
    original_seq: &[u8],
    chain: &[Record],
    limit_corr_per_round: bool,
) -> Vec<Record> {
    let mut candidates: Vec<Record> = chain.to_vec();
    candidates.sort_unstable_by(|a, b| {
        b.error_pos
            .cmp(&a.error_pos)
            .then_with(|| b.overlap_combined().cmp(&a.overlap_combined()))
            .then_with(|| indel_tie_break_rank(a.indel_len).cmp(&indel_tie_break_rank(b.indel_len)))
    });

    let mut accepted: Vec<Record> = Vec::new();
    let mut claimed_until: Option<u32> = None;
    let mut remaining = budget.remaining(forward_id);

    for record in candidates {
        if limit_corr_per_round && remaining == 0 {
            break;
        }
        let pos = record.error_pos as usize;
        if pos >= read_len {
            continue;
        }

        // Mismatches that replace an original `N` are always accepted,
        // regardless of overlap sum.
        let always_accept = record.indel_len == 0 && original_seq[pos] == crate::reads::BASE_N;
        let cutoff = model.overlap_sum_cutoff(read_len, pos);
        if !always_accept && (record.overlap_combined() as f64) < cutoff {
            continue;
        }

        if let Some(claimed) = claimed_until {
            let span = record.replacement_len() as u32 + 1;
            if record.error_pos + span > claimed {
                continue; // conflicts with an already-accepted, higher-position edit
            }
        }

        claimed_until = Some(record.error_pos);
        accepted.push(record);
        if limit_corr_per_round {
            remaining = remaining.saturating_sub(1);
        }
    }

    accepted
}

/// Splice one record's edit into `seq` at `record.error_pos`
///: `indel_len == 0` substitutes one base,
/// `indel_len < 0` inserts `|indel_len|` bases, `indel_len > 0` deletes
/// `indel_len` bases.
fn apply_one(seq: &mut Vec<u8>, record: &Record) {
    let pos = record.error_pos as usize;
    if pos > seq.len() {
        return;
    }
    match record.indel_len.cmp(&0) {
        std::cmp::Ordering::Equal => {
            if pos < seq.len() {
                seq[pos] = record.correct_seq[0];
            }
        }
        std::cmp::Ordering::Less => {
            let width = record.indel_len.unsigned_abs() as usize;
            let insert = &record.correct_seq[..width];
            seq.splice(pos..pos, insert.iter().copied());
        }
        std::cmp::Ordering::Greater => {
            let width = record.indel_len as usize;
            let end = (pos + width).min(seq.len());
            seq.drain(pos..end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectorConfig;
    use rustc_hash::FxHashMap;

    fn model_with_low_cutoffs() -> StatisticalModel {
        let mut hist = FxHashMap::default();
        hist.insert(20usize, 5u64);
        let mut cfg = CorrectorConfig::default();
        cfg.wovsum = 0.0;
        cfg.error_rate = 0.5; // keeps the overlap-sum cutoff floor small
        StatisticalModel::build(&hist, &cfg)
    }

    #[test]
    fn substitution_is_applied_at_position() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, 0, [b'G', 0, 0, 0], 100, 0);

        let (stats, _) = apply_round(&mut store, &model, &corrections, &budget, false, 0, false);
        assert_eq!(stats.corrections_applied, 1);
        assert_eq!(store.sequence(0)[4], b'G');
    }

    #[test]
    fn low_overlap_corrections_are_rejected() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, 0, [b'G', 0, 0, 0], 0, 0);

        let (stats, _) = apply_round(&mut store, &model, &corrections, &budget, false, 0, false);
        assert_eq!(stats.corrections_applied, 0);
        assert_eq!(store.sequence(0)[4], b'A');
    }

    #[test]
    fn deletion_shrinks_the_read() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, 1, [0, 0, 0, 0], 100, 0);

        apply_round(&mut store, &model, &corrections, &budget, false, 0, false);
        assert_eq!(store.length(0), 19);
    }

    #[test]
    fn insertion_grows_the_read() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, -1, [b'T', 0, 0, 0], 100, 0);

        apply_round(&mut store, &model, &corrections, &budget, false, 0, false);
        assert_eq!(store.length(0), 21);
        assert_eq!(store.sequence(0)[4], b'T');
    }

    #[test]
    fn n_positions_are_corrected_despite_low_overlap() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTNCGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, 0, [b'C', 0, 0, 0], 0, 0);

        let (stats, _) = apply_round(&mut store, &model, &corrections, &budget, false, 0, false);
        assert_eq!(stats.corrections_applied, 1);
        assert_eq!(store.sequence(0)[4], b'C');
    }

    #[test]
    fn correction_info_tags_report_position_round_overlap_and_donor() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections = CorrectionList::new(1);
        let budget = Budget::new(&store, 1.0);
        corrections.add(0, 4, false, 0, [b'G', 0, 0, 0], 100, 7);

        let (stats, info) = apply_round(&mut store, &model, &corrections, &budget, false, 2, true);
        assert_eq!(stats.corrections_applied, 1);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].forward_id, 0);
        assert_eq!(info[0].tag, "4(2, 100, 7):A\u{2192}G");
    }

    #[test]
    fn indel_tie_break_prefers_mismatch_then_larger_positive_indel() {
        let mut ranks: Vec<i8> = vec![-4, -1, 0, 1, 4];
        ranks.sort_unstable_by(|a, b| indel_tie_break_rank(*a).cmp(&indel_tie_break_rank(*b)));
        assert_eq!(ranks, vec![0, 4, 1, -1, -4]);
    }

    #[test]
    fn tied_position_and_overlap_accept_mismatch_over_indel_regardless_of_chain_order() {
        // A mismatch and a deletion proposed at the same position with
        // identical overlap must resolve the same way no matter which one
        // was appended to the chain first — the sort's tie-break, not
        // insertion order, must decide.
        let mut store_a = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let model = model_with_low_cutoffs();
        let corrections_a = CorrectionList::new(1);
        let budget_a = Budget::new(&store_a, 1.0);
        corrections_a.add(0, 4, false, 0, [b'G', 0, 0, 0], 50, 0); // mismatch first
        corrections_a.add(0, 4, false, 1, [0, 0, 0, 0], 50, 0); // then deletion

        let mut store_b = ReadStore::new(vec![("r0".into(), b"ACGTACGTACGTACGTACGT".to_vec())]);
        let corrections_b = CorrectionList::new(1);
        let budget_b = Budget::new(&store_b, 1.0);
        corrections_b.add(0, 4, false, 1, [0, 0, 0, 0], 50, 0); // deletion first
        corrections_b.add(0, 4, false, 0, [b'G', 0, 0, 0], 50, 0); // then mismatch

        apply_round(&mut store_a, &model, &corrections_a, &budget_a, false, 0, false);
        apply_round(&mut store_b, &model, &corrections_b, &budget_b, false, 0, false);

        assert_eq!(store_a.sequence(0), store_b.sequence(0));
        assert_eq!(store_a.sequence(0)[4], b'G');
        assert_eq!(store_a.length(0), 20, "the mismatch, not the deletion, should have been applied");
    }
}
