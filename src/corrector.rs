//! The round loop: rebuilds the statistics (C2) and q-gram index (C3)
//! fresh each round, runs the parallel executor (C9, which drives C4/C5
//! and writes to C6), applies accepted corrections (C7), and asks the
//! round controller (C8) whether to continue.

use crate::apply::apply_round;
use crate::budget::Budget;
use crate::config::{self, CorrectorConfig};
use crate::corrections::CorrectionList;
use crate::error::{CorrectorError, Result};
use crate::parallel::run_round;
use crate::qgram::QgramIndex;
use crate::reads::ReadStore;
use crate::rounds::{RoundController, StopReason};
use crate::stats::StatisticalModel;

/// Per-round and aggregate counts returned once the round loop stops.
#[derive(Debug, Clone)]
pub struct CorrectionReport {
    pub rounds_run: u32,
    pub stop_reason: StopReason,
    pub corrections_per_round: Vec<u64>,
}

pub struct Corrector {
    store: ReadStore,
    config: CorrectorConfig,
    /// Accumulated `appendCorrectionInfo` tags per forward read, in
    /// application order across all rounds.
    correction_tags: Vec<Vec<String>>,
}

impl Corrector {
    pub fn new(records: Vec<(String, Vec<u8>)>, config: CorrectorConfig) -> Result<Self> {
        config.validate()?;
        if records.is_empty() {
            return Err(CorrectorError::EmptyInput);
        }
        config::set_match_n(config.match_n);
        let num_reads = records.len();
        Ok(Self {
            store: ReadStore::new(records),
            config,
            correction_tags: vec![Vec::new(); num_reads],
        })
    }

    pub fn reads(&self) -> &ReadStore {
        &self.store
    }

    /// Accumulated `appendCorrectionInfo` tags, indexed by forward read id.
    pub fn correction_tags(&self, forward_id: u32) -> &[String] {
        &self.correction_tags[forward_id as usize]
    }

    pub fn into_records(self) -> Vec<(String, Vec<u8>)> {
        self.store.into_records()
    }

    /// Run the full round loop until the controller (C8) calls a stop.
    pub fn run(&mut self) -> Result<CorrectionReport> {
        let budget = Budget::new(&self.store, self.config.relative_errors_to_correct);
        let mut controller = RoundController::new();
        let mut corrections_per_round = Vec::new();
        let mut round: u32 = 0;
        let mut stop_reason = StopReason::Continue;

        loop {
            let histogram = self.store.length_histogram();
            let model = StatisticalModel::build(&histogram, &self.config);
            let index = QgramIndex::build(&self.store, self.config.q, self.config.kmer_abundance_cutoff);

            let corrections = CorrectionList::new(self.store.len());
            run_round(
                &self.store,
                &model,
                &index,
                &budget,
                &corrections,
                self.config.num_threads,
                self.config.depth_sample_rate,
                round,
                self.config.max_indel_length,
                self.config.overlap_error_rate,
                self.config.verbosity,
            );

            let (apply_stats, info) = apply_round(
                &mut self.store,
                &model,
                &corrections,
                &budget,
                self.config.limit_corr_per_round,
                round,
                self.config.append_correction_info,
            );
            for entry in info {
                self.correction_tags[entry.forward_id as usize].push(entry.tag);
            }
            corrections_per_round.push(apply_stats.corrections_applied);

            stop_reason = controller.record_and_decide(&self.config, round, apply_stats.corrections_applied);
            round += 1;
            if stop_reason != StopReason::Continue {
                break;
            }
        }

        Ok(CorrectionReport {
            rounds_run: round,
            stop_reason,
            corrections_per_round,
        })
    }
}
