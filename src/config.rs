//! Corrector configuration.
//!
//! Almost all of qcorrect's knobs are plain fields of [`CorrectorConfig`]
//! threaded explicitly through the round controller as a context value
//! rather than process-wide statics. The one exception is `matchN`, read
//! from the hottest per-base comparison loops in the suffix-tree walker and
//! overlap scorer; it is exposed as a cheap atomic so those loops don't need
//! a config reference threaded through every call.

use crate::error::ConfigError;
use std::sync::atomic::{AtomicBool, Ordering};

static MATCH_N: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn set_match_n(enabled: bool) {
    MATCH_N.store(enabled, Ordering::Release);
}

#[inline]
pub fn match_n() -> bool {
    MATCH_N.load(Ordering::Acquire)
}

/// Statistical cutoff method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoffMethod {
    /// Bayes classifier comparing correct- vs. erroneous-read mixtures.
    #[default]
    Classifier,
    /// Poisson p-value control of false positives.
    ControlFp,
    /// Poisson-mixture control of false negatives (sensitivity).
    ControlFn,
    /// `cutoff[k] = expected[k]` (floored).
    Expected,
    /// `cutoff[k] = strictness` (a fixed count).
    Count,
}

impl CutoffMethod {
    pub fn name(&self) -> &'static str {
        match self {
            CutoffMethod::Classifier => "classifier",
            CutoffMethod::ControlFp => "control_fp",
            CutoffMethod::ControlFn => "control_fn",
            CutoffMethod::Expected => "expected",
            CutoffMethod::Count => "count",
        }
    }

    pub fn from_name(s: &str) -> Self {
        match s {
            "control_fp" => CutoffMethod::ControlFp,
            "control_fn" => CutoffMethod::ControlFn,
            "expected" => CutoffMethod::Expected,
            "count" => CutoffMethod::Count,
            _ => CutoffMethod::Classifier,
        }
    }
}

/// Full configuration surface for the corrector.
#[derive(Debug, Clone)]
pub struct CorrectorConfig {
    pub genome_length: f64,
    pub error_rate: f64,
    pub overlap_error_rate: f64,
    pub strictness: f64,
    pub method: CutoffMethod,
    /// 0 means "auto".
    pub from_level: u32,
    pub to_level: u32,
    pub depth_sample_rate: u32,
    pub kmer_abundance_cutoff: f64,
    pub max_indel_length: i32,
    /// 0 means "auto via C8".
    pub cycles: u32,
    pub relative_errors_to_correct: f64,
    pub wovsum: f64,
    pub packages_per_thread: usize,
    pub num_threads: usize,
    pub match_n: bool,
    pub trim_ns_on_output: bool,
    pub limit_corr_per_round: bool,
    pub append_correction_info: bool,
    pub q: usize,
    pub verbosity: u8,
    /// Fallback threshold used when statistics degenerate.
    pub degenerate_fallback_count: i64,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            genome_length: 0.0,
            error_rate: 0.01,
            overlap_error_rate: 0.02,
            strictness: 0.0001,
            method: CutoffMethod::Classifier,
            from_level: 0,
            to_level: 0,
            depth_sample_rate: 1,
            kmer_abundance_cutoff: 0.05,
            max_indel_length: 1,
            cycles: 0,
            relative_errors_to_correct: 0.5,
            wovsum: 0.5,
            packages_per_thread: 4,
            num_threads: 1,
            match_n: false,
            trim_ns_on_output: true,
            limit_corr_per_round: true,
            append_correction_info: false,
            q: 10,
            verbosity: 0,
            degenerate_fallback_count: 2,
        }
    }
}

impl CorrectorConfig {
    /// Validate every field, surfacing the "Configuration" error kind
    /// before round 1 starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=4).contains(&self.max_indel_length) {
            return Err(ConfigError::IndelLengthOutOfRange(self.max_indel_length));
        }
        if self.from_level != 0 && self.to_level != 0 && self.from_level > self.to_level {
            return Err(ConfigError::LevelOrder {
                from: self.from_level,
                to: self.to_level,
            });
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(ConfigError::ErrorRateOutOfRange(self.error_rate));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::ZeroThreads(self.num_threads));
        }
        if !(0.0..=1.0).contains(&self.wovsum) {
            return Err(ConfigError::WovsumOutOfRange(self.wovsum));
        }
        Ok(())
    }

    /// Hard cap on rounds regardless of `cycles`.
    pub fn hard_round_cap(&self) -> u32 {
        const HARD_CAP: u32 = 6;
        if self.cycles == 0 {
            HARD_CAP
        } else {
            self.cycles.min(HARD_CAP)
        }
    }

    pub fn auto_cycles(&self) -> bool {
        self.cycles == 0
    }
}
