//! Statistical model (C2): precomputes per-depth erroneous-count cutoffs,
//! per-k repeat cutoffs, and a 2-D overlap-sum cutoff table. Purely
//! functional — rebuilt once per round from the current read-length
//! histogram.

pub mod math;

use crate::config::{CorrectorConfig, CutoffMethod};
use rustc_hash::FxHashMap;

/// Immutable, round-scoped statistics consumed by C4/C5/C7.
#[derive(Debug, Clone)]
pub struct StatisticalModel {
    pub kmin: usize,
    pub kmax: usize,
    /// Expected k-mer coverage per position, indexed by k.
    pub expected: Vec<f64>,
    /// Observed-count threshold below which a node is "erroneous", indexed by k.
    pub error_cutoffs: Vec<i64>,
    /// Observed-count threshold above which a node is skipped as repetitive, indexed by k.
    pub repeat_cutoffs: Vec<u32>,
    /// `overlap_sum_cutoffs[read_len][error_pos]`.
    pub overlap_sum_cutoffs: FxHashMap<usize, Vec<f64>>,
    /// Maximum accepted mismatches during overlap extension.
    pub max_accepted_mismatches: u32,
    pub odds_error_reads: f64,
}

impl StatisticalModel {
    /// Build the full statistical model for one round.
    ///
    /// `histogram` maps read length to count, over the *current* (possibly
    /// already-corrected) reads. Falls back to `CutoffMethod::Count` with
    /// `config.degenerate_fallback_count` when `expected[k] == 0` for every
    /// k.
    pub fn build(histogram: &FxHashMap<usize, u64>, config: &CorrectorConfig) -> Self {
        let max_len = histogram.keys().copied().max().unwrap_or(0);
        let (kmin, kmax) = resolve_levels(config, histogram, max_len);

        let expected = expected_coverage(histogram, config.genome_length, kmax);
        let degenerate = expected[kmin..=kmax.max(kmin)].iter().all(|&e| e == 0.0);

        let odds_error_reads = expected_erroneous_odds(&expected, kmin, config.error_rate);

        let method = if degenerate {
            CutoffMethod::Count
        } else {
            config.method
        };
        let strictness = if degenerate {
            config.degenerate_fallback_count as f64
        } else {
            config.strictness
        };

        let error_cutoffs = error_cutoffs(
            &expected,
            method,
            strictness,
            config.error_rate,
            odds_error_reads,
            kmin,
            kmax,
        );
        let repeat_cutoffs = repeat_cutoffs(&expected, kmin, kmax, config.genome_length, 10.0);
        let overlap_sum_cutoffs = overlap_sum_cutoff_table(histogram, config);

        let max_accepted_mismatches = histogram
            .keys()
            .map(|&len| {
                math::binomial_quantile(0.95, len as u64, config.error_rate).max(2) as u32
            })
            .max()
            .unwrap_or(2);

        Self {
            kmin,
            kmax,
            expected,
            error_cutoffs,
            repeat_cutoffs,
            overlap_sum_cutoffs,
            max_accepted_mismatches,
            odds_error_reads,
        }
    }

    #[inline]
    pub fn error_cutoff(&self, k: usize) -> i64 {
        self.error_cutoffs.get(k).copied().unwrap_or(i64::MAX)
    }

    #[inline]
    pub fn repeat_cutoff(&self, k: usize) -> u32 {
        self.repeat_cutoffs.get(k).copied().unwrap_or(u32::MAX)
    }

    #[inline]
    pub fn overlap_sum_cutoff(&self, read_len: usize, error_pos: usize) -> f64 {
        self.overlap_sum_cutoffs
            .get(&read_len)
            .and_then(|row| row.get(error_pos))
            .copied()
            .unwrap_or(3.0)
    }
}

/// Bound `kmin >= log_4(200 * genomeLength)`, `kmax = kmin + 10` capped by
/// the longest read. When
/// `from_level`/`to_level` are non-zero they are used verbatim.
fn resolve_levels(
    config: &CorrectorConfig,
    histogram: &FxHashMap<usize, u64>,
    max_len: usize,
) -> (usize, usize) {
    if config.from_level != 0 && config.to_level != 0 {
        return (config.from_level as usize, config.to_level as usize);
    }

    let auto_kmin = if config.genome_length > 0.0 {
        (200.0 * config.genome_length).log(4.0).ceil().max(1.0) as usize
    } else {
        1
    };

    let kmin = if config.from_level != 0 {
        config.from_level as usize
    } else {
        select_kmin_by_destructibility(histogram, auto_kmin, max_len, config.error_rate)
    };
    let kmax = if config.to_level != 0 {
        config.to_level as usize
    } else {
        (kmin + 10).min(max_len.max(kmin))
    };
    (kmin.max(1), kmax.max(kmin.max(1)))
}

/// Choose kmin minimizing the sum of expected uncorrectable + destructible
/// reads, weighted by error rate across the length histogram.
/// Uncorrectable: no error-free k-window exists in the read given `e`
/// errors distributed uniformly. Destructible: at least one error falls
/// so close to an end that no overlap survives.
fn select_kmin_by_destructibility(
    histogram: &FxHashMap<usize, u64>,
    floor: usize,
    max_len: usize,
    error_rate: f64,
) -> usize {
    if max_len == 0 {
        return floor.max(1);
    }
    let upper = max_len.min(floor + 30).max(floor + 1);
    let mut best_k = floor.max(1);
    let mut best_cost = f64::INFINITY;
    for k in floor.max(1)..=upper {
        let mut cost = 0.0;
        for (&len, &count) in histogram {
            if len == 0 {
                continue;
            }
            let expected_errors = (len as f64 * error_rate).max(0.0);
            // number of k-windows in a read of this length
            let windows = (len as i64 - k as i64 + 1).max(0) as f64;
            // probability a given window contains >=1 error, approximated
            // via a Poisson thinning of the read's expected error count.
            let p_window_has_error = if windows > 0.0 {
                1.0 - (1.0 - error_rate).powi(k as i32)
            } else {
                1.0
            };
            let uncorrectable = windows * p_window_has_error * expected_errors.min(1.0);
            let destructible = 2.0 * k as f64 * error_rate;
            cost += count as f64 * (uncorrectable + destructible);
        }
        if cost < best_cost {
            best_cost = cost;
            best_k = k;
        }
    }
    best_k
}

/// `expected[k] = sum_L H[L] * (L - k + 1) / G`.
pub fn expected_coverage(histogram: &FxHashMap<usize, u64>, genome_length: f64, kmax: usize) -> Vec<f64> {
    let mut expected = vec![0.0; kmax + 2];
    if genome_length <= 0.0 {
        return expected;
    }
    for k in 0..expected.len() {
        let mut sum = 0.0;
        for (&len, &count) in histogram {
            let windows = len as i64 - k as i64 + 1;
            if windows > 0 {
                sum += count as f64 * windows as f64;
            }
        }
        expected[k] = sum / genome_length;
    }
    expected
}

/// Ratio of expected erroneous to expected correct reads at depth `kmin`,
/// used as the classifier's prior.
fn expected_erroneous_odds(expected: &[f64], kmin: usize, error_rate: f64) -> f64 {
    let lambda = expected.get(kmin).copied().unwrap_or(0.0);
    if lambda <= 0.0 {
        return 1.0;
    }
    let p_clean = (1.0 - error_rate).powi(kmin as i32);
    let correct = lambda * p_clean;
    let erroneous = lambda * (1.0 - p_clean);
    if correct <= 0.0 {
        1.0
    } else {
        erroneous / correct
    }
}

fn error_cutoffs(
    expected: &[f64],
    method: CutoffMethod,
    strictness: f64,
    error_rate: f64,
    odds_error_reads: f64,
    kmin: usize,
    kmax: usize,
) -> Vec<i64> {
    let mut thresholds = vec![0i64; kmax + 2];
    for k in kmin..=kmax + 1 {
        if k >= expected.len() {
            continue;
        }
        thresholds[k] = match method {
            CutoffMethod::Count => strictness as i64,
            CutoffMethod::Expected => expected[k].floor() as i64,
            CutoffMethod::ControlFp => math::qpois(strictness, expected[k]),
            CutoffMethod::ControlFn => {
                1 + math::qpoismixerror(1.0 - strictness, expected[k], error_rate, k as u32)
            }
            CutoffMethod::Classifier => {
                math::poisson_classifier_cutoff(strictness * odds_error_reads, expected[k], error_rate, k as u32)
            }
        };
    }
    thresholds
}

/// For each k, smallest observed count `c` at which
/// `P(n > 1 copies | c) / P(n == 1 copy | c) >= given_odds` under a
/// Poisson-mixture genome model enumerating `n in [1, 10]` copies.
fn repeat_cutoffs(expected: &[f64], kmin: usize, kmax: usize, genome_length: f64, given_odds: f64) -> Vec<u32> {
    let mut cutoffs = vec![u32::MAX; kmax + 2];
    if genome_length <= 0.0 {
        return cutoffs;
    }
    for k in kmin..=kmax + 1 {
        if k >= expected.len() {
            continue;
        }
        let lambda1 = expected[k];
        if lambda1 <= 0.0 {
            continue;
        }
        let cap = ((lambda1 * 20.0) as u64).max(50);
        for c in 0..=cap {
            let p_n1 = math::poisson_pmf(c, lambda1);
            let mut p_multi = 0.0;
            for n in 2..=10u64 {
                p_multi += math::poisson_pmf(c, lambda1 * n as f64);
            }
            if p_n1 > 0.0 && p_multi / p_n1 >= given_odds {
                cutoffs[k] = c as u32;
                break;
            }
        }
    }
    cutoffs
}

/// For each read length present in the histogram and each error position,
/// the minimum combined overlap required to accept a correction. Computed
/// for the first half of each length and mirrored around the midpoint.
fn overlap_sum_cutoff_table(
    histogram: &FxHashMap<usize, u64>,
    config: &CorrectorConfig,
) -> FxHashMap<usize, Vec<f64>> {
    let mut table = FxHashMap::default();
    let w = config.wovsum.clamp(0.0, 1.0);
    for &len in histogram.keys() {
        if len == 0 {
            table.insert(len, Vec::new());
            continue;
        }
        let mut row = vec![0.0; len];
        let half = (len + 1) / 2;
        for i in 0..half {
            row[i] = overlap_sum_cutoff_at(len, i, w, config.error_rate);
        }
        for i in half..len {
            row[i] = row[len - 1 - i];
        }
        table.insert(len, row);
    }
    table
}

/// `cutoff(l, i) = max(5, (1-w)*E_correct + w*E_random)`,
/// where `E_correct` is the expected overlap length for a true match and
/// `E_random` the expected overlap for a chance match at substitution
/// rate 1/4.
fn overlap_sum_cutoff_at(len: usize, error_pos: usize, w: f64, error_rate: f64) -> f64 {
    let max_overlap = len.saturating_sub(error_pos).max(1) as f64;
    let p_extend_correct = 1.0 - error_rate;
    let p_extend_random = 0.25; // chance of a random base match at substitution rate 1/4
    let e_correct = max_overlap * p_extend_correct;
    let e_random = max_overlap * p_extend_random;
    (5.0_f64).max((1.0 - w) * e_correct + w * e_random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectorConfig;

    fn hist(pairs: &[(usize, u64)]) -> FxHashMap<usize, u64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn expected_coverage_matches_formula() {
        let h = hist(&[(50, 100)]);
        let expected = expected_coverage(&h, 1000.0, 20);
        // k=10: 100 * (50 - 10 + 1) / 1000 = 4.1
        assert!((expected[10] - 4.1).abs() < 1e-9);
    }

    #[test]
    fn degenerate_statistics_fall_back_to_count() {
        let h = hist(&[(50, 2)]);
        let mut cfg = CorrectorConfig::default();
        cfg.genome_length = 0.0; // forces expected[k] == 0 everywhere
        cfg.degenerate_fallback_count = 2;
        let model = StatisticalModel::build(&h, &cfg);
        assert!(model.error_cutoffs[model.kmin..=model.kmax].iter().all(|&c| c == 2));
    }

    #[test]
    fn overlap_sum_table_is_symmetric() {
        let h = hist(&[(40, 10)]);
        let cfg = CorrectorConfig::default();
        let table = overlap_sum_cutoff_table(&h, &cfg);
        let row = &table[&40];
        assert_eq!(row.len(), 40);
        assert!((row[0] - row[39]).abs() < 1e-9);
        assert!((row[5] - row[34]).abs() < 1e-9);
    }

    #[test]
    fn repeat_cutoffs_increase_with_odds() {
        let expected = vec![0.0, 1.0, 2.0, 5.0, 10.0];
        let loose = repeat_cutoffs(&expected, 1, 3, 1000.0, 2.0);
        let strict = repeat_cutoffs(&expected, 1, 3, 1000.0, 20.0);
        assert!(strict[3] >= loose[3]);
    }
}
