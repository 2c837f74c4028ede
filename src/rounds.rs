//! Round controller (C8): decides whether another correction round is
//! worthwhile by regressing log(corrections) against round index and
//! watching the fit decay.
//!
//! Mirrors the original's two stopping policies: an `autoCycles` mode that
//! stops once the running adjusted-R^2 falls to or below 0.95, and a
//! fixed-`cycles` mode where autolevel is disabled but the hard 6-round
//! cap (`CorrectorConfig::hard_round_cap`) still applies.

use crate::config::CorrectorConfig;
use crate::stats::math::LinearModel;

#[derive(Debug, Clone, Default)]
pub struct RoundController {
    round_indices: Vec<f64>,
    log_corrections: Vec<f64>,
    best_adjusted_r2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    HardCap,
    NoCorrections,
    FitDecayed,
    ConfiguredCyclesReached,
    Continue,
}

impl RoundController {
    pub fn new() -> Self {
        Self {
            round_indices: Vec::new(),
            log_corrections: Vec::new(),
            best_adjusted_r2: f64::NEG_INFINITY,
        }
    }

    /// Record one round's outcome and decide whether round `round + 1`
    /// should run. At `verbosity >= 1`,
    /// prints the round's correction count and, once the regression has
    /// enough points, its adjusted R² to stderr.
    pub fn record_and_decide(&mut self, config: &CorrectorConfig, round: u32, corrections_applied: u64) -> StopReason {
        let next_round = round + 1;
        if next_round >= config.hard_round_cap() {
            self.log(config, round, corrections_applied, None);
            return StopReason::HardCap;
        }
        if !config.auto_cycles() && next_round >= config.cycles {
            self.log(config, round, corrections_applied, None);
            return StopReason::ConfiguredCyclesReached;
        }
        if corrections_applied == 0 {
            self.log(config, round, corrections_applied, None);
            return StopReason::NoCorrections;
        }

        if !config.auto_cycles() {
            self.log(config, round, corrections_applied, None);
            return StopReason::Continue;
        }

        self.round_indices.push(round as f64);
        self.log_corrections.push(((corrections_applied + 1) as f64).ln());

        if self.round_indices.len() < 3 {
            self.log(config, round, corrections_applied, None);
            return StopReason::Continue;
        }

        let model = LinearModel::fit(&self.round_indices, &self.log_corrections);
        let adj_r2 = model.adjusted_r_square(&self.round_indices, &self.log_corrections);

        let decision = if self.round_indices.len() == 3 {
            if adj_r2 <= 0.95 {
                StopReason::FitDecayed
            } else {
                StopReason::Continue
            }
        } else if adj_r2 < self.best_adjusted_r2 {
            StopReason::FitDecayed
        } else {
            StopReason::Continue
        };

        self.best_adjusted_r2 = self.best_adjusted_r2.max(adj_r2);
        self.log(config, round, corrections_applied, Some(adj_r2));
        decision
    }

    fn log(&self, config: &CorrectorConfig, round: u32, corrections_applied: u64, adj_r2: Option<f64>) {
        if config.verbosity == 0 {
            return;
        }
        match adj_r2 {
            Some(r2) => {
                let mut buf = ryu::Buffer::new();
                eprintln!("qcorrect: round {round}: {corrections_applied} corrections, adjR2={}", buf.format(r2));
            }
            None => eprintln!("qcorrect: round {round}: {corrections_applied} corrections"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_hard_cap_regardless_of_corrections() {
        let mut controller = RoundController::new();
        let cfg = CorrectorConfig::default();
        assert_eq!(
            controller.record_and_decide(&cfg, 5, 1000),
            StopReason::HardCap
        );
    }

    #[test]
    fn stops_when_no_corrections_were_applied() {
        let mut controller = RoundController::new();
        let cfg = CorrectorConfig::default();
        assert_eq!(
            controller.record_and_decide(&cfg, 0, 0),
            StopReason::NoCorrections
        );
    }

    #[test]
    fn fixed_cycles_mode_stops_at_configured_count() {
        let mut controller = RoundController::new();
        let mut cfg = CorrectorConfig::default();
        cfg.cycles = 2;
        assert_eq!(
            controller.record_and_decide(&cfg, 1, 50),
            StopReason::ConfiguredCyclesReached
        );
    }

    #[test]
    fn decaying_correction_counts_eventually_stop_autocycles() {
        let mut controller = RoundController::new();
        let cfg = CorrectorConfig::default();
        let mut last = StopReason::Continue;
        let counts = [1000u64, 500, 250, 125, 60, 10];
        for (round, &count) in counts.iter().enumerate() {
            last = controller.record_and_decide(&cfg, round as u32, count);
            if last != StopReason::Continue {
                break;
            }
        }
        assert_ne!(last, StopReason::Continue);
    }
}
