//! A parallel, suffix-tree-guided, indel-aware read error corrector.
//!
//! The pipeline runs in rounds. Each round rebuilds a statistical model of
//! expected k-mer coverage ([`stats`]), partitions read suffixes into
//! q-gram buckets ([`qgram`]), walks each bucket's implicit suffix tree
//! looking for minority variants ([`suffix_walk`]), scores each candidate
//! correction by overlap-extension against its correct siblings
//! ([`overlap`]), collects proposals into a shared, lock-coordinated list
//! ([`corrections`]), and finally applies the accepted ones back onto the
//! reads ([`apply`]). [`rounds`] decides when to stop; [`parallel`]
//! schedules buckets across worker threads; [`corrector`] drives the whole
//! loop.

pub mod apply;
pub mod budget;
pub mod config;
pub mod corrections;
pub mod corrector;
pub mod error;
pub mod fasta;
pub mod overlap;
pub mod parallel;
pub mod qgram;
pub mod reads;
pub mod rounds;
pub mod stats;
pub mod suffix_walk;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::config::{CorrectorConfig, CutoffMethod};
    pub use crate::corrector::{CorrectionReport, Corrector};
    pub use crate::error::{CorrectorError, Result};
}
