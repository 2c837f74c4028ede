//! Parallel executor (C9): schedules q-gram buckets to worker threads over
//! an explicit MPMC queue, largest bucket first, each worker running the
//! walker (C4) and scorer (C5) against the one shared correction list.

use crate::budget::Budget;
use crate::corrections::CorrectionList;
use crate::overlap::score_node;
use crate::qgram::QgramIndex;
use crate::reads::ReadStore;
use crate::stats::StatisticalModel;
use crate::suffix_walk::walk_bucket;
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutorStats {
    pub buckets_processed: u64,
    pub investigated_nodes: u64,
    pub emitted_nodes: u64,
    pub corrections_emitted: u64,
}

/// Run every enabled, non-empty bucket of `index` across `num_threads`
/// workers, each pulling one bucket at a time from a bounded channel. At
/// `verbosity >= 2`, prints a per-bucket-queue timing and counter summary
/// to stderr once the round finishes.
#[allow(clippy::too_many_arguments)]
pub fn run_round(
    store: &ReadStore,
    model: &StatisticalModel,
    index: &QgramIndex,
    budget: &Budget,
    corrections: &CorrectionList,
    num_threads: usize,
    depth_sample_rate: u32,
    round: u32,
    max_indel_length: i32,
    overlap_error_rate: f64,
    verbosity: u8,
) -> ExecutorStats {
    let order = index.buckets_by_descending_size();
    if order.is_empty() {
        return ExecutorStats::default();
    }

    let (tx, rx) = bounded::<usize>(order.len());
    for bucket_idx in order {
        tx.send(bucket_idx).expect("queue sized to hold every bucket");
    }
    drop_sender(tx);

    let buckets_processed = AtomicU64::new(0);
    let investigated = AtomicU64::new(0);
    let emitted = AtomicU64::new(0);
    let corrections_emitted = AtomicU64::new(0);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .expect("thread pool sized by validated config.num_threads");

    pool.scope(|scope| {
        for _ in 0..num_threads.max(1) {
            let rx = rx.clone();
            scope.spawn(|_| {
                while let Ok(bucket_idx) = rx.recv() {
                    let entries = index.bucket_entries(bucket_idx).to_vec();
                    let stats = walk_bucket(
                        store,
                        model,
                        &entries,
                        index.q,
                        model.kmin,
                        model.kmax,
                        depth_sample_rate,
                        round,
                        |node| {
                            let l = node.l;
                            let scored = score_node(
                                store,
                                model,
                                budget,
                                corrections,
                                &node,
                                l,
                                max_indel_length,
                                overlap_error_rate,
                            );
                            corrections_emitted.fetch_add(scored.corrections_emitted, Ordering::Relaxed);
                        },
                    );
                    investigated.fetch_add(stats.investigated_nodes, Ordering::Relaxed);
                    emitted.fetch_add(stats.emitted_nodes, Ordering::Relaxed);
                    buckets_processed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    let stats = ExecutorStats {
        buckets_processed: buckets_processed.load(Ordering::Relaxed),
        investigated_nodes: investigated.load(Ordering::Relaxed),
        emitted_nodes: emitted.load(Ordering::Relaxed),
        corrections_emitted: corrections_emitted.load(Ordering::Relaxed),
    };
    if verbosity >= 2 {
        eprintln!(
            "qcorrect: round {round}: {} buckets, {} nodes investigated, {} emitted, {} corrections proposed",
            stats.buckets_processed, stats.investigated_nodes, stats.emitted_nodes, stats.corrections_emitted
        );
    }
    stats
}

/// Dropping the sender after pre-filling the queue lets every worker's
/// `recv` return `Err` once the queue drains, ending the scope cleanly.
fn drop_sender(tx: Sender<usize>) {
    drop(tx);
}
