//! Q-gram index (C3): partitions read suffixes into buckets keyed by their
//! first `q` characters, masking homopolymer, N-containing, and
//! high-abundance buckets.

use crate::reads::ReadStore;
use rustc_hash::FxHashMap;

/// A suffix-array entry: a specific (read, offset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixEntry {
    pub read_id: u32,
    pub offset: u32,
}

/// One q-gram bucket: a contiguous range of suffix-array entries sharing
/// the same q-gram prefix code. `enabled = false` marks a masked bucket
/// (homopolymer, N-containing, or in the top abundance fraction).
#[derive(Debug, Clone)]
pub struct Bucket {
    pub code: u64,
    pub start: usize,
    pub end: usize,
    pub enabled: bool,
}

impl Bucket {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Two-pass q-gram suffix array: count occurrences per bucket, then
/// scatter suffixes into bucket slots.
pub struct QgramIndex {
    pub q: usize,
    /// Flat, bucket-ordered suffix-array entries.
    pub entries: Vec<SuffixEntry>,
    /// Buckets, in ascending code order (disjoint ranges over `entries`).
    pub buckets: Vec<Bucket>,
}

/// Pack `q` consecutive bases into a 2-bit-per-base code, or `None` if the
/// window contains an `N` or runs past the end of the read.
#[inline]
fn fingerprint(seq: &[u8], offset: usize, q: usize) -> Option<u64> {
    if offset + q > seq.len() {
        return None;
    }
    let mut code = 0u64;
    for &b in &seq[offset..offset + q] {
        let bits = match b {
            b'A' => 0u64,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => return None,
        };
        code = (code << 2) | bits;
    }
    Some(code)
}

/// Is a q-gram code a homopolymer (all bases identical)?
#[inline]
fn is_homopolymer_code(code: u64, q: usize) -> bool {
    let base = code & 0b11;
    for i in 1..q {
        if (code >> (2 * i)) & 0b11 != base {
            return false;
        }
    }
    true
}

impl QgramIndex {
    /// Build the index over every suffix of every strand in `reads`
    /// (forward and reverse-complement ids both participate, matching the
    /// spec's `[0, 2R)` id space).
    pub fn build(reads: &ReadStore, q: usize, abundance_cutoff: f64) -> Self {
        let total_ids = 2 * reads.len() as u32;

        // Pass 1: count occurrences per bucket code.
        let mut counts: FxHashMap<u64, usize> = FxHashMap::default();
        for id in 0..total_ids {
            let seq = reads.sequence(id);
            for offset in 0..seq.len() {
                if let Some(code) = fingerprint(seq, offset, q) {
                    *counts.entry(code).or_insert(0) += 1;
                }
            }
        }

        // Stable bucket order: ascending code, each given a contiguous slice.
        let mut codes: Vec<u64> = counts.keys().copied().collect();
        codes.sort_unstable();
        let mut bucket_start = FxHashMap::default();
        let mut cursor = 0usize;
        let mut buckets = Vec::with_capacity(codes.len());
        for &code in &codes {
            let count = counts[&code];
            bucket_start.insert(code, cursor);
            buckets.push(Bucket {
                code,
                start: cursor,
                end: cursor + count,
                enabled: !is_homopolymer_code(code, q),
            });
            cursor += count;
        }

        // Pass 2: scatter suffixes into their bucket slot.
        let mut entries = vec![SuffixEntry { read_id: 0, offset: 0 }; cursor];
        let mut write_cursor = bucket_start;
        for id in 0..total_ids {
            let seq = reads.sequence(id);
            for offset in 0..seq.len() {
                if let Some(code) = fingerprint(seq, offset, q) {
                    let slot = write_cursor.get_mut(&code).unwrap();
                    entries[*slot] = SuffixEntry {
                        read_id: id,
                        offset: offset as u32,
                    };
                    *slot += 1;
                }
            }
        }

        mask_abundant_buckets(&mut buckets, abundance_cutoff);

        Self { q, entries, buckets }
    }

    /// Bucket ranges sorted by descending size — the scheduling order C9
    /// hands to worker threads ("largest first" to keep stragglers small).
    pub fn buckets_by_descending_size(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.buckets.len())
            .filter(|&i| self.buckets[i].enabled && !self.buckets[i].is_empty())
            .collect();
        order.sort_unstable_by(|&a, &b| self.buckets[b].len().cmp(&self.buckets[a].len()));
        order
    }

    #[inline]
    pub fn bucket_entries(&self, bucket_idx: usize) -> &[SuffixEntry] {
        let b = &self.buckets[bucket_idx];
        &self.entries[b.start..b.end]
    }

    pub fn total_suffixes(&self) -> usize {
        self.entries.len()
    }
}

/// Disable the top `cutoff` fraction of buckets by descending size
/// (default 1% for 454-style data, 5% for Illumina-style — left to the
/// caller via `cutoff`).
fn mask_abundant_buckets(buckets: &mut [Bucket], cutoff: f64) {
    if cutoff <= 0.0 || buckets.is_empty() {
        return;
    }
    let mut sizes: Vec<usize> = buckets.iter().filter(|b| b.enabled).map(|b| b.len()).collect();
    if sizes.is_empty() {
        return;
    }
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    let num_masked = ((sizes.len() as f64 * cutoff).ceil() as usize).min(sizes.len());
    if num_masked == 0 {
        return;
    }
    let threshold = sizes[num_masked - 1];
    for bucket in buckets.iter_mut() {
        if bucket.enabled && bucket.len() >= threshold {
            bucket.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::ReadStore;

    fn store() -> ReadStore {
        ReadStore::new(vec![
            ("r0".into(), b"ACGTACGTACGTACGT".to_vec()),
            ("r1".into(), b"ACGTACGTACGTACGA".to_vec()),
        ])
    }

    #[test]
    fn build_partitions_all_suffixes() {
        let store = store();
        let index = QgramIndex::build(&store, 4, 0.0);
        let total: usize = index.buckets.iter().map(|b| b.len()).sum();
        assert_eq!(total, index.entries.len());
    }

    #[test]
    fn homopolymer_buckets_are_disabled() {
        let store = ReadStore::new(vec![("r0".into(), b"AAAAAAAAAAAA".to_vec())]);
        let index = QgramIndex::build(&store, 4, 0.0);
        assert!(index.buckets.iter().all(|b| !b.enabled));
    }

    #[test]
    fn n_containing_windows_are_excluded() {
        let store = ReadStore::new(vec![("r0".into(), b"ACGTNACGTACGT".to_vec())]);
        let index = QgramIndex::build(&store, 4, 0.0);
        let covered: usize = index.buckets.iter().map(|b| b.len()).sum();
        // fewer suffixes than total positions because N-spanning windows are dropped
        assert!(covered < store.sequence(0).len() * 2);
    }

    #[test]
    fn abundance_cutoff_masks_largest_buckets() {
        let store = store();
        let index = QgramIndex::build(&store, 4, 0.5);
        assert!(index.buckets.iter().any(|b| !b.enabled));
    }
}
