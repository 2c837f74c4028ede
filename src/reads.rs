//! Read store (C1): owns read sequences and their reverse complements as
//! one addressable collection, assigns each read a stable numeric id.

/// Base alphabet. `N` denotes "unknown".
pub const BASE_A: u8 = b'A';
pub const BASE_C: u8 = b'C';
pub const BASE_G: u8 = b'G';
pub const BASE_T: u8 = b'T';
pub const BASE_N: u8 = b'N';

#[inline]
pub fn is_known_base(b: u8) -> bool {
    matches!(b, BASE_A | BASE_C | BASE_G | BASE_T)
}

/// Compares two bases for the overlap-extension scorer: identical bases
/// always match; when `matchN` is enabled an `N` on either side matches
/// any base.
#[inline]
pub fn bases_match(a: u8, b: u8) -> bool {
    a == b || (crate::config::match_n() && (a == BASE_N || b == BASE_N))
}

#[inline]
fn complement(b: u8) -> u8 {
    match b {
        BASE_A => BASE_T,
        BASE_C => BASE_G,
        BASE_G => BASE_C,
        BASE_T => BASE_A,
        _ => BASE_N,
    }
}

#[inline]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Owns two parallel address ranges: original reads `[0, R)` and their
/// reverse complements `[R, 2R)`. Ids are stable across rounds; sequences
/// are mutable only through [`ReadStore::apply_forward_sequence`], which is
/// called exclusively from the apply phase (C7) between rounds, never while
/// workers are traversing.
#[derive(Debug, Clone)]
pub struct ReadStore {
    /// Original (forward) read sequences, indexed by id in `[0, R)`.
    forward: Vec<Vec<u8>>,
    /// Caller-supplied read identifiers (opaque to the core, preserved verbatim).
    names: Vec<String>,
    /// Reverse complements, rebuilt whenever `forward` changes.
    reverse: Vec<Vec<u8>>,
}

impl ReadStore {
    /// Build a store from a collection of (name, sequence) pairs.
    pub fn new(records: Vec<(String, Vec<u8>)>) -> Self {
        let (names, forward): (Vec<_>, Vec<_>) = records.into_iter().unzip();
        let reverse = forward.iter().map(|s| reverse_complement(s)).collect();
        Self {
            forward,
            names,
            reverse,
        }
    }

    /// Number of original reads (`R`). Total addressable ids are `2 * len()`.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    #[inline]
    pub fn name(&self, forward_id: u32) -> &str {
        &self.names[forward_id as usize]
    }

    /// Is `id` a reverse-strand id (`id >= R`)?
    #[inline]
    pub fn is_reverse(&self, id: u32) -> bool {
        id as usize >= self.forward.len()
    }

    /// Map any id (forward or reverse) to its forward-strand id.
    #[inline]
    pub fn forward_id(&self, id: u32) -> u32 {
        if self.is_reverse(id) {
            id - self.forward.len() as u32
        } else {
            id
        }
    }

    /// Map a forward-strand id to the id of its reverse complement.
    #[inline]
    pub fn reverse_id(&self, forward_id: u32) -> u32 {
        forward_id + self.forward.len() as u32
    }

    /// Sequence addressed by `id`, whichever strand it denotes.
    #[inline]
    pub fn sequence(&self, id: u32) -> &[u8] {
        if self.is_reverse(id) {
            &self.reverse[self.forward_id(id) as usize]
        } else {
            &self.forward[id as usize]
        }
    }

    #[inline]
    pub fn length(&self, id: u32) -> usize {
        self.sequence(id).len()
    }

    /// Mirror a position on one strand to the equivalent position on the
    /// other, accounting for the width of an indel correction.
    #[inline]
    pub fn mirror_position(&self, forward_id: u32, pos: usize, indel_len: i32) -> usize {
        let len = self.forward[forward_id as usize].len();
        let width = indel_len.unsigned_abs() as usize;
        let trailing = if indel_len == 0 { 1 } else { 0 };
        len.saturating_sub(pos).saturating_sub(width).saturating_sub(trailing)
    }

    /// All forward ids, for iteration in apply/report phases.
    #[inline]
    pub fn forward_ids(&self) -> impl Iterator<Item = u32> {
        0..self.forward.len() as u32
    }

    /// Replace a forward read's sequence (C7 only) and refresh its reverse
    /// complement cache. Asserts on out-of-range ids: an out-of-range id is
    /// a programming error.
    pub fn apply_forward_sequence(&mut self, forward_id: u32, new_seq: Vec<u8>) {
        let idx = forward_id as usize;
        assert!(idx < self.forward.len(), "read id {forward_id} out of range");
        self.reverse[idx] = reverse_complement(&new_seq);
        self.forward[idx] = new_seq;
    }

    /// Read-length histogram over forward reads, keyed by length.
    pub fn length_histogram(&self) -> rustc_hash::FxHashMap<usize, u64> {
        let mut hist = rustc_hash::FxHashMap::default();
        for read in &self.forward {
            *hist.entry(read.len()).or_insert(0u64) += 1;
        }
        hist
    }

    pub fn max_length(&self) -> usize {
        self.forward.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn into_records(self) -> Vec<(String, Vec<u8>)> {
        self.names.into_iter().zip(self.forward).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bases_match_respects_the_match_n_toggle() {
        crate::config::set_match_n(false);
        assert!(bases_match(b'A', b'A'));
        assert!(!bases_match(b'A', BASE_N));
        assert!(!bases_match(BASE_N, b'A'));

        crate::config::set_match_n(true);
        assert!(bases_match(b'A', BASE_N));
        assert!(bases_match(BASE_N, b'A'));
        assert!(!bases_match(b'A', b'C'));
        crate::config::set_match_n(false);
    }

    #[test]
    fn reverse_complement_mirrors_bases() {
        assert_eq!(reverse_complement(b"ACGT"), b"ACGT");
        assert_eq!(reverse_complement(b"AACG"), b"CGTT");
        assert_eq!(reverse_complement(b"AANG"), b"CNTT");
    }

    #[test]
    fn strand_mapping_round_trips() {
        let store = ReadStore::new(vec![
            ("r0".into(), b"ACGTACGT".to_vec()),
            ("r1".into(), b"TTTT".to_vec()),
        ]);
        assert_eq!(store.forward_id(0), 0);
        assert_eq!(store.forward_id(2), 0);
        assert_eq!(store.forward_id(3), 1);
        assert!(!store.is_reverse(1));
        assert!(store.is_reverse(2));
        assert_eq!(store.reverse_id(1), 3);
        assert_eq!(store.sequence(2), reverse_complement(b"ACGTACGT"));
    }

    #[test]
    fn apply_forward_sequence_refreshes_reverse_cache() {
        let mut store = ReadStore::new(vec![("r0".into(), b"ACGT".to_vec())]);
        store.apply_forward_sequence(0, b"AAAA".to_vec());
        assert_eq!(store.sequence(0), b"AAAA");
        assert_eq!(store.sequence(1), b"TTTT");
    }

    #[test]
    fn empty_reads_are_permitted() {
        let store = ReadStore::new(vec![("empty".into(), Vec::new())]);
        assert_eq!(store.length(0), 0);
        assert_eq!(store.length_histogram().get(&0), Some(&1));
    }
}
