//! End-to-end correction scenarios (S1-S6), driven entirely through the
//! public `Corrector` API plus the `fasta` module for the on-disk round
//! trip.

use qcorrect::config::{CorrectorConfig, CutoffMethod};
use qcorrect::corrector::Corrector;
use qcorrect::fasta;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io::{Seek, SeekFrom};

fn monomer(len: usize) -> Vec<u8> {
    (0..len).map(|i| b"ACGT"[i % 4]).collect()
}

fn working_config() -> CorrectorConfig {
    let mut cfg = CorrectorConfig::default();
    cfg.genome_length = 1000.0;
    cfg.method = CutoffMethod::Count;
    cfg.strictness = 3.0;
    cfg.q = 8;
    cfg.wovsum = 0.0;
    cfg.error_rate = 0.3;
    cfg
}

// S1: a single minority substitution is restored to the majority base.
#[test]
fn s1_minority_substitution_is_restored_to_majority() {
    let base = monomer(50);
    let mut records = Vec::new();
    for i in 0..100 {
        records.push((format!("r{i}"), base.clone()));
    }
    let mut variant = base.clone();
    let original_base = variant[25];
    variant[25] = if original_base == b'G' { b'T' } else { b'G' };
    records.push(("variant".into(), variant));

    let mut corrector = Corrector::new(records, working_config()).unwrap();
    corrector.run().unwrap();
    let out = corrector.into_records();

    let (_, corrected) = out.iter().find(|(name, _)| name == "variant").unwrap();
    assert_eq!(corrected, &base, "variant should be restored to the majority sequence");
    for (name, seq) in out.iter().filter(|(name, _)| name != "variant") {
        assert_eq!(seq, &base, "unaffected read {name} should be untouched");
    }
}

// S2: two populations drawn from disjoint alphabets share no 10-mer, so
// round 1 proposes nothing and the controller stops at its floor.
#[test]
fn s2_unrelated_populations_receive_zero_corrections() {
    let mut rng = SmallRng::seed_from_u64(42);
    let pop_a_base: Vec<u8> = (0..30).map(|_| if rng.gen_bool(0.5) { b'A' } else { b'C' }).collect();
    let pop_b_base: Vec<u8> = (0..30).map(|_| if rng.gen_bool(0.5) { b'G' } else { b'T' }).collect();

    let mut records = Vec::new();
    for i in 0..200 {
        records.push((format!("a{i}"), pop_a_base.clone()));
    }
    for i in 0..200 {
        records.push((format!("b{i}"), pop_b_base.clone()));
    }

    let mut cfg = working_config();
    cfg.num_threads = 2;
    let mut corrector = Corrector::new(records.clone(), cfg).unwrap();
    let report = corrector.run().unwrap();

    assert_eq!(report.corrections_per_round.iter().sum::<u64>(), 0);
    assert!(report.rounds_run >= 1);
    let out = corrector.into_records();
    for ((_, before), (_, after)) in records.iter().zip(out.iter()) {
        assert_eq!(before, after);
    }
}

// S3: a minority read with an inserted base is shrunk back down.
#[test]
fn s3_inserted_base_is_removed() {
    let base = monomer(50);
    let mut records = Vec::new();
    for i in 0..50 {
        records.push((format!("r{i}"), base.clone()));
    }
    let mut variant = base.clone();
    variant.insert(10, b'A');
    records.push(("variant".into(), variant));

    let mut cfg = working_config();
    cfg.max_indel_length = 1;
    let mut corrector = Corrector::new(records, cfg).unwrap();
    corrector.run().unwrap();
    let out = corrector.into_records();

    let (_, corrected) = out.iter().find(|(name, _)| name == "variant").unwrap();
    assert_eq!(corrected.len(), base.len(), "the inserted base should be removed");
}

// S4: a minority read with a deletion is grown back to the majority length.
#[test]
fn s4_deleted_base_is_restored() {
    let base = monomer(50);
    let mut records = Vec::new();
    for i in 0..50 {
        records.push((format!("r{i}"), base.clone()));
    }
    let mut variant = base.clone();
    variant.remove(20);
    records.push(("variant".into(), variant));

    let mut cfg = working_config();
    cfg.max_indel_length = 1;
    let mut corrector = Corrector::new(records, cfg).unwrap();
    corrector.run().unwrap();
    let out = corrector.into_records();

    let (_, corrected) = out.iter().find(|(name, _)| name == "variant").unwrap();
    assert_eq!(corrected.len(), base.len(), "the deleted base should be restored");
}

// S5: an all-N read family carries no information and is left untouched.
#[test]
fn s5_all_n_reads_are_unchanged() {
    let records: Vec<(String, Vec<u8>)> = (0..100)
        .map(|i| (format!("r{i}"), vec![qcorrect::reads::BASE_N; 20]))
        .collect();

    let mut cfg = working_config();
    cfg.match_n = true;
    let mut corrector = Corrector::new(records.clone(), cfg).unwrap();
    let report = corrector.run().unwrap();

    assert_eq!(report.corrections_per_round.iter().sum::<u64>(), 0);
    let out = corrector.into_records();
    for ((_, before), (_, after)) in records.iter().zip(out.iter()) {
        assert_eq!(before, after);
    }
}

// S6: an N is substituted with the column consensus even though its
// overlap sum would fall below the ordinary cutoff.
#[test]
fn s6_n_is_corrected_to_column_consensus() {
    let base = monomer(50);
    let mut records = Vec::new();
    for i in 0..30 {
        records.push((format!("r{i}"), base.clone()));
    }
    let mut variant = base.clone();
    variant[7] = qcorrect::reads::BASE_N;
    records.push(("variant".into(), variant));

    let mut cfg = working_config();
    cfg.match_n = true;
    let mut corrector = Corrector::new(records, cfg).unwrap();
    corrector.run().unwrap();
    let out = corrector.into_records();

    let (_, corrected) = out.iter().find(|(name, _)| name == "variant").unwrap();
    assert_eq!(corrected[7], base[7]);
}

// Round trip a FASTA fixture through a real file on disk, including
// `appendCorrectionInfo`-style id tagging built on top of the public API
// (mirrors what `main.rs` does with the tags `Corrector` hands back).
#[test]
fn fasta_fixture_round_trips_through_a_temp_file() {
    let base = monomer(40);
    let mut input = tempfile::NamedTempFile::new().unwrap();
    {
        use std::io::Write;
        for i in 0..40 {
            writeln!(input, ">r{i}").unwrap();
            writeln!(input, "{}", String::from_utf8(base.clone()).unwrap()).unwrap();
        }
        let mut variant = base.clone();
        variant[12] = if variant[12] == b'G' { b'T' } else { b'G' };
        writeln!(input, ">variant").unwrap();
        writeln!(input, "{}", String::from_utf8(variant).unwrap()).unwrap();
    }
    input.as_file_mut().seek(SeekFrom::Start(0)).unwrap();

    let records = fasta::read_records(std::io::BufReader::new(input.reopen().unwrap())).unwrap();
    assert_eq!(records.len(), 41);

    let mut cfg = working_config();
    cfg.append_correction_info = true;
    let forward: Vec<(String, Vec<u8>)> = records.iter().map(|r| (r.id.clone(), r.sequence.clone())).collect();
    let variant_id = forward.iter().position(|(name, _)| name == "variant").unwrap() as u32;

    let mut corrector = Corrector::new(forward, cfg).unwrap();
    corrector.run().unwrap();
    let tags = corrector.correction_tags(variant_id).to_vec();
    let corrected = corrector.into_records();

    let out_records: Vec<fasta::FastaRecord> = corrected
        .into_iter()
        .map(|(id, sequence)| fasta::FastaRecord {
            id,
            sequence,
            quality: None,
        })
        .collect();

    let mut output = tempfile::NamedTempFile::new().unwrap();
    fasta::write_records(&mut output, &out_records).unwrap();
    output.as_file_mut().seek(SeekFrom::Start(0)).unwrap();
    let round_tripped = fasta::read_records(std::io::BufReader::new(output.reopen().unwrap())).unwrap();

    assert_eq!(round_tripped.len(), out_records.len());
    assert!(!tags.is_empty(), "the variant read should carry at least one correction tag");
}
