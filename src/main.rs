//! Command-line front end: parses the full flag surface,
//! reads FASTA/FASTQ, drives [`qcorrect::corrector::Corrector`], and writes
//! corrected reads back out, optionally tagging each with a correction log.

use clap::Parser;
use qcorrect::config::{CorrectorConfig, CutoffMethod};
use qcorrect::corrector::Corrector;
use qcorrect::fasta;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// A parallel, suffix-tree-guided, indel-aware short-read error corrector.
#[derive(Parser, Debug)]
#[command(name = "qcorrect", version = qcorrect::VERSION, about)]
struct Cli {
    /// Input FASTA/FASTQ file; reads from stdin when omitted.
    input: Option<PathBuf>,

    /// Output path; writes to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Estimated genome length in bases, used for auto level detection and
    /// the statistical cutoff tables.
    #[arg(long, default_value_t = 0.0)]
    genome_length: f64,

    /// Expected per-base sequencing error rate.
    #[arg(long, default_value_t = 0.01)]
    error_rate: f64,

    /// Per-base mismatch rate tolerated while extending an overlap.
    #[arg(long, default_value_t = 0.02)]
    overlap_error_rate: f64,

    /// Strictness parameter, interpreted per `--method`.
    #[arg(long, default_value_t = 0.0001)]
    strictness: f64,

    /// Cutoff method: classifier, control_fp, control_fn, expected, count.
    #[arg(long, default_value = "classifier")]
    method: String,

    /// Lower suffix-tree traversal depth. 0 means auto.
    #[arg(long, default_value_t = 0)]
    from_level: u32,

    /// Upper suffix-tree traversal depth. 0 means auto.
    #[arg(long, default_value_t = 0)]
    to_level: u32,

    /// Test every Nth depth level rather than every level.
    #[arg(long, default_value_t = 1)]
    depth_sample_rate: u32,

    /// Fraction of the most abundant q-gram buckets to mask as repetitive.
    #[arg(long, default_value_t = 0.05)]
    kmer_abundance_cutoff: f64,

    /// Maximum indel length considered during overlap extension, 0..=4.
    #[arg(long, default_value_t = 1)]
    max_indel_length: i32,

    /// Number of correction rounds. 0 means auto via the round controller.
    #[arg(long, default_value_t = 0)]
    cycles: u32,

    /// Maximum corrections per read, as a fraction of read length.
    #[arg(long, default_value_t = 0.5)]
    relative_errors_to_correct: f64,

    /// Weight of the random-match term in the overlap-sum cutoff, in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    wovsum: f64,

    /// Q-gram length for bucketing suffixes.
    #[arg(long, default_value_t = 10)]
    q: usize,

    /// Worker thread count.
    #[arg(long, default_value_t = 1)]
    num_threads: usize,

    /// Treat `N` as a wildcard matching any base during overlap extension.
    #[arg(long)]
    match_n: bool,

    /// Strip leading/trailing N runs from corrected reads on output.
    #[arg(long, default_value_t = true)]
    trim_ns_on_output: bool,

    /// Cap the number of corrections a read may receive within one round.
    #[arg(long, default_value_t = true)]
    limit_corr_per_round: bool,

    /// Append a machine-readable correction log to each read's id line.
    #[arg(long)]
    append_correction_info: bool,

    /// Verbosity level; repeat for more detail (unused beyond 0/1/2 today).
    #[arg(short, long, default_value_t = 0)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> CorrectorConfig {
        CorrectorConfig {
            genome_length: self.genome_length,
            error_rate: self.error_rate,
            overlap_error_rate: self.overlap_error_rate,
            strictness: self.strictness,
            method: CutoffMethod::from_name(&self.method),
            from_level: self.from_level,
            to_level: self.to_level,
            depth_sample_rate: self.depth_sample_rate.max(1),
            kmer_abundance_cutoff: self.kmer_abundance_cutoff,
            max_indel_length: self.max_indel_length,
            cycles: self.cycles,
            relative_errors_to_correct: self.relative_errors_to_correct,
            wovsum: self.wovsum,
            packages_per_thread: 4,
            num_threads: self.num_threads.max(1),
            match_n: self.match_n,
            trim_ns_on_output: self.trim_ns_on_output,
            limit_corr_per_round: self.limit_corr_per_round,
            append_correction_info: self.append_correction_info,
            q: self.q,
            verbosity: self.verbose,
            degenerate_fallback_count: 2,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("qcorrect: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.to_config();
    config.validate()?;

    let records = read_input(cli.input.as_ref())?;
    let original_lengths: Vec<usize> = records.iter().map(|r| r.sequence.len()).collect();
    let input: Vec<(String, Vec<u8>)> = records.iter().map(|r| (r.id.clone(), r.sequence.clone())).collect();

    let mut corrector = Corrector::new(input, config.clone())?;
    let report = corrector.run()?;
    if config.verbosity > 0 {
        eprintln!(
            "qcorrect: {} rounds, stop reason {:?}, corrections/round {:?}",
            report.rounds_run, report.stop_reason, report.corrections_per_round
        );
    }

    let tags: Vec<Vec<String>> = if config.append_correction_info {
        (0..corrector.reads().len() as u32)
            .map(|id| corrector.correction_tags(id).to_vec())
            .collect()
    } else {
        Vec::new()
    };

    let corrected = corrector.into_records();
    let out_records: Vec<fasta::FastaRecord> = corrected
        .into_iter()
        .zip(records.into_iter())
        .zip(original_lengths)
        .enumerate()
        .map(|(i, (((id, mut seq), original), original_len))| {
            if config.trim_ns_on_output {
                seq = fasta::trim_ns(&seq).to_vec();
            }
            let quality = if seq.len() == original_len { original.quality } else { None };
            let id = if config.append_correction_info && !tags.is_empty() && !tags[i].is_empty() {
                format!("{id} corrected:\t{}", tags[i].join("\t"))
            } else {
                id
            };
            fasta::FastaRecord {
                id,
                sequence: seq,
                quality,
            }
        })
        .collect();

    write_output(cli.output.as_ref(), &out_records)
}

fn read_input(path: Option<&PathBuf>) -> io::Result<Vec<fasta::FastaRecord>> {
    match path {
        Some(p) => fasta::read_records(BufReader::new(File::open(p)?)),
        None => fasta::read_records(io::stdin().lock()),
    }
}

fn write_output(path: Option<&PathBuf>, records: &[fasta::FastaRecord]) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let mut writer = BufWriter::new(File::create(p)?);
            fasta::write_records(&mut writer, records)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            fasta::write_records(&mut writer, records)?;
            writer.flush()?;
        }
    }
    Ok(())
}
