//! Minimal FASTA/FASTQ reader and writer for `main.rs`. Deliberately thin:
//! the core engine in [`crate::corrector`] never touches file formats, only
//! `(name, sequence)` pairs.

use std::io::{self, BufRead, Write};

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub sequence: Vec<u8>,
    /// Present only when the source was FASTQ; carried through untouched
    /// and re-emitted on corrected reads of the same length. Records whose
    /// length changed (an indel was applied) drop their quality string.
    pub quality: Option<Vec<u8>>,
}

/// Reads either FASTA (`>`) or FASTQ (`@`) records from `reader`, sniffing
/// the format from the first non-empty line.
pub fn read_records(reader: impl BufRead) -> io::Result<Vec<FastaRecord>> {
    let mut lines = reader.lines();
    let mut records = Vec::new();

    let Some(first) = lines.next().transpose()? else {
        return Ok(records);
    };
    if first.starts_with('@') {
        let mut header = Some(first);
        loop {
            let Some(h) = header.take() else { break };
            let id = h.trim_start_matches('@').to_string();
            let seq = match lines.next().transpose()? {
                Some(l) => l.into_bytes(),
                None => break,
            };
            let _plus = lines.next().transpose()?;
            let qual = lines.next().transpose()?.map(|l| l.into_bytes());
            records.push(FastaRecord {
                id,
                sequence: seq,
                quality: qual,
            });
            header = lines.next().transpose()?;
        }
    } else if first.starts_with('>') {
        let mut id = first.trim_start_matches('>').to_string();
        let mut seq: Vec<u8> = Vec::new();
        for line in lines {
            let line = line?;
            if let Some(next_id) = line.strip_prefix('>') {
                records.push(FastaRecord {
                    id: std::mem::replace(&mut id, next_id.to_string()),
                    sequence: std::mem::take(&mut seq),
                    quality: None,
                });
            } else {
                seq.extend_from_slice(line.as_bytes());
            }
        }
        records.push(FastaRecord {
            id,
            sequence: seq,
            quality: None,
        });
    }

    Ok(records)
}

/// Writes records back out, FASTQ if a record carries a quality string,
/// FASTA otherwise. Mixed input (FASTA in, or an indel dropped a quality
/// string) degrades that single record to FASTA-only lines.
pub fn write_records(mut writer: impl Write, records: &[FastaRecord]) -> io::Result<()> {
    for record in records {
        match &record.quality {
            Some(qual) if qual.len() == record.sequence.len() => {
                writeln!(writer, "@{}", record.id)?;
                writer.write_all(&record.sequence)?;
                writeln!(writer)?;
                writeln!(writer, "+")?;
                writer.write_all(qual)?;
                writeln!(writer)?;
            }
            _ => {
                writeln!(writer, ">{}", record.id)?;
                writer.write_all(&record.sequence)?;
                writeln!(writer)?;
            }
        }
    }
    Ok(())
}

/// Replaces any trailing run of `N` bases with nothing, and any leading run
/// likewise.
pub fn trim_ns(seq: &[u8]) -> &[u8] {
    let start = seq.iter().position(|&b| b != b'N').unwrap_or(seq.len());
    let end = seq.iter().rposition(|&b| b != b'N').map(|i| i + 1).unwrap_or(0);
    if start >= end {
        &[]
    } else {
        &seq[start..end]
    }
}
