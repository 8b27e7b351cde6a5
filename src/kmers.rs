// Candidate guide production: the lazy stream of (sequence, PAM,
// coordinates, strand) tuples that the worker pool drains.
//
// Two sources exist: a genomic scan sliding a guide+PAM window over the raw
// concatenation, and a reader for pre-computed kmer files.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

use crate::alphabet;
use crate::error::{Error, Result};

#[path = "kmers_test.rs"]
mod kmers_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_symbol(s: &str) -> Option<Strand> {
        match s {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        })
    }
}

/// One candidate guide. `absolute_coords` is the 0-based position where the
/// guide+PAM window begins on the forward strand; for reverse-strand kmers
/// `sequence` and `pam` are already reverse-complemented into guide
/// orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kmer {
    pub sequence: String,
    pub pam: String,
    pub absolute_coords: u64,
    pub strand: Strand,
}

/// A finite, non-restartable kmer stream. Workers pull from it under the
/// producer lock.
pub trait KmerSource {
    fn next_kmer(&mut self) -> Result<Option<Kmer>>;
}

/// Slides a window of length L+P over the raw sequence. A window yields a
/// forward kmer when its tail matches the PAM pattern and a reverse kmer
/// when its head matches the pattern's reverse complement; both can fire at
/// one offset. Windows with ambiguity in the protospacer are dropped.
pub struct GenomeKmerSource {
    text: Vec<u8>,
    kmer_length: usize,
    pam: Vec<u8>,
    pam_rc: Vec<u8>,
    offset: usize,
    pending: Option<Kmer>,
}

impl GenomeKmerSource {
    pub fn new(text: Vec<u8>, kmer_length: usize, pam_pattern: &str) -> Result<Self> {
        let pam = alphabet::normalize(pam_pattern)?.into_bytes();
        if pam.is_empty() {
            return Err(Error::Input("empty PAM pattern".into()));
        }
        let pam_rc = alphabet::reverse_complement(&pam)?;
        Ok(GenomeKmerSource {
            text,
            kmer_length,
            pam,
            pam_rc,
            offset: 0,
            pending: None,
        })
    }

    fn window_len(&self) -> usize {
        self.kmer_length + self.pam.len()
    }
}

fn is_concrete(seq: &[u8]) -> bool {
    seq.iter().all(|b| b"ACGT".contains(b))
}

impl KmerSource for GenomeKmerSource {
    fn next_kmer(&mut self) -> Result<Option<Kmer>> {
        if let Some(k) = self.pending.take() {
            return Ok(Some(k));
        }

        let window_len = self.window_len();
        while self.offset + window_len <= self.text.len() {
            let start = self.offset;
            self.offset += 1;
            let window = &self.text[start..start + window_len];
            let (proto, tail) = window.split_at(self.kmer_length);
            let (head, rc_proto) = window.split_at(self.pam.len());

            let forward = if alphabet::matches_pattern(tail, &self.pam) && is_concrete(proto)
            {
                Some(Kmer {
                    sequence: String::from_utf8_lossy(proto).into_owned(),
                    pam: String::from_utf8_lossy(tail).into_owned(),
                    absolute_coords: start as u64,
                    strand: Strand::Forward,
                })
            } else {
                None
            };

            let reverse = if alphabet::matches_pattern(head, &self.pam_rc)
                && is_concrete(rc_proto)
            {
                let sequence = alphabet::reverse_complement(rc_proto)?;
                let pam = alphabet::reverse_complement(head)?;
                Some(Kmer {
                    sequence: String::from_utf8_lossy(&sequence).into_owned(),
                    pam: String::from_utf8_lossy(&pam).into_owned(),
                    absolute_coords: start as u64,
                    strand: Strand::Reverse,
                })
            } else {
                None
            };

            match (forward, reverse) {
                (Some(f), r) => {
                    self.pending = r;
                    return Ok(Some(f));
                }
                (None, Some(r)) => return Ok(Some(r)),
                (None, None) => {}
            }
        }
        Ok(None)
    }
}

/// Reads pre-computed kmers: one per line, four whitespace-separated fields
/// `sequence pam absolute_coords strand`.
pub struct FileKmerSource {
    file_name: String,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl FileKmerSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(FileKmerSource {
            file_name: path.display().to_string(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    fn malformed(&self, message: impl Into<String>) -> Error {
        Error::Format {
            file: self.file_name.clone(),
            line: self.line_number,
            message: message.into(),
        }
    }

    fn parse_line(&self, line: &str) -> Result<Kmer> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(self.malformed(format!("expected 4 fields, got {}", fields.len())));
        }
        let sequence = alphabet::normalize(fields[0])
            .map_err(|e| self.malformed(e.to_string()))?;
        if !is_concrete(sequence.as_bytes()) {
            return Err(self.malformed("guide sequence must consist of A/C/G/T"));
        }
        let pam = alphabet::normalize(fields[1]).map_err(|e| self.malformed(e.to_string()))?;
        let absolute_coords = fields[2]
            .parse::<u64>()
            .map_err(|_| self.malformed(format!("bad coordinate {:?}", fields[2])))?;
        let strand = Strand::from_symbol(fields[3])
            .ok_or_else(|| self.malformed(format!("bad strand {:?}", fields[3])))?;
        Ok(Kmer {
            sequence,
            pam,
            absolute_coords,
            strand,
        })
    }
}

impl KmerSource for FileKmerSource {
    fn next_kmer(&mut self) -> Result<Option<Kmer>> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line?,
                None => return Ok(None),
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return self.parse_line(&line).map(Some);
        }
    }
}

/// Drains a source into the four-field text format; returns the kmer count.
pub fn write_kmers<W: Write>(source: &mut dyn KmerSource, out: &mut W) -> Result<u64> {
    let mut written = 0u64;
    while let Some(k) = source.next_kmer()? {
        writeln!(
            out,
            "{} {} {} {}",
            k.sequence, k.pam, k.absolute_coords, k.strand
        )?;
        written += 1;
    }
    Ok(written)
}
