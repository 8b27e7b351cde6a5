// Genome structure: the ordered chromosome list and the coordinate math
// mapping absolute offsets in the concatenated sequence back to
// chromosome-relative positions.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bio::io::fasta;

use crate::alphabet;
use crate::error::{Error, Result};

#[path = "genome_test.rs"]
mod genome_test;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    pub length: u64,
}

/// Chromosome-relative coordinates for an absolute genome position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinates<'a> {
    pub chromosome: &'a Chromosome,
    pub offset: u64,
}

/// Ordered chromosome list with prefix-sum starts. Immutable after load;
/// the prefix sum of lengths gives each chromosome's absolute start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomeStructure {
    chromosomes: Vec<Chromosome>,
    starts: Vec<u64>,
    total: u64,
}

impl GenomeStructure {
    pub fn new(chromosomes: Vec<Chromosome>) -> Self {
        let mut starts = Vec::with_capacity(chromosomes.len());
        let mut total = 0u64;
        for c in &chromosomes {
            starts.push(total);
            total += c.length;
        }
        GenomeStructure {
            chromosomes,
            starts,
            total,
        }
    }

    /// Parses chromosome names and lengths from a FASTA stream. The name is
    /// the first whitespace-delimited token of each header. Input that is
    /// not FASTA is an explicit error; empty input yields an empty
    /// structure.
    pub fn from_fasta<R: Read>(reader: R) -> Result<Self> {
        let mut chromosomes = Vec::new();
        for record in fasta::Reader::new(reader).records() {
            let record =
                record.map_err(|e| Error::Input(format!("malformed FASTA: {}", e)))?;
            chromosomes.push(Chromosome {
                name: record.id().to_string(),
                length: record.seq().len() as u64,
            });
        }
        Ok(GenomeStructure::new(chromosomes))
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.total
    }

    /// Maps an absolute position in the concatenation to `(chromosome,
    /// offset)`. Callers must stay below `total_length()`; a violation is a
    /// bug and reported as such.
    pub fn resolve_absolute(&self, position: u64) -> Result<Coordinates<'_>> {
        if position >= self.total {
            return Err(Error::Internal(format!(
                "absolute position {} outside genome of length {}",
                position, self.total
            )));
        }
        // greatest start <= position
        let idx = self.starts.partition_point(|&s| s <= position) - 1;
        Ok(Coordinates {
            chromosome: &self.chromosomes[idx],
            offset: position - self.starts[idx],
        })
    }

    /// Writes the structure as alternating name/length lines.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for c in &self.chromosomes {
            writeln!(w, "{}", c.name)?;
            writeln!(w, "{}", c.length)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut chromosomes = Vec::new();
        let mut lines = reader.lines();
        while let Some(name) = lines.next() {
            let name = name?;
            if name.is_empty() {
                break;
            }
            let length = lines.next().transpose()?.ok_or_else(|| {
                Error::Input(format!(
                    "genome structure file {} ends mid-record",
                    path.display()
                ))
            })?;
            let length = length.trim().parse::<u64>().map_err(|_| {
                Error::Input(format!(
                    "bad chromosome length {:?} in {}",
                    length,
                    path.display()
                ))
            })?;
            chromosomes.push(Chromosome { name, length });
        }
        Ok(GenomeStructure::new(chromosomes))
    }
}

/// Streams a FASTA file into its raw concatenated sequence: headers
/// stripped, bases uppercased and validated against the IUPAC alphabet.
pub fn write_raw_sequence<R: Read, W: Write>(reader: R, out: &mut W) -> Result<u64> {
    let mut written = 0u64;
    for record in fasta::Reader::new(reader).records() {
        let record = record.map_err(|e| Error::Input(format!("malformed FASTA: {}", e)))?;
        let mut seq = record.seq().to_vec();
        for b in seq.iter_mut() {
            *b = b.to_ascii_uppercase();
            // membership check only; the complement itself is discarded
            alphabet::complement(*b).map_err(|_| {
                Error::Input(format!(
                    "illegal character {:?} in sequence {}",
                    *b as char,
                    record.id()
                ))
            })?;
        }
        out.write_all(&seq)?;
        written += seq.len() as u64;
    }
    Ok(written)
}
