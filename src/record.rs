// Output record formatting: a SAM-style header followed by one line per
// guide carrying the resolved coordinates and the encoded off-target table.

use std::io::{self, Write};

use crate::genome::{Coordinates, GenomeStructure};
use crate::kmers::{Kmer, Strand};

#[path = "record_test.rs"]
mod record_test;

const SAM_FLAG_REVERSE: u32 = 16;

/// A resolved off-target site on the forward-strand coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OffTarget {
    pub position: u64,
    pub strand: Strand,
}

/// Off-target sites grouped by exact mismatch count; index = distance.
pub type OffTargetTable = Vec<Vec<OffTarget>>;

pub fn write_header<W: Write>(out: &mut W, gs: &GenomeStructure) -> io::Result<()> {
    writeln!(out, "@HD\tVN:1.0\tSO:unsorted")?;
    for c in gs.chromosomes() {
        writeln!(out, "@SQ\tSN:{}\tLN:{}", c.name, c.length)?;
    }
    writeln!(
        out,
        "@PG\tID:guidedb\tPN:guidedb\tVN:{}",
        env!("CARGO_PKG_VERSION")
    )
}

/// Renders the off-target table as per-distance groups:
/// `<distance>:<signed positions>` joined by `;`. Antisense sites carry an
/// explicit minus sign, including at position zero. `.` when empty.
fn encode_off_targets(table: &OffTargetTable) -> String {
    let groups: Vec<String> = table
        .iter()
        .enumerate()
        .filter(|(_, sites)| !sites.is_empty())
        .map(|(distance, sites)| {
            let positions: Vec<String> = sites
                .iter()
                .map(|site| match site.strand {
                    Strand::Forward => format!("{}", site.position),
                    Strand::Reverse => format!("-{}", site.position),
                })
                .collect();
            format!("{}:{}", distance, positions.join(","))
        })
        .collect();
    if groups.is_empty() {
        ".".to_string()
    } else {
        groups.join(";")
    }
}

/// One guide line: query name `<chrom>:<offset>:<strand>`, SAM core fields,
/// then the PAM and off-target tags.
pub fn format_record(kmer: &Kmer, coords: &Coordinates<'_>, table: &OffTargetTable) -> String {
    let flag = match kmer.strand {
        Strand::Forward => 0,
        Strand::Reverse => SAM_FLAG_REVERSE,
    };
    let seq = if kmer.sequence.is_empty() {
        "*"
    } else {
        kmer.sequence.as_str()
    };
    let cigar = if kmer.sequence.is_empty() {
        "*".to_string()
    } else {
        format!("{}M", kmer.sequence.len())
    };
    format!(
        "{chrom}:{offset}:{strand}\t{flag}\t{chrom}\t{pos}\t255\t{cigar}\t*\t0\t0\t{seq}\t*\tpm:Z:{pam}\tof:Z:{of}",
        chrom = coords.chromosome.name,
        offset = coords.offset,
        strand = kmer.strand,
        flag = flag,
        pos = coords.offset + 1,
        cigar = cigar,
        seq = seq,
        pam = kmer.pam,
        of = encode_off_targets(table),
    )
}
