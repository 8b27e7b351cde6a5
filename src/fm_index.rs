// FM-index over the concatenated genome sequence.
//
// The index is built from the suffix array (via the `bio` crate) and stores
// only what backward search and locate need: cumulative symbol counts, an
// occurrence table checkpointed every 64 rows with one-hot bitmasks for
// popcount-based rank queries, and suffix-array samples every 8th row.
//
// Symbol order is sentinel < A < C < G < T < N. Every IUPAC ambiguity code
// collapses to the N symbol: it participates in the index so that LF-walks
// stay well-defined, but searches only extend with concrete bases, so
// ambiguous stretches of the genome can never be reported as matches.

use std::io::{Read, Write};

use bio::data_structures::suffix_array::suffix_array;
use lazy_static::lazy_static;

use crate::error::{Error, Result};

#[path = "fm_index_test.rs"]
mod fm_index_test;

/// Number of indexed symbols (A, C, G, T, N); the sentinel is implicit.
pub const SYMBOLS: usize = 5;
const SENTINEL: u8 = SYMBOLS as u8;

const BLOCK_SHIFT: u64 = 6;
const BLOCK_MASK: u64 = 63;
/// Suffix-array sampling interval, in rows.
const SA_SAMPLE_INTERVAL: u64 = 8;

lazy_static! {
    /// PREFIX_MASK[i] has the top i bits set; masks a checkpoint block down
    /// to the rows strictly before an offset.
    static ref PREFIX_MASK: [u64; 64] = {
        let mut masks = [0u64; 64];
        let base = 0x8000_0000_0000_0000u64;
        for i in 1..64 {
            masks[i] = (masks[i - 1] >> 1) | base;
        }
        masks
    };
}

/// Index code for one sequence byte: A/C/G/T map to 0..=3, the remaining
/// IUPAC codes to the N symbol.
pub fn base_code(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        b'N' | b'R' | b'Y' | b'S' | b'W' | b'K' | b'M' | b'B' | b'D' | b'H' | b'V' => Some(4),
        _ => None,
    }
}

/// Inclusive suffix-array range; `ep - sp + 1` suffixes share the prefix
/// matched so far. Empty ranges are never constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SaRange {
    pub sp: u64,
    pub ep: u64,
}

impl SaRange {
    pub fn len(&self) -> u64 {
        self.ep - self.sp + 1
    }
}

/// One 64-row checkpoint: occurrence counts at the block start plus one-hot
/// BWT bitmasks for the block body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OccBlock {
    counts: [u64; SYMBOLS],
    bits: [u64; SYMBOLS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmIndex {
    /// Suffix-array rows: text length plus the sentinel.
    rows: u64,
    /// First row whose suffix starts with each symbol.
    counts: [u64; SYMBOLS],
    blocks: Vec<OccBlock>,
    samples: Vec<u64>,
}

impl FmIndex {
    /// Builds the index for a raw IUPAC sequence.
    pub fn build(text: &[u8]) -> Result<FmIndex> {
        let mut codes = Vec::with_capacity(text.len());
        for (i, &b) in text.iter().enumerate() {
            let code = base_code(b).ok_or_else(|| {
                Error::Input(format!(
                    "illegal character {:?} at sequence offset {}",
                    b as char, i
                ))
            })?;
            codes.push(code);
        }

        // The suffix-array builder wants a lexicographically smallest
        // sentinel, so the codes are shifted up by one and 0 appended.
        let mut sais_text: Vec<u8> = codes.iter().map(|&c| c + 1).collect();
        sais_text.push(0);
        let sa = suffix_array(&sais_text);

        let rows = sa.len() as u64;
        let mut bwt = Vec::with_capacity(rows as usize);
        for &suffix in &sa {
            if suffix == 0 {
                bwt.push(SENTINEL);
            } else {
                bwt.push(codes[suffix - 1]);
            }
        }

        let mut tally = [0u64; SYMBOLS];
        for &c in &codes {
            tally[c as usize] += 1;
        }
        let mut counts = [0u64; SYMBOLS];
        counts[0] = 1; // row 0 is the sentinel suffix
        for c in 1..SYMBOLS {
            counts[c] = counts[c - 1] + tally[c - 1];
        }

        let n_blocks = (rows >> BLOCK_SHIFT) as usize + 1;
        let mut blocks = vec![OccBlock::default(); n_blocks];
        let mut running = [0u64; SYMBOLS];
        for (i, &c) in bwt.iter().enumerate() {
            if i as u64 & BLOCK_MASK == 0 {
                blocks[i >> BLOCK_SHIFT].counts = running;
            }
            if (c as usize) < SYMBOLS {
                blocks[i >> BLOCK_SHIFT].bits[c as usize] |=
                    1u64 << (63 - (i as u64 & BLOCK_MASK));
                running[c as usize] += 1;
            }
        }
        if rows & BLOCK_MASK == 0 {
            blocks[n_blocks - 1].counts = running;
        }

        let mut samples = Vec::with_capacity((rows as usize + 7) / 8);
        let mut i = 0;
        while i < sa.len() {
            samples.push(sa[i] as u64);
            i += SA_SAMPLE_INTERVAL as usize;
        }

        Ok(FmIndex {
            rows,
            counts,
            blocks,
            samples,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Length of the indexed text, excluding the sentinel.
    pub fn text_len(&self) -> u64 {
        self.rows - 1
    }

    /// Range covering every suffix.
    pub fn initial_range(&self) -> SaRange {
        SaRange {
            sp: 0,
            ep: self.rows - 1,
        }
    }

    /// Occurrences of symbol `c` in BWT[0..i).
    fn occ(&self, c: u8, i: u64) -> u64 {
        let block = &self.blocks[(i >> BLOCK_SHIFT) as usize];
        let masked = block.bits[c as usize] & PREFIX_MASK[(i & BLOCK_MASK) as usize];
        block.counts[c as usize] + masked.count_ones() as u64
    }

    /// LF-maps the range one symbol leftward; `None` when no suffix in the
    /// range is preceded by `c`.
    pub fn extend_left(&self, range: SaRange, c: u8) -> Option<SaRange> {
        debug_assert!((c as usize) < SYMBOLS);
        let sp = self.counts[c as usize] + self.occ(c, range.sp);
        let ep = self.counts[c as usize] + self.occ(c, range.ep + 1);
        if sp < ep {
            Some(SaRange { sp, ep: ep - 1 })
        } else {
            None
        }
    }

    /// BWT symbol at a row, recovered from the one-hot planes; the sentinel
    /// is the row no plane claims.
    fn bwt_symbol(&self, row: u64) -> u8 {
        let block = &self.blocks[(row >> BLOCK_SHIFT) as usize];
        let bit = 1u64 << (63 - (row & BLOCK_MASK));
        for c in 0..SYMBOLS {
            if block.bits[c] & bit != 0 {
                return c as u8;
            }
        }
        SENTINEL
    }

    fn lf(&self, row: u64) -> u64 {
        let c = self.bwt_symbol(row);
        if c == SENTINEL {
            0
        } else {
            self.counts[c as usize] + self.occ(c, row)
        }
    }

    /// Text position of the suffix at `row`: LF-walks to a sampled row,
    /// correcting the single possible wrap past the sentinel.
    pub fn locate(&self, row: u64) -> Result<u64> {
        if row >= self.rows {
            return Err(Error::Internal(format!(
                "locate({}) outside {} suffix rows",
                row, self.rows
            )));
        }
        let mut row = row;
        let mut steps = 0u64;
        while row % SA_SAMPLE_INTERVAL != 0 {
            row = self.lf(row);
            steps += 1;
        }
        let pos = self.samples[(row / SA_SAMPLE_INTERVAL) as usize] + steps;
        Ok(if pos >= self.rows { pos - self.rows } else { pos })
    }

    /// Serializes the index as little-endian words, in field order.
    pub fn dump<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(&self.rows.to_le_bytes())?;
        for c in self.counts {
            w.write_all(&c.to_le_bytes())?;
        }
        for block in &self.blocks {
            for c in block.counts {
                w.write_all(&c.to_le_bytes())?;
            }
            for b in block.bits {
                w.write_all(&b.to_le_bytes())?;
            }
        }
        for s in &self.samples {
            w.write_all(&s.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn load<R: Read>(mut r: R) -> Result<FmIndex> {
        let mut buf = [0u8; 8];
        let mut read_u64 = |r: &mut R| -> Result<u64> {
            r.read_exact(&mut buf)
                .map_err(|e| Error::Index(format!("truncated FM-index file: {}", e)))?;
            Ok(u64::from_le_bytes(buf))
        };

        let rows = read_u64(&mut r)?;
        if rows == 0 {
            return Err(Error::Index("FM-index file declares zero rows".into()));
        }
        let mut counts = [0u64; SYMBOLS];
        for c in counts.iter_mut() {
            *c = read_u64(&mut r)?;
        }

        let n_blocks = (rows >> BLOCK_SHIFT) as usize + 1;
        let mut blocks = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            let mut block = OccBlock::default();
            for c in block.counts.iter_mut() {
                *c = read_u64(&mut r)?;
            }
            for b in block.bits.iter_mut() {
                *b = read_u64(&mut r)?;
            }
            blocks.push(block);
        }

        let n_samples =
            (rows as usize + SA_SAMPLE_INTERVAL as usize - 1) / SA_SAMPLE_INTERVAL as usize;
        let mut samples = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            let s = read_u64(&mut r)?;
            if s >= rows {
                return Err(Error::Index(format!(
                    "corrupt FM-index file: sample {} outside {} rows",
                    s, rows
                )));
            }
            samples.push(s);
        }

        Ok(FmIndex {
            rows,
            counts,
            blocks,
            samples,
        })
    }
}
