// Bounded-mismatch backtracking search over the FM-index.
//
// The engine anchors each concrete PAM first (no mismatch budget there),
// then runs a depth-first backward extension through the protospacer
// pattern, branching over all four bases and spending the budget on
// disagreements. Every delivered range carries the exact Hamming distance
// of the unique path that produced it, so hits partition cleanly by
// distance.

use crate::error::{Error, Result};
use crate::fm_index::{base_code, FmIndex, SaRange};

#[path = "search_test.rs"]
mod search_test;

/// Callback capability handed to the search engine. `should_continue` is
/// polled before every descent, which lets a counting caller abort the
/// traversal once a threshold is crossed.
pub trait Visitor {
    fn visit_range(&mut self, sp: u64, ep: u64, mismatches: u32);

    fn should_continue(&self) -> bool {
        true
    }
}

/// Tallies match counts; optionally aborts once the tally exceeds a limit.
#[derive(Debug, Default)]
pub struct CountingVisitor {
    pub count: u64,
    limit: Option<u64>,
}

impl CountingVisitor {
    pub fn new() -> Self {
        CountingVisitor::default()
    }

    /// Stops the search as soon as the count exceeds `limit`.
    pub fn with_limit(limit: u64) -> Self {
        CountingVisitor {
            count: 0,
            limit: Some(limit),
        }
    }
}

impl Visitor for CountingVisitor {
    fn visit_range(&mut self, sp: u64, ep: u64, _mismatches: u32) {
        self.count += ep - sp + 1;
    }

    fn should_continue(&self) -> bool {
        self.limit.map_or(true, |limit| self.count <= limit)
    }
}

/// Collects delivered ranges bucketed by exact mismatch count.
#[derive(Debug)]
pub struct CollectingVisitor {
    pub hits: Vec<std::collections::BTreeSet<SaRange>>,
}

impl CollectingVisitor {
    pub fn new(max_mismatches: u32) -> Self {
        CollectingVisitor {
            hits: vec![Default::default(); max_mismatches as usize + 1],
        }
    }
}

impl Visitor for CollectingVisitor {
    fn visit_range(&mut self, sp: u64, ep: u64, mismatches: u32) {
        self.hits[mismatches as usize].insert(SaRange { sp, ep });
    }
}

fn concrete_codes(seq: &[u8], what: &str) -> Result<Vec<u8>> {
    seq.iter()
        .map(|&b| match base_code(b) {
            Some(c) if c < 4 => Ok(c),
            _ => Err(Error::Input(format!(
                "{} must consist of A/C/G/T, got {:?}",
                what, b as char
            ))),
        })
        .collect()
}

/// Finds every text position where a protospacer within `max_mismatches`
/// Hamming distance of `pattern` is immediately followed by one of the
/// concrete `pams`. Delivered ranges locate to the occurrence start. An
/// empty PAM string searches the pattern unanchored.
pub fn inexact_search<V: Visitor>(
    fm: &FmIndex,
    pattern: &[u8],
    pams: &[Vec<u8>],
    max_mismatches: u32,
    visitor: &mut V,
) -> Result<()> {
    let pattern = concrete_codes(pattern, "protospacer pattern")?;

    for pam in pams {
        if !visitor.should_continue() {
            return Ok(());
        }
        let pam = concrete_codes(pam, "PAM")?;

        let mut range = fm.initial_range();
        let mut anchored = true;
        for &c in pam.iter().rev() {
            match fm.extend_left(range, c) {
                Some(next) => range = next,
                None => {
                    anchored = false;
                    break;
                }
            }
        }
        if anchored {
            descend(fm, &pattern, pattern.len() as isize - 1, range, 0, max_mismatches, visitor);
        }
    }
    Ok(())
}

fn descend<V: Visitor>(
    fm: &FmIndex,
    pattern: &[u8],
    pos: isize,
    range: SaRange,
    used: u32,
    max_mismatches: u32,
    visitor: &mut V,
) {
    if pos < 0 {
        visitor.visit_range(range.sp, range.ep, used);
        return;
    }
    for c in 0..4u8 {
        if !visitor.should_continue() {
            return;
        }
        let Some(next) = fm.extend_left(range, c) else {
            continue;
        };
        if c == pattern[pos as usize] {
            descend(fm, pattern, pos - 1, next, used, max_mismatches, visitor);
        } else if used < max_mismatches {
            descend(fm, pattern, pos - 1, next, used + 1, max_mismatches, visitor);
        }
    }
}
