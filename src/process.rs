// Per-guide off-target processing and the worker pool that drives it.
//
// Each kmer is searched against both index orientations with the same
// pattern and PAM set: forward-index hits are sense-strand sites located
// directly, reverse-index hits are antisense sites whose window start is
// recovered from the reverse-complement coordinate. A configurable
// uniqueness gate counts hits first and skips promiscuous guides before the
// full enumeration runs.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::GenomeIndex;
use crate::kmers::{Kmer, KmerSource, Strand};
use crate::record::{self, OffTarget, OffTargetTable};
use crate::search::{inexact_search, CollectingVisitor, CountingVisitor};

#[path = "process_test.rs"]
mod process_test;

/// Search configuration shared by all workers.
pub struct ProcessConfig {
    /// Concrete PAM strings, the cartesian expansion of main + alternates.
    pub pams: Vec<Vec<u8>>,
    /// Shared length of every PAM.
    pub pam_length: usize,
    /// Mismatch budget for the off-target enumeration.
    pub mismatches: u32,
    /// Uniqueness threshold; 0 disables the gate.
    pub threshold: u32,
}

/// Computes one guide's record. `None` when the uniqueness gate rejects the
/// guide.
pub fn process_kmer(
    gi_forward: &GenomeIndex,
    gi_reverse: &GenomeIndex,
    config: &ProcessConfig,
    kmer: &Kmer,
) -> Result<Option<String>> {
    let coords = gi_forward.gs.resolve_absolute(kmer.absolute_coords)?;
    let pattern = kmer.sequence.as_bytes();
    let window_len = (pattern.len() + config.pam_length) as u64;
    let total_len = gi_forward.gs.total_length();

    if config.threshold > 0 {
        let mut counter = CountingVisitor::with_limit(1);
        inexact_search(
            &gi_forward.fm,
            pattern,
            &config.pams,
            config.threshold,
            &mut counter,
        )?;
        if counter.count > 1 {
            return Ok(None);
        }
        inexact_search(
            &gi_reverse.fm,
            pattern,
            &config.pams,
            config.threshold,
            &mut counter,
        )?;
        if counter.count > 1 {
            return Ok(None);
        }
    }

    let mut forward_hits = CollectingVisitor::new(config.mismatches);
    inexact_search(
        &gi_forward.fm,
        pattern,
        &config.pams,
        config.mismatches,
        &mut forward_hits,
    )?;
    let mut reverse_hits = CollectingVisitor::new(config.mismatches);
    inexact_search(
        &gi_reverse.fm,
        pattern,
        &config.pams,
        config.mismatches,
        &mut reverse_hits,
    )?;

    let mut table: OffTargetTable = vec![Vec::new(); config.mismatches as usize + 1];
    for distance in 0..=config.mismatches as usize {
        for range in &forward_hits.hits[distance] {
            for row in range.sp..=range.ep {
                table[distance].push(OffTarget {
                    position: gi_forward.fm.locate(row)?,
                    strand: Strand::Forward,
                });
            }
        }
        for range in &reverse_hits.hits[distance] {
            for row in range.sp..=range.ep {
                let rc_position = gi_reverse.fm.locate(row)?;
                // the window start on the forward strand is the reverse-
                // complement image of the occurrence end
                table[distance].push(OffTarget {
                    position: total_len - rc_position - window_len,
                    strand: Strand::Reverse,
                });
            }
        }
        table[distance].sort_unstable();
    }

    Ok(Some(record::format_record(kmer, &coords, &table)))
}

/// Runs the fixed worker pool to exhaustion: each worker pulls a kmer under
/// the producer lock, processes it, and writes the record under the output
/// lock. Per-kmer failures are logged and skipped; a writer failure stops
/// every worker and propagates.
pub fn process_kmers_to_stream<W: Write + Send>(
    gi_forward: &GenomeIndex,
    gi_reverse: &GenomeIndex,
    config: &ProcessConfig,
    source: Box<dyn KmerSource + Send>,
    output: &mut W,
    threads: usize,
) -> Result<()> {
    let source = Mutex::new(source);
    let output = Mutex::new(output);
    let stop = AtomicBool::new(false);
    let fatal: Mutex<Option<Error>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..threads.max(1) {
            scope.spawn(|| {
                worker_loop(
                    gi_forward, gi_reverse, config, &source, &output, &stop, &fatal,
                )
            });
        }
    });

    match fatal.into_inner() {
        Ok(Some(error)) => Err(error),
        Ok(None) => Ok(()),
        Err(_) => Err(Error::Internal("worker pool poisoned its state".into())),
    }
}

fn worker_loop<W: Write>(
    gi_forward: &GenomeIndex,
    gi_reverse: &GenomeIndex,
    config: &ProcessConfig,
    source: &Mutex<Box<dyn KmerSource + Send>>,
    output: &Mutex<&mut W>,
    stop: &AtomicBool,
    fatal: &Mutex<Option<Error>>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let next = source.lock().unwrap().next_kmer();
        let kmer = match next {
            Ok(Some(kmer)) => kmer,
            Ok(None) => return,
            Err(error) => {
                log::warn!("skipping kmer: {}", error);
                continue;
            }
        };

        let line = match process_kmer(gi_forward, gi_reverse, config, &kmer) {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(error) => {
                log::warn!(
                    "skipping kmer {}:{}{}: {}",
                    kmer.sequence,
                    kmer.absolute_coords,
                    kmer.strand,
                    error
                );
                continue;
            }
        };

        let mut out = output.lock().unwrap();
        if let Err(error) = writeln!(out, "{}", line) {
            log::error!("output write failed, stopping workers: {}", error);
            stop.store(true, Ordering::Relaxed);
            let mut fatal = fatal.lock().unwrap();
            if fatal.is_none() {
                *fatal = Some(Error::Io(error));
            }
            return;
        }
    }
}

/// A query-mode match, serialized one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    pub chr: String,
    pub pos: u64,
    pub absolute_pos: u64,
    pub strand: char,
    pub distance: u32,
}

/// Query mode: enumerates both orientations of `pattern` without PAM
/// anchoring and resolves each hit to chromosome coordinates.
pub fn search_pattern(
    gi_forward: &GenomeIndex,
    gi_reverse: &GenomeIndex,
    pattern: &str,
    mismatches: u32,
) -> Result<Vec<PatternMatch>> {
    let pattern = crate::alphabet::normalize(pattern)?;
    if pattern.is_empty() {
        return Err(Error::Input("empty search pattern".into()));
    }
    let unanchored = vec![Vec::new()];
    let total_len = gi_forward.gs.total_length();
    let pattern_len = pattern.len() as u64;
    let mut matches = Vec::new();

    let mut forward_hits = CollectingVisitor::new(mismatches);
    inexact_search(
        &gi_forward.fm,
        pattern.as_bytes(),
        &unanchored,
        mismatches,
        &mut forward_hits,
    )?;
    let mut reverse_hits = CollectingVisitor::new(mismatches);
    inexact_search(
        &gi_reverse.fm,
        pattern.as_bytes(),
        &unanchored,
        mismatches,
        &mut reverse_hits,
    )?;

    for distance in 0..=mismatches {
        for range in &forward_hits.hits[distance as usize] {
            for row in range.sp..=range.ep {
                let absolute_pos = gi_forward.fm.locate(row)?;
                let coords = gi_forward.gs.resolve_absolute(absolute_pos)?;
                matches.push(PatternMatch {
                    chr: coords.chromosome.name.clone(),
                    pos: coords.offset,
                    absolute_pos,
                    strand: '+',
                    distance,
                });
            }
        }
        for range in &reverse_hits.hits[distance as usize] {
            for row in range.sp..=range.ep {
                let absolute_pos = total_len - gi_reverse.fm.locate(row)? - pattern_len;
                let coords = gi_forward.gs.resolve_absolute(absolute_pos)?;
                matches.push(PatternMatch {
                    chr: coords.chromosome.name.clone(),
                    pos: coords.offset,
                    absolute_pos,
                    strand: '-',
                    distance,
                });
            }
        }
    }

    matches.sort_unstable_by(|a, b| {
        (a.absolute_pos, a.strand, a.distance).cmp(&(b.absolute_pos, b.strand, b.distance))
    });
    Ok(matches)
}
