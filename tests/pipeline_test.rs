// End-to-end pipeline tests: side-file creation and reuse, full database
// builds over small literal genomes, and a brute-force cross-check of the
// whole enumeration on a seeded random genome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use guidedb::alphabet::{expand_pams, reverse_complement};
use guidedb::fm_index::FmIndex;
use guidedb::genome::{Chromosome, GenomeStructure};
use guidedb::index::{self, GenomeIndex, IndexPaths};
use guidedb::kmers::GenomeKmerSource;
use guidedb::process::{process_kmers_to_stream, ProcessConfig};
use guidedb::record::write_header;

fn setup_test_dir(test_name: &str) -> io::Result<PathBuf> {
    let dir = PathBuf::from(format!("target/test_pipeline_{test_name}"));
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn cleanup_test_dir(dir: &Path) {
    if dir.exists() {
        fs::remove_dir_all(dir).ok();
    }
}

fn default_config(mismatches: u32, threshold: u32) -> ProcessConfig {
    let pams = expand_pams(&["NGG".to_string(), "NAG".to_string()]).unwrap();
    ProcessConfig {
        pam_length: 3,
        pams,
        mismatches,
        threshold,
    }
}

/// Builds the full database for a FASTA file on disk and returns the
/// output text.
fn build_database(
    fasta: &Path,
    kmer_length: usize,
    config: &ProcessConfig,
    threads: usize,
) -> String {
    let (gi_forward, gi_reverse, text) = index::load_or_build(fasta).unwrap();
    let source = GenomeKmerSource::new(text, kmer_length, "NGG").unwrap();
    let mut out = Vec::new();
    write_header(&mut out, &gi_forward.gs).unwrap();
    process_kmers_to_stream(
        &gi_forward,
        &gi_reverse,
        config,
        Box::new(source),
        &mut out,
        threads,
    )
    .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_no_pam_sites_header_only() -> io::Result<()> {
    let dir = setup_test_dir("header_only")?;
    let fasta = dir.join("genome.fa");
    fs::write(&fasta, ">chr1\nACGTACGT\n>chr2\nAAAAA\n")?;

    let output = build_database(&fasta, 3, &default_config(0, 0), 2);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "@HD\tVN:1.0\tSO:unsorted",
            "@SQ\tSN:chr1\tLN:8",
            "@SQ\tSN:chr2\tLN:5",
            lines[3], // @PG carries the crate version
        ]
    );
    assert!(lines[3].starts_with("@PG\t"));

    cleanup_test_dir(&dir);
    Ok(())
}

#[test]
fn test_side_files_created_and_reused() -> io::Result<()> {
    let dir = setup_test_dir("side_files")?;
    let fasta = dir.join("genome.fa");
    fs::write(&fasta, ">chr1\nGAAAGGG\n")?;

    let first = build_database(&fasta, 3, &default_config(0, 0), 1);

    let paths = IndexPaths::for_fasta(&fasta);
    assert_eq!(fs::read(&paths.dna)?, b"GAAAGGG");
    assert!(paths.gs.exists());
    assert!(paths.csa.exists());
    assert!(paths.rev_csa.exists());

    // a second run must load the side files rather than rebuild them
    let mtime = fs::metadata(&paths.csa)?.modified()?;
    let second = build_database(&fasta, 3, &default_config(0, 0), 1);
    assert_eq!(first, second);
    assert_eq!(fs::metadata(&paths.csa)?.modified()?, mtime);

    cleanup_test_dir(&dir);
    Ok(())
}

#[test]
fn test_single_guide_database() -> io::Result<()> {
    let dir = setup_test_dir("single_guide")?;
    let fasta = dir.join("genome.fa");
    fs::write(&fasta, ">chr1\nGAAAGGG\n")?;

    let output = build_database(&fasta, 3, &default_config(0, 0), 1);
    let records: Vec<&str> = output.lines().filter(|l| !l.starts_with('@')).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0],
        "chr1:0:+\t0\tchr1\t1\t255\t3M\t*\t0\t0\tGAA\t*\tpm:Z:AGG\tof:Z:0:0"
    );
    assert_eq!(
        records[1],
        "chr1:1:+\t0\tchr1\t1\t255\t3M\t*\t0\t0\tAAA\t*\tpm:Z:GGG\tof:Z:0:1"
    );

    cleanup_test_dir(&dir);
    Ok(())
}

#[test]
fn test_gzipped_fasta_input() -> io::Result<()> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = setup_test_dir("gzip")?;
    let fasta = dir.join("genome.fa.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&fasta)?, Compression::default());
    encoder.write_all(b">chr1\nGAAAGGG\n")?;
    encoder.finish()?;

    let output = build_database(&fasta, 3, &default_config(0, 0), 1);
    assert!(output.contains("pm:Z:AGG"));

    cleanup_test_dir(&dir);
    Ok(())
}

#[test]
fn test_deterministic_output_single_thread() -> io::Result<()> {
    let dir = setup_test_dir("determinism")?;
    let fasta = dir.join("genome.fa");
    fs::write(
        &fasta,
        ">chr1\nAAAATGGAAAATGGCATTGGACCTAGGTTTAGGCCATGGA\n",
    )?;

    let first = build_database(&fasta, 4, &default_config(1, 0), 1);
    let second = build_database(&fasta, 4, &default_config(1, 0), 1);
    assert_eq!(first, second);
    assert!(first.lines().any(|l| !l.starts_with('@')));

    cleanup_test_dir(&dir);
    Ok(())
}

// ---- brute-force cross-check -------------------------------------------

fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32
}

fn is_concrete(seq: &[u8]) -> bool {
    seq.iter().all(|b| b"ACGT".contains(b))
}

/// Specification-level enumeration: every guide+PAM window on either strand
/// whose protospacer is within `mismatches` of `guide`, as signed position
/// strings grouped by distance.
fn brute_force_table(
    text: &[u8],
    guide: &[u8],
    pams: &[Vec<u8>],
    mismatches: u32,
) -> Vec<Vec<String>> {
    let window = guide.len() + pams[0].len();
    let mut table = vec![Vec::new(); mismatches as usize + 1];
    for start in 0..=text.len().saturating_sub(window) {
        let w = &text[start..start + window];

        let (proto, pam) = w.split_at(guide.len());
        if is_concrete(proto) && pams.iter().any(|p| p.as_slice() == pam) {
            let d = hamming(proto, guide);
            if d <= mismatches {
                table[d as usize].push(format!("{}", start));
            }
        }

        let rc = reverse_complement(w).unwrap();
        let (proto, pam) = rc.split_at(guide.len());
        if is_concrete(proto) && pams.iter().any(|p| p.as_slice() == pam) {
            let d = hamming(proto, guide);
            if d <= mismatches {
                table[d as usize].push(format!("-{}", start));
            }
        }
    }
    table
}

fn parse_off_target_tag(line: &str) -> Vec<Vec<String>> {
    let tag = line
        .split('\t')
        .find_map(|f| f.strip_prefix("of:Z:"))
        .expect("record without of:Z: tag");
    let mut table = Vec::new();
    if tag == "." {
        return table;
    }
    for group in tag.split(';') {
        let (distance, positions) = group.split_once(':').unwrap();
        let distance: usize = distance.parse().unwrap();
        while table.len() <= distance {
            table.push(Vec::new());
        }
        table[distance] = positions.split(',').map(str::to_string).collect();
    }
    table
}

#[test]
fn test_enumeration_matches_brute_force() -> io::Result<()> {
    use rand::rngs::SmallRng;
    use rand::{RngCore, SeedableRng};

    let mut rng = SmallRng::seed_from_u64(1234);
    let text: Vec<u8> = (0..400)
        .map(|_| b"ACGT"[(rng.next_u32() % 4) as usize])
        .collect();

    let gs = GenomeStructure::new(vec![Chromosome {
        name: "chr1".into(),
        length: text.len() as u64,
    }]);
    let gi_forward = GenomeIndex {
        fm: FmIndex::build(&text).unwrap(),
        gs: gs.clone(),
    };
    let gi_reverse = GenomeIndex {
        fm: FmIndex::build(&reverse_complement(&text).unwrap()).unwrap(),
        gs,
    };

    let kmer_length = 5;
    let mismatches = 1;
    let config = default_config(mismatches, 0);

    let source = GenomeKmerSource::new(text.clone(), kmer_length, "NGG").unwrap();
    let mut out = Vec::new();
    process_kmers_to_stream(
        &gi_forward,
        &gi_reverse,
        &config,
        Box::new(source),
        &mut out,
        1,
    )
    .unwrap();

    let output = String::from_utf8(out).unwrap();
    let records: Vec<&str> = output.lines().collect();
    assert!(
        records.len() > 5,
        "random genome should produce several guides"
    );

    for line in records {
        let fields: Vec<&str> = line.split('\t').collect();
        let guide = fields[9].as_bytes();
        let mut table = brute_force_table(&text, guide, &config.pams, mismatches);
        for bucket in table.iter_mut() {
            bucket.sort_by_key(|p| p.trim_start_matches('-').parse::<u64>().unwrap());
        }

        let mut reported = parse_off_target_tag(line);
        while reported.len() < table.len() {
            reported.push(Vec::new());
        }
        assert_eq!(reported, table, "guide {:?}", fields[0]);
    }

    Ok(())
}
