// Index management: pairing the FM-index with the genome structure, and
// creating/reusing the on-disk side files next to the input FASTA.
//
// Side files, created once and reloaded on later runs:
//   <fasta>.dna      raw concatenated uppercase sequence, headers stripped
//   <fasta>.gs       chromosome structure, two lines per chromosome
//   <fasta>.csa      forward-strand FM-index
//   <fasta>.rev.csa  FM-index over the reverse complement

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::alphabet;
use crate::error::{Error, Result};
use crate::fm_index::FmIndex;
use crate::genome::{self, GenomeStructure};

/// One search orientation: an FM-index plus the shared chromosome layout.
pub struct GenomeIndex {
    pub fm: FmIndex,
    pub gs: GenomeStructure,
}

/// Side-file locations derived from the FASTA path by appending suffixes.
pub struct IndexPaths {
    pub dna: PathBuf,
    pub gs: PathBuf,
    pub csa: PathBuf,
    pub rev_csa: PathBuf,
}

impl IndexPaths {
    pub fn for_fasta(fasta: &Path) -> IndexPaths {
        let base = fasta.display();
        IndexPaths {
            dna: PathBuf::from(format!("{}.dna", base)),
            gs: PathBuf::from(format!("{}.gs", base)),
            csa: PathBuf::from(format!("{}.csa", base)),
            rev_csa: PathBuf::from(format!("{}.rev.csa", base)),
        }
    }
}

/// Opens a FASTA file, transparently decompressing `.gz` input.
pub fn open_fasta(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| {
        Error::Input(format!("cannot open FASTA file {}: {}", path.display(), e))
    })?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn ensure_raw_sequence(fasta: &Path, dna: &Path) -> Result<()> {
    if dna.exists() {
        return Ok(());
    }
    log::info!(
        "no raw sequence file {}, building now",
        dna.display()
    );
    let reader = open_fasta(fasta)?;
    let mut out = BufWriter::new(File::create(dna)?);
    genome::write_raw_sequence(reader, &mut out)?;
    Ok(())
}

fn ensure_genome_structure(fasta: &Path, gs_path: &Path) -> Result<GenomeStructure> {
    if gs_path.exists() {
        return GenomeStructure::read_from(gs_path);
    }
    log::info!(
        "no genome structure file {}, building now",
        gs_path.display()
    );
    let gs = GenomeStructure::from_fasta(open_fasta(fasta)?)?;
    gs.write_to(gs_path)?;
    Ok(gs)
}

fn ensure_fm_index(text: &[u8], csa_path: &Path, label: &str) -> Result<FmIndex> {
    if csa_path.exists() {
        return FmIndex::load(BufReader::new(File::open(csa_path)?));
    }
    log::info!("no {} index file {}, building now", label, csa_path.display());
    let fm = FmIndex::build(text)?;
    fm.dump(BufWriter::new(File::create(csa_path)?))?;
    Ok(fm)
}

/// Loads or builds everything the pipeline needs: both index orientations
/// and the raw sequence the genomic kmer scan slides over.
pub fn load_or_build(fasta: &Path) -> Result<(GenomeIndex, GenomeIndex, Vec<u8>)> {
    let paths = IndexPaths::for_fasta(fasta);

    ensure_raw_sequence(fasta, &paths.dna)?;
    let gs = ensure_genome_structure(fasta, &paths.gs)?;

    let text = fs::read(&paths.dna)?;
    if gs.total_length() != text.len() as u64 {
        return Err(Error::Index(format!(
            "side files disagree: {} declares {} bases but {} holds {}",
            paths.gs.display(),
            gs.total_length(),
            paths.dna.display(),
            text.len()
        )));
    }

    let fm = ensure_fm_index(&text, &paths.csa, "forward")?;
    let rc_text = alphabet::reverse_complement(&text)?;
    let fm_rev = ensure_fm_index(&rc_text, &paths.rev_csa, "reverse")?;

    for (index, label) in [(&fm, "forward"), (&fm_rev, "reverse")] {
        if index.text_len() != text.len() as u64 {
            return Err(Error::Index(format!(
                "stale {} index: covers {} bases but genome has {}",
                label,
                index.text_len(),
                text.len()
            )));
        }
    }

    log::info!(
        "loaded index: {} chromosomes, {} bases",
        gs.chromosomes().len(),
        gs.total_length()
    );

    Ok((
        GenomeIndex {
            fm,
            gs: gs.clone(),
        },
        GenomeIndex { fm: fm_rev, gs },
        text,
    ))
}
