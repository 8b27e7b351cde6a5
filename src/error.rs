// Error types shared across the crate.
//
// Construction-time failures (bad FASTA, unloadable index) abort the run
// before any worker starts; per-kmer failures are logged and skipped by the
// worker loop; output-writer failures tear the pool down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input: FASTA files, PAM patterns, query strings.
    #[error("input error: {0}")]
    Input(String),

    /// FM-index construction or load failure.
    #[error("index error: {0}")]
    Index(String),

    /// Malformed record in a kmer file.
    #[error("format error in {file}:{line}: {message}")]
    Format {
        file: String,
        line: usize,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation; indicates a bug, not bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
