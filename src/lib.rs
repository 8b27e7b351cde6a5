pub mod alphabet;
pub mod error;
pub mod fm_index; // FM-index build/load and backward-search primitives
pub mod genome; // chromosome structure and coordinate resolution
pub mod index; // side-file management, GenomeIndex assembly
pub mod kmers; // candidate guide producers
pub mod process; // per-guide off-target processing and the worker pool
pub mod record; // SAM-style output records
pub mod search; // bounded-mismatch PAM-anchored search engine

pub use error::{Error, Result};
