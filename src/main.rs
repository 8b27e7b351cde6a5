use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use guidedb::alphabet::expand_pams;
use guidedb::error::Result;
use guidedb::index;
use guidedb::kmers::{FileKmerSource, GenomeKmerSource, KmerSource};
use guidedb::process::{self, ProcessConfig};
use guidedb::record;

#[derive(Parser)]
#[command(name = "guidedb")]
#[command(about = "Builds CRISPR gRNA databases with genome-wide off-target enumeration", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, global = true, default_value_t = 3)]
    verbosity: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a gRNA database over the given genome
    Build {
        /// Genome in FASTA format (optionally gzipped)
        #[arg(value_name = "GENOME.FA")]
        genome: PathBuf,

        /// Output database file
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,

        /// Length of guides, excluding the PAM
        #[arg(short = 'k', long, value_name = "INT", default_value_t = 20)]
        kmer_length: usize,

        /// Main PAM used to generate guides and find off-targets
        #[arg(short = 'p', long, value_name = "PAM", default_value = "NGG")]
        pam: String,

        /// Alternative PAMs used to find off-targets
        #[arg(short = 'a', long = "alt-pam", value_name = "PAM", default_values_t = vec![String::from("NAG")])]
        alt_pams: Vec<String>,

        /// Number of mismatches allowed in off-targets
        #[arg(short = 'm', long, value_name = "INT", default_value_t = 3)]
        mismatches: u32,

        /// Skip guides with another hit within this many mismatches; 0 disables
        #[arg(short = 'u', long, value_name = "INT", default_value_t = 1)]
        threshold: u32,

        /// Number of threads to parallelize over (default: all cores)
        #[arg(short = 'n', long, value_name = "INT")]
        threads: Option<usize>,

        /// File of pre-computed kmers to build the database over
        #[arg(short = 'f', long, value_name = "FILE")]
        kmers_file: Option<PathBuf>,
    },

    /// Generate the kmer list for a PAM and write it to stdout
    Kmers {
        /// Genome in FASTA format (optionally gzipped)
        #[arg(value_name = "GENOME.FA")]
        genome: PathBuf,

        /// Length of guides, excluding the PAM
        #[arg(short = 'k', long, value_name = "INT", default_value_t = 20)]
        kmer_length: usize,

        /// PAM to generate kmers for
        #[arg(short = 'p', long, value_name = "PAM", default_value = "NGG")]
        pam: String,
    },

    /// Search the genome for a pattern on both strands
    Search {
        /// Genome in FASTA format (optionally gzipped)
        #[arg(value_name = "GENOME.FA")]
        genome: PathBuf,

        /// Pattern to search for
        #[arg(short = 'q', long, value_name = "SEQ")]
        pattern: String,

        /// Number of mismatches allowed
        #[arg(short = 'm', long, value_name = "INT", default_value_t = 3)]
        mismatches: u32,
    },
}

fn run_build(
    genome: &PathBuf,
    output: &PathBuf,
    kmer_length: usize,
    pam: &str,
    alt_pams: &[String],
    mismatches: u32,
    threshold: u32,
    threads: Option<usize>,
    kmers_file: Option<&PathBuf>,
) -> Result<()> {
    let mut all_pams = vec![pam.to_string()];
    all_pams.extend_from_slice(alt_pams);
    let expanded = expand_pams(&all_pams)?;
    let pam_length = expanded[0].len();

    let (gi_forward, gi_reverse, text) = index::load_or_build(genome)?;

    let source: Box<dyn KmerSource + Send> = match kmers_file {
        Some(path) => Box::new(FileKmerSource::open(path)?),
        None => Box::new(GenomeKmerSource::new(text, kmer_length, pam)?),
    };

    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    log::info!(
        "building database over {} with {} threads",
        genome.display(),
        threads
    );

    let config = ProcessConfig {
        pams: expanded,
        pam_length,
        mismatches,
        threshold,
    };

    let mut writer = BufWriter::new(File::create(output)?);
    record::write_header(&mut writer, &gi_forward.gs)?;
    process::process_kmers_to_stream(
        &gi_forward,
        &gi_reverse,
        &config,
        source,
        &mut writer,
        threads,
    )?;
    writer.flush()?;
    Ok(())
}

fn run_kmers(genome: &PathBuf, kmer_length: usize, pam: &str) -> Result<()> {
    let (_, _, text) = index::load_or_build(genome)?;
    let mut source = GenomeKmerSource::new(text, kmer_length, pam)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let written = guidedb::kmers::write_kmers(&mut source, &mut out)?;
    out.flush()?;
    log::info!("wrote {} kmers", written);
    Ok(())
}

fn run_search(genome: &PathBuf, pattern: &str, mismatches: u32) -> Result<()> {
    let (gi_forward, gi_reverse, _) = index::load_or_build(genome)?;
    let matches = process::search_pattern(&gi_forward, &gi_reverse, pattern, mismatches)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for m in &matches {
        let line = serde_json::to_string(m)
            .map_err(|e| guidedb::Error::Internal(format!("serializing match: {}", e)))?;
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            error.print().ok();
            let code = match error.kind() {
                clap::error::ErrorKind::DisplayHelp
                | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = match &cli.command {
        Commands::Build {
            genome,
            output,
            kmer_length,
            pam,
            alt_pams,
            mismatches,
            threshold,
            threads,
            kmers_file,
        } => run_build(
            genome,
            output,
            *kmer_length,
            pam,
            alt_pams,
            *mismatches,
            *threshold,
            *threads,
            kmers_file.as_ref(),
        ),
        Commands::Kmers {
            genome,
            kmer_length,
            pam,
        } => run_kmers(genome, *kmer_length, pam),
        Commands::Search {
            genome,
            pattern,
            mismatches,
        } => run_search(genome, pattern, *mismatches),
    };

    if let Err(error) = result {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
