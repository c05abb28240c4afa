//! sift - tune feature extraction, similarity, and recommendation
//!
//! Subcommands:
//! - `sift features <piece.json>...` - Print feature vectors
//! - `sift compare <a.json> <b.json>` - Score two pieces
//! - `sift pairs [dir]` - Score every pair in a corpus, as CSV
//! - `sift recommend <pairs.csv> <name>=<y|n>...` - Replay feedback, print picks
//! - `sift snippets <piece.json>...` - Print training snippets
//! - `sift config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Melodic feature extraction and tune similarity")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./tunesift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the feature cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print feature vectors as JSON
    Features {
        /// Piece documents
        #[arg(required = true)]
        pieces: Vec<PathBuf>,
    },

    /// Print the similarity of two pieces
    Compare {
        a: PathBuf,
        b: PathBuf,

        /// Also print every contributing term
        #[arg(long)]
        breakdown: bool,
    },

    /// Score every pair of pieces in a directory
    Pairs {
        /// Corpus directory (default: paths.corpus_dir)
        dir: Option<PathBuf>,

        /// Output CSV (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay yes/no answers and print recommendations
    Recommend {
        /// CSV written by `sift pairs`
        scores: PathBuf,

        /// Answers in listening order, e.g. `deut0123.krn=y`
        answers: Vec<commands::Answer>,

        /// Number of recommendations
        #[arg(short, default_value = "3")]
        k: usize,
    },

    /// Print next-note training snippets as JSON lines
    Snippets {
        #[arg(required = true)]
        pieces: Vec<PathBuf>,

        /// Window length (default: analysis.snippet_length)
        #[arg(short)]
        n: Option<usize>,

        /// Also emit transpositions up to this many semitones either way
        #[arg(long, default_value = "0")]
        transpose: u8,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = siftconf::SiftConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.telemetry.log_level))
        .with_writer(std::io::stderr)
        .init();

    let session = commands::Session::new(config, !cli.no_cache);

    match cli.command {
        Commands::Features { pieces } => {
            commands::features(&session, &pieces)?;
        }
        Commands::Compare { a, b, breakdown } => {
            commands::compare(&session, &a, &b, breakdown)?;
        }
        Commands::Pairs { dir, output } => {
            commands::pairs(&session, dir.as_deref(), output.as_deref())?;
        }
        Commands::Recommend { scores, answers, k } => {
            commands::recommend(&scores, &answers, k)?;
        }
        Commands::Snippets {
            pieces,
            n,
            transpose,
        } => {
            commands::snippets(&session, &pieces, n, transpose)?;
        }
        Commands::Config => {
            commands::show_config(&session, &sources);
        }
    }

    Ok(())
}
