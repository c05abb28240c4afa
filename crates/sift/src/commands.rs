//! CLI command implementations

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use score_analysis::vocabulary::{encode, snippets as windows};
use score_analysis::ChordReduction;
use siftconf::{ConfigSources, SiftConfig};
use tracing::{info, warn};
use tune_similarity::pairwise::{read_csv, write_csv};
use tune_similarity::{
    score_all, similarity_report, FeatureEngine, HeuristicAnalyzer, Piece, Recommender,
    SimilarityMatrix, SimilarityParams, TuneAnalyzer,
};

/// Effective configuration plus per-invocation switches.
pub struct Session {
    config: SiftConfig,
    use_cache: bool,
}

impl Session {
    pub fn new(config: SiftConfig, use_cache: bool) -> Self {
        Self { config, use_cache }
    }

    fn reduction(&self) -> Result<ChordReduction> {
        self.config
            .analysis
            .chord_reduction
            .parse::<ChordReduction>()
            .context("analysis.chord_reduction")
    }

    fn analyzer(&self) -> Result<HeuristicAnalyzer> {
        Ok(HeuristicAnalyzer::new(self.reduction()?))
    }

    fn engine(&self) -> Result<FeatureEngine> {
        let analyzer: Arc<dyn TuneAnalyzer> = Arc::new(self.analyzer()?);
        if self.use_cache {
            FeatureEngine::with_analyzer(analyzer, &self.config.paths.cache_db)
        } else {
            Ok(FeatureEngine::uncached(analyzer))
        }
    }

    fn params(&self) -> SimilarityParams {
        SimilarityParams {
            arch_min_length: self.config.similarity.arch_min_length,
            arch_length_padding: self.config.similarity.arch_length_padding,
        }
    }
}

/// One replayed answer: `name=y` or `name=n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub name: String,
    pub liked: bool,
}

impl FromStr for Answer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, answer) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected <name>=<y|n>, got '{s}'"))?;
        let liked = match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            other => return Err(format!("answer must be y or n, got '{other}'")),
        };
        if name.is_empty() {
            return Err("piece name is empty".to_string());
        }
        Ok(Answer {
            name: name.to_string(),
            liked,
        })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, if self.liked { "y" } else { "n" })
    }
}

/// Read a piece document. An empty id becomes the file stem.
pub fn load_piece(path: &Path) -> Result<Piece> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut piece: Piece = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing piece {}", path.display()))?;

    if piece.id.is_empty() {
        piece.id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
    }
    Ok(piece)
}

fn load_pieces(paths: &[PathBuf]) -> Result<Vec<Piece>> {
    paths.iter().map(|p| load_piece(p)).collect()
}

/// Piece documents (`*.json`) directly inside `dir`, sorted by path.
fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn features(session: &Session, paths: &[PathBuf]) -> Result<()> {
    let pieces = load_pieces(paths)?;
    let vectors = session.engine()?.features_batch(&pieces)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &vectors)?;
    writeln!(out)?;
    Ok(())
}

pub fn compare(session: &Session, a: &Path, b: &Path, breakdown: bool) -> Result<()> {
    let engine = session.engine()?;
    let fa = engine.features(&load_piece(a)?)?;
    let fb = engine.features(&load_piece(b)?)?;

    let report = similarity_report(&fa, &fb, &session.params())
        .with_context(|| format!("comparing {} and {}", fa.piece_id, fb.piece_id))?;

    println!("{}", report.score);
    if breakdown {
        for term in &report.terms {
            println!("  {:<24} x{}  {:.4}", format!("{:?}", term.term), term.weight, term.score);
        }
    }
    Ok(())
}

pub fn pairs(session: &Session, dir: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let dir = dir.unwrap_or(session.config.paths.corpus_dir.as_path());
    let files = corpus_files(dir)?;
    if files.len() < 2 {
        bail!("need at least two piece documents in {}, found {}", dir.display(), files.len());
    }

    let pieces = load_pieces(&files)?;
    let vectors = session.engine()?.features_batch(&pieces)?;
    let result = score_all(&vectors, &session.params());

    if !result.skipped.is_empty() {
        warn!(skipped = result.skipped.len(), "some pairs could not be scored");
    }

    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(BufWriter::new(file), &result.scores)?;
            info!(rows = result.scores.len(), path = %path.display(), "wrote pairwise scores");
        }
        None => write_csv(io::stdout().lock(), &result.scores)?,
    }
    Ok(())
}

pub fn recommend(scores: &Path, answers: &[Answer], k: usize) -> Result<()> {
    let file = File::open(scores).with_context(|| format!("opening {}", scores.display()))?;
    let records = read_csv(BufReader::new(file))
        .with_context(|| format!("reading {}", scores.display()))?;

    let matrix = SimilarityMatrix::from_scores(&records);
    if matrix.is_empty() {
        bail!("{} contains no scores", scores.display());
    }
    info!(pieces = matrix.len(), "loaded similarity matrix");

    let mut recommender = Recommender::new(matrix);
    for answer in answers {
        recommender.feedback(&answer.name, answer.liked)?;
    }

    for (rank, (name, preference)) in recommender.top(k).into_iter().enumerate() {
        println!("{}. {}  ({:.4})", rank + 1, name, preference);
    }
    Ok(())
}

pub fn snippets(
    session: &Session,
    paths: &[PathBuf],
    n: Option<usize>,
    max_shift: u8,
) -> Result<()> {
    let n = n.unwrap_or(session.config.analysis.snippet_length);
    let analyzer = session.analyzer()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut emitted = 0usize;

    for path in paths {
        let piece = load_piece(path)?;
        let classes = encode(&analyzer.tokens(&piece.events));

        for snippet in windows(&classes, n)? {
            let shift = i32::from(max_shift);
            for variant in (-shift..=shift).filter_map(|s| snippet.transposed(s)) {
                serde_json::to_writer(&mut out, &variant)?;
                writeln!(out)?;
                emitted += 1;
            }
        }
    }

    out.flush()?;
    info!(snippets = emitted, window = n, "wrote training snippets");
    Ok(())
}

pub fn show_config(session: &Session, sources: &ConfigSources) {
    if sources.files.is_empty() {
        println!("# no config files found, using defaults");
    }
    for file in &sources.files {
        println!("# loaded: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env override: {}", var);
    }
    print!("{}", session.config.to_toml());
}
