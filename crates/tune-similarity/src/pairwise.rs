//! All-pairs scoring over a corpus and the `name1,name2,score` CSV format.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::similarity::{similarity_report, SimilarityError, SimilarityParams};
use crate::types::FeatureVector;

const CSV_HEADER: &str = "name1,name2,score";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub name1: String,
    pub name2: String,
    pub score: f64,
}

/// A pair that could not be scored, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub name1: String,
    pub name2: String,
    pub reason: SimilarityError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseScores {
    /// Every scored pair, in both orientations.
    pub scores: Vec<PairScore>,
    pub skipped: Vec<SkippedPair>,
}

/// Score every unordered pair of pieces, in parallel across pairs.
///
/// Output order follows input order: for `i < j`, `(i, j)` then `(j, i)`.
pub fn score_all(features: &[FeatureVector], params: &SimilarityParams) -> PairwiseScores {
    let pairs: Vec<(usize, usize)> = (0..features.len())
        .flat_map(|i| (i + 1..features.len()).map(move |j| (i, j)))
        .collect();

    info!(pieces = features.len(), pairs = pairs.len(), "scoring all pairs");

    let results: Vec<_> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let (a, b) = (&features[i], &features[j]);
            (a, b, similarity_report(a, b, params).map(|r| r.score))
        })
        .collect();

    let mut out = PairwiseScores::default();
    for (a, b, result) in results {
        match result {
            Ok(score) => {
                out.scores.push(PairScore {
                    name1: a.piece_id.clone(),
                    name2: b.piece_id.clone(),
                    score,
                });
                out.scores.push(PairScore {
                    name1: b.piece_id.clone(),
                    name2: a.piece_id.clone(),
                    score,
                });
            }
            Err(reason) => {
                warn!(name1 = %a.piece_id, name2 = %b.piece_id, %reason, "pair skipped");
                out.skipped.push(SkippedPair {
                    name1: a.piece_id.clone(),
                    name2: b.piece_id.clone(),
                    reason,
                });
            }
        }
    }

    out
}

/// The `k` best-scoring partners of `target`, highest first.
pub fn most_similar<'a>(target: &str, scores: &'a [PairScore], k: usize) -> Vec<&'a PairScore> {
    let mut partners: Vec<&PairScore> = scores
        .iter()
        .filter(|s| s.name1 == target && s.name2 != target)
        .collect();

    partners.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name2.cmp(&b.name2)));
    partners.truncate(k);
    partners
}

pub fn write_csv<W: Write>(mut out: W, scores: &[PairScore]) -> Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for s in scores {
        writeln!(out, "{},{},{}", quote(&s.name1), quote(&s.name2), s.score)?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_csv<R: BufRead>(input: R) -> Result<Vec<PairScore>> {
    let mut scores = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line = line.context("reading pairwise CSV")?;
        let lineno = index + 1;

        if index == 0 {
            if line.trim() != CSV_HEADER {
                bail!("line 1: expected header '{CSV_HEADER}', got '{}'", line.trim());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(&line).with_context(|| format!("line {lineno}"))?;
        let [name1, name2, score]: [String; 3] = fields
            .try_into()
            .map_err(|f: Vec<String>| anyhow::anyhow!("line {lineno}: expected 3 fields, got {}", f.len()))?;

        let score = score
            .trim()
            .parse::<f64>()
            .with_context(|| format!("line {lineno}: invalid score '{score}'"))?;

        scores.push(PairScore {
            name1,
            name2,
            score,
        });
    }

    Ok(scores)
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_fields(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        bail!("unterminated quoted field");
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(a: &str, b: &str, score: f64) -> PairScore {
        PairScore {
            name1: a.into(),
            name2: b.into(),
            score,
        }
    }

    #[test]
    fn csv_roundtrip_with_quoted_names() {
        let scores = vec![
            pair("bwv269", "Chorale, \"Jesu\"", 0.8125),
            pair("Chorale, \"Jesu\"", "bwv269", 0.8125),
        ];

        let mut buf = Vec::new();
        write_csv(&mut buf, &scores).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("name1,name2,score\nbwv269,\"Chorale, \"\"Jesu\"\"\",0.8125\n"));

        assert_eq!(read_csv(buf.as_slice()).unwrap(), scores);
    }

    #[test]
    fn read_rejects_bad_rows() {
        assert!(read_csv("a,b,c\n".as_bytes()).is_err());
        assert!(read_csv("name1,name2,score\nx,y\n".as_bytes()).is_err());
        assert!(read_csv("name1,name2,score\nx,y,high\n".as_bytes()).is_err());
        assert!(read_csv("name1,name2,score\n\"x,y,0.5\n".as_bytes()).is_err());
        assert_eq!(
            read_csv("name1,name2,score\nx,y,0.5\n\n".as_bytes()).unwrap(),
            vec![pair("x", "y", 0.5)]
        );
    }

    #[test]
    fn most_similar_ranks_partners() {
        let scores = vec![
            pair("a", "b", 0.4),
            pair("a", "c", 0.9),
            pair("a", "d", 0.4),
            pair("b", "a", 0.4),
            pair("a", "e", 0.1),
        ];

        let top: Vec<_> = most_similar("a", &scores, 3)
            .into_iter()
            .map(|s| s.name2.as_str())
            .collect();

        assert_eq!(top, vec!["c", "b", "d"]);
        assert!(most_similar("zzz", &scores, 3).is_empty());
    }
}
