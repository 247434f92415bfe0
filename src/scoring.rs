//! Term scoring: picks the terms most characteristic of a pooled corpus.
//!
//! Each term gets `avg_freq * idf`, where `avg_freq` is its mean normalized
//! frequency over the documents that contain it and `idf` is the smoothed
//! `ln((1 + N) / (1 + doc_count))`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScoringError {
    #[error("document {index} has no tokens")]
    EmptyDocument { index: usize },
}

/// Normalized term frequencies of one document, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFrequencyVector<'a> {
    entries: Vec<(&'a str, f64)>,
}

impl<'a> TermFrequencyVector<'a> {
    /// Splits on whitespace and divides each term count by the token count.
    pub fn from_document(document: &'a str) -> Option<Self> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut total = 0usize;

        for token in document.split_whitespace() {
            total += 1;
            match positions.entry(token) {
                Entry::Occupied(e) => counts[*e.get()].1 += 1,
                Entry::Vacant(e) => {
                    e.insert(counts.len());
                    counts.push((token, 1));
                }
            }
        }

        if total == 0 {
            return None;
        }

        let entries = counts
            .into_iter()
            .map(|(term, count)| (term, count as f64 / total as f64))
            .collect();
        Some(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.entries.iter().copied()
    }
}

/// Corpus-level statistics for one term.
#[derive(Debug, Clone, PartialEq)]
pub struct TermScore {
    pub term: String,
    pub doc_count: usize,
    pub avg_freq: f64,
    pub idf: f64,
    pub score: f64,
}

pub fn smoothed_idf(total_documents: usize, doc_count: usize) -> f64 {
    ((1 + total_documents) as f64 / (1 + doc_count) as f64).ln()
}

/// Scores every term of the corpus. Output is in first-seen order.
pub fn term_scores<S: AsRef<str>>(documents: &[S]) -> Result<Vec<TermScore>, ScoringError> {
    let vectors = documents
        .iter()
        .enumerate()
        .map(|(index, doc)| {
            TermFrequencyVector::from_document(doc.as_ref())
                .ok_or(ScoringError::EmptyDocument { index })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // (term, doc_count, frequency sum)
    let mut stats: Vec<(&str, usize, f64)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for vector in &vectors {
        for (term, freq) in vector.iter() {
            match positions.entry(term) {
                Entry::Occupied(e) => {
                    let s = &mut stats[*e.get()];
                    s.1 += 1;
                    s.2 += freq;
                }
                Entry::Vacant(e) => {
                    e.insert(stats.len());
                    stats.push((term, 1, freq));
                }
            }
        }
    }

    let total = vectors.len();
    Ok(stats
        .into_iter()
        .map(|(term, doc_count, freq_sum)| {
            let avg_freq = freq_sum / doc_count as f64;
            let idf = smoothed_idf(total, doc_count);
            TermScore {
                term: term.to_string(),
                doc_count,
                avg_freq,
                idf,
                score: avg_freq * idf,
            }
        })
        .collect())
}

/// Returns the `top_k` highest-scoring terms.
///
/// Ties keep first-seen order (documents in input order, tokens left to right).
pub fn score_terms<S: AsRef<str>>(
    documents: &[S],
    top_k: usize,
) -> Result<Vec<String>, ScoringError> {
    if top_k == 0 || documents.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored = term_scores(documents)?;
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    for s in &scored {
        debug!(
            term = %s.term,
            score = s.score,
            avg_freq = s.avg_freq,
            idf = s.idf,
            doc_count = s.doc_count,
            "selected term"
        );
    }
    Ok(scored.into_iter().map(|s| s.term).collect())
}
