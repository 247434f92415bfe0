use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Document;
use crate::normalize::folded_tokens;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// In-memory BM25 index over one language's corpus.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bm25Index {
    documents: Vec<Document>,
    doc_lengths: Vec<u32>,
    /// term -> (document position, term count)
    postings: HashMap<String, Vec<(u32, u32)>>,
    avg_length: f64,
}

/// Lowercase ASCII alphanumeric runs after transliteration; everything else
/// separates tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> {
    folded_tokens(text).into_iter()
}

impl Bm25Index {
    pub fn build(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut docs = Vec::new();
        let mut doc_lengths = Vec::new();
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();

        for (pos, doc) in documents.into_iter().enumerate() {
            let mut counts: HashMap<String, u32> = HashMap::new();
            let mut length = 0u32;
            for token in tokenize(&doc.text) {
                *counts.entry(token).or_default() += 1;
                length += 1;
            }
            for (term, count) in counts {
                postings.entry(term).or_default().push((pos as u32, count));
            }
            doc_lengths.push(length);
            docs.push(doc);
        }

        let total: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avg_length = if docs.is_empty() {
            0.0
        } else {
            total as f64 / docs.len() as f64
        };

        Self {
            documents: docs,
            doc_lengths,
            postings,
            avg_length,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Top `k` documents for `query`, best first. Documents sharing no term
    /// with the query are never returned; equal scores keep corpus order.
    pub fn retrieve_top_k(&self, query: &str, k: usize) -> Vec<Document> {
        if k == 0 || self.documents.is_empty() {
            return Vec::new();
        }

        let n = self.documents.len() as f64;
        let mut scores = vec![0.0f64; self.documents.len()];

        let mut terms: Vec<String> = tokenize(query).collect();
        terms.sort();
        terms.dedup();

        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for &(pos, tf) in postings {
                let tf = f64::from(tf);
                let dl = f64::from(self.doc_lengths[pos as usize]);
                let norm = K1 * (1.0 - B + B * dl / self.avg_length);
                scores[pos as usize] += idf * tf * (K1 + 1.0) / (tf + norm);
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(pos, _)| self.documents[pos].clone())
            .collect()
    }
}
