use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::EvaluateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub qid: String,
    pub query: String,
}

/// Relevant document ids per topic.
#[derive(Debug, Default)]
pub struct Qrels {
    relevant: HashMap<String, HashSet<String>>,
}

impl Qrels {
    pub fn relevant(&self, qid: &str) -> Option<&HashSet<String>> {
        self.relevant.get(qid)
    }

    pub fn len(&self) -> usize {
        self.relevant.len()
    }

    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut qrels = Self::default();
        for (qid, doc_id) in pairs {
            qrels.insert(qid, doc_id);
        }
        qrels
    }

    fn insert(&mut self, qid: &str, doc_id: &str) {
        self.relevant
            .entry(qid.to_string())
            .or_default()
            .insert(doc_id.to_string());
    }
}

fn lines(path: &Path) -> Result<impl Iterator<Item = (usize, std::io::Result<String>)>, EvaluateError> {
    let file = File::open(path).map_err(|source| EvaluateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line)))
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> EvaluateError {
    EvaluateError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Reads `qid<TAB>query` lines. Blank lines are skipped.
pub fn read_topics(path: &Path) -> Result<Vec<Topic>, EvaluateError> {
    let mut topics = Vec::new();
    for (line_no, line) in lines(path)? {
        let line = line.map_err(|source| EvaluateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let Some((qid, query)) = line.split_once('\t') else {
            return Err(parse_error(path, line_no, "expected `qid<TAB>query`"));
        };
        let (qid, query) = (qid.trim(), query.trim());
        if qid.is_empty() || query.is_empty() {
            return Err(parse_error(path, line_no, "empty topic id or query"));
        }
        topics.push(Topic {
            qid: qid.to_string(),
            query: query.to_string(),
        });
    }
    Ok(topics)
}

/// Reads relevance judgements in TREC (`qid iter docno rel`) or BEIR
/// (`query-id corpus-id score`, with a header line) layout. Only grades
/// above zero are kept.
pub fn read_qrels(path: &Path) -> Result<Qrels, EvaluateError> {
    let mut qrels = Qrels::default();
    for (line_no, line) in lines(path)? {
        let line = line.map_err(|source| EvaluateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (qid, doc_id, grade) = match fields.as_slice() {
            [] => continue,
            [qid, _, doc_id, grade] | [qid, doc_id, grade] => (*qid, *doc_id, *grade),
            _ => return Err(parse_error(path, line_no, "expected 3 or 4 fields")),
        };
        let grade: i32 = match grade.parse() {
            Ok(grade) => grade,
            Err(_) if line_no == 1 => continue,
            Err(_) => {
                return Err(parse_error(path, line_no, format!("invalid grade '{grade}'")));
            }
        };
        if grade > 0 {
            qrels.insert(qid, doc_id);
        }
    }
    Ok(qrels)
}
