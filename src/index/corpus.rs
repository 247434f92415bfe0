use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{Document, IndexError};

/// Path of a language's corpus file: `<dir>/<name>.jsonl`.
pub fn corpus_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.jsonl"))
}

/// Reads a JSON Lines corpus of `{"id": ..., "text": ...}` records.
/// Blank lines are skipped.
pub fn read_corpus(path: &Path) -> Result<Vec<Document>, IndexError> {
    let file = File::open(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut documents = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line).map_err(|source| IndexError::Corpus {
            path: path.to_path_buf(),
            line: n + 1,
            source,
        })?;
        documents.push(doc);
    }

    Ok(documents)
}
