//! Per-language document indexes and the registry that owns them.

pub mod bm25;
pub mod corpus;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use bm25::Bm25Index;

use crate::lang::LanguageCode;

pub type IndexHandle = Arc<Bm25Index>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed corpus record at {}:{line}: {source}", path.display())]
    Corpus {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unreadable index {}: {source}", path.display())]
    Persisted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("index build for '{language}' did not complete: {source}")]
    Join {
        language: LanguageCode,
        #[source]
        source: tokio::task::JoinError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IndexError + '_ {
    move |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Opens `<index_dir>/<name>.json` if present; otherwise builds an index from
/// `corpus` and persists it there. `corpus` is only invoked on a miss.
pub fn build_or_open_index<F>(
    corpus: F,
    index_dir: &Path,
    name: &str,
) -> Result<Bm25Index, IndexError>
where
    F: FnOnce() -> Result<Vec<Document>, IndexError>,
{
    let path = index_dir.join(format!("{name}.json"));

    if path.is_file() {
        debug!(index = name, "opening persisted index");
        let file = File::open(&path).map_err(io_error(&path))?;
        return serde_json::from_reader(BufReader::new(file))
            .map_err(|source| IndexError::Persisted { path, source });
    }

    info!(index = name, "building index");
    let index = Bm25Index::build(corpus()?);

    fs::create_dir_all(index_dir).map_err(io_error(index_dir))?;
    let tmp = path.with_extension("json.tmp");
    let mut writer = BufWriter::new(File::create(&tmp).map_err(io_error(&tmp))?);
    serde_json::to_writer(&mut writer, &index).map_err(|source| IndexError::Persisted {
        path: tmp.clone(),
        source,
    })?;
    writer.flush().map_err(io_error(&tmp))?;
    drop(writer);
    fs::rename(&tmp, &path).map_err(io_error(&path))?;

    debug!(index = name, documents = index.len(), "index persisted");
    Ok(index)
}

/// Index handles keyed by language, built once at startup and passed to
/// the pipeline.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    handles: BTreeMap<LanguageCode, IndexHandle>,
}

impl IndexRegistry {
    /// Builds or opens every language's index concurrently on the blocking
    /// pool and waits for all of them.
    pub async fn open(
        languages: &[LanguageCode],
        corpus_dir: &Path,
        index_dir: &Path,
    ) -> Result<Self, IndexError> {
        let jobs = languages.iter().map(|language| {
            let corpus_file = corpus::corpus_path(corpus_dir, language.as_str());
            let index_dir = index_dir.to_path_buf();
            let name = language.to_string();
            let handle = tokio::task::spawn_blocking(move || {
                build_or_open_index(|| corpus::read_corpus(&corpus_file), &index_dir, &name)
            });
            async move { (language, handle.await) }
        });

        let mut handles = BTreeMap::new();
        for (language, joined) in join_all(jobs).await {
            let index = joined.map_err(|source| IndexError::Join {
                language: language.clone(),
                source,
            })??;
            if index.is_empty() {
                warn!(%language, "index has no documents");
            }
            debug!(%language, documents = index.len(), "index ready");
            handles.insert(language.clone(), Arc::new(index));
        }

        info!(languages = handles.len(), "indexes ready");
        Ok(Self { handles })
    }

    pub fn from_indexes(indexes: impl IntoIterator<Item = (LanguageCode, Bm25Index)>) -> Self {
        Self {
            handles: indexes
                .into_iter()
                .map(|(lang, index)| (lang, Arc::new(index)))
                .collect(),
        }
    }

    pub fn get(&self, language: &LanguageCode) -> Option<&IndexHandle> {
        self.handles.get(language)
    }
}
