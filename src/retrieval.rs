use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::index::{Document, IndexRegistry};
use crate::lang::LanguageCode;
use crate::normalize::fold_ascii;
use crate::translate::QueryTranslationMap;

/// Ranked documents retrieved for one language's query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocuments {
    pub language: LanguageCode,
    pub documents: Vec<Document>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("no translated query for '{0}'")]
    MissingQuery(LanguageCode),

    #[error("no index registered for '{0}'")]
    MissingIndex(LanguageCode),

    #[error("retrieval for '{language}' did not complete: {source}")]
    Join {
        language: LanguageCode,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl RetrievalError {
    pub fn language(&self) -> &LanguageCode {
        match self {
            Self::MissingQuery(l) | Self::MissingIndex(l) => l,
            Self::Join { language, .. } => language,
        }
    }
}

/// Transliterates to lowercase ASCII, then drops everything outside
/// `[a-z0-9 ]`.
pub fn sanitise_query(query: &str) -> String {
    fold_ascii(query)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// Runs one retrieval per language against its index, at most `concurrency`
/// at a time on the blocking pool. Results come back in `languages` order.
pub async fn retrieve_all(
    registry: &IndexRegistry,
    queries: &QueryTranslationMap,
    languages: &[LanguageCode],
    result_cap: usize,
    concurrency: usize,
) -> Result<Vec<RetrievedDocuments>, RetrievalError> {
    let mut jobs = Vec::with_capacity(languages.len());
    for language in languages {
        let query = queries
            .get(language)
            .ok_or_else(|| RetrievalError::MissingQuery(language.clone()))?;
        let index = registry
            .get(language)
            .cloned()
            .ok_or_else(|| RetrievalError::MissingIndex(language.clone()))?;
        jobs.push((language.clone(), sanitise_query(query), index));
    }

    stream::iter(jobs)
        .map(|(language, query, index)| async move {
            debug!(%language, query = %query, "retrieving");
            let documents =
                tokio::task::spawn_blocking(move || index.retrieve_top_k(&query, result_cap))
                    .await
                    .map_err(|source| RetrievalError::Join {
                        language: language.clone(),
                        source,
                    })?;
            debug!(%language, documents = documents.len(), "retrieved");
            Ok::<_, RetrievalError>(RetrievedDocuments {
                language,
                documents,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
