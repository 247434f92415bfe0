use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::{TranslateError, Translator};
use crate::lang::{LanguageCode, Query};
use crate::retrieval::RetrievedDocuments;

/// Concurrency cap and per-unit deadline shared by every fan-out stage.
#[derive(Debug, Clone, Copy)]
pub struct FanOutLimits {
    pub concurrency: usize,
    pub unit_timeout: Duration,
}

impl FanOutLimits {
    async fn run<F>(&self, unit: F) -> Result<String, TranslateError>
    where
        F: Future<Output = Result<String, TranslateError>>,
    {
        tokio::time::timeout(self.unit_timeout, unit)
            .await
            .unwrap_or_else(|_| Err(TranslateError::Timeout(self.unit_timeout)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FanOutError {
    #[error("query translation to '{language}' failed: {source}")]
    Query {
        language: LanguageCode,
        #[source]
        source: TranslateError,
    },

    #[error("translation of document {index} from '{language}' failed: {source}")]
    Document {
        language: LanguageCode,
        index: usize,
        #[source]
        source: TranslateError,
    },
}

/// One query text per supported language, including the untranslated source.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTranslationMap {
    entries: BTreeMap<LanguageCode, String>,
}

impl QueryTranslationMap {
    pub fn get(&self, language: &LanguageCode) -> Option<&str> {
        self.entries.get(language).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LanguageCode, &str)> {
        self.entries.iter().map(|(l, q)| (l, q.as_str()))
    }
}

/// Translates `query` into every language in `languages`.
///
/// The source language keeps the original text without a call. The first
/// failing unit aborts the stage; dropping the stream cancels its siblings.
pub async fn translate_query<T: Translator>(
    translator: &T,
    query: &Query,
    languages: &[LanguageCode],
    limits: FanOutLimits,
) -> Result<QueryTranslationMap, FanOutError> {
    let mut entries = BTreeMap::new();
    entries.insert(query.language.clone(), query.text.clone());

    let targets = languages.iter().filter(|l| **l != query.language);
    let mut units = stream::iter(targets)
        .map(|target| async move {
            let outcome = limits
                .run(translator.translate(&query.text, &query.language, target))
                .await;
            (target, outcome)
        })
        .buffer_unordered(limits.concurrency.max(1));

    while let Some((target, outcome)) = units.next().await {
        match outcome {
            Ok(text) => {
                debug!(language = %target, "query translated");
                entries.insert(target.clone(), text);
            }
            Err(source) => {
                warn!(language = %target, error = %source, "query translation failed");
                return Err(FanOutError::Query {
                    language: target.clone(),
                    source,
                });
            }
        }
    }

    Ok(QueryTranslationMap { entries })
}

/// Translates every retrieved document into `target` and pools the results.
///
/// One unit per document writes into its own `(language, index)` slot of a
/// buffer pre-sized per language, so the output order follows the input
/// regardless of completion order.
pub async fn translate_documents<T: Translator>(
    translator: &T,
    retrieved: &[RetrievedDocuments],
    target: &LanguageCode,
    limits: FanOutLimits,
) -> Result<Vec<String>, FanOutError> {
    let mut slots: Vec<Vec<Option<String>>> = retrieved
        .iter()
        .map(|set| vec![None; set.documents.len()])
        .collect();

    let units = retrieved.iter().enumerate().flat_map(|(lang_slot, set)| {
        set.documents
            .iter()
            .enumerate()
            .map(move |(index, doc)| (lang_slot, index, &set.language, doc.text.as_str()))
    });

    let mut units = stream::iter(units)
        .map(|(lang_slot, index, source, text)| async move {
            let outcome = limits.run(translator.translate(text, source, target)).await;
            (lang_slot, index, outcome)
        })
        .buffer_unordered(limits.concurrency.max(1));

    while let Some((lang_slot, index, outcome)) = units.next().await {
        match outcome {
            Ok(text) => slots[lang_slot][index] = Some(text),
            Err(source) => {
                let language = retrieved[lang_slot].language.clone();
                warn!(%language, index, error = %source, "document translation failed");
                return Err(FanOutError::Document {
                    language,
                    index,
                    source,
                });
            }
        }
    }

    Ok(slots.into_iter().flatten().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;
    use std::sync::Mutex;

    /// Prefixes text with the target code; optionally fails or stalls on a given input.
    struct FakeTranslator {
        calls: Mutex<Vec<(String, String, String)>>,
        fail_on: Option<&'static str>,
        stall_on: Option<&'static str>,
    }

    impl FakeTranslator {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                stall_on: None,
            }
        }

        fn failing_on(text: &'static str) -> Self {
            Self {
                fail_on: Some(text),
                ..Self::new()
            }
        }

        fn stalling_on(text: &'static str) -> Self {
            Self {
                stall_on: Some(text),
                ..Self::new()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Translator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            source: &LanguageCode,
            target: &LanguageCode,
        ) -> Result<String, TranslateError> {
            self.calls.lock().unwrap().push((
                text.to_string(),
                source.to_string(),
                target.to_string(),
            ));
            // Later documents finish first, to shuffle completion order.
            let delay = 20u64.saturating_sub(text.len() as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.stall_on == Some(text) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_on == Some(text) {
                return Err(TranslateError::Api {
                    code: 500,
                    message: "boom".into(),
                });
            }
            Ok(format!("[{target}] {text}"))
        }
    }

    fn limits() -> FanOutLimits {
        FanOutLimits {
            concurrency: 4,
            unit_timeout: Duration::from_secs(5),
        }
    }

    fn langs(codes: &[&str]) -> Vec<LanguageCode> {
        codes.iter().map(|c| LanguageCode::new(c)).collect()
    }

    fn retrieved(language: &str, texts: &[&str]) -> RetrievedDocuments {
        RetrievedDocuments {
            language: language.into(),
            documents: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Document {
                    id: format!("{language}-{i}"),
                    text: t.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn query_map_has_one_entry_per_language() {
        let translator = FakeTranslator::new();
        let query = Query::new("black cat", "en".into());
        let languages = langs(&["en", "fr", "it", "es"]);

        let map = translate_query(&translator, &query, &languages, limits())
            .await
            .unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&"en".into()), Some("black cat"));
        assert_eq!(map.get(&"fr".into()), Some("[fr] black cat"));
        assert_eq!(map.get(&"es".into()), Some("[es] black cat"));
        assert_eq!(translator.call_count(), 3);
    }

    #[tokio::test]
    async fn query_source_not_translated() {
        let translator = FakeTranslator::new();
        let query = Query::new("chat", "fr".into());

        let map = translate_query(&translator, &query, &langs(&["fr"]), limits())
            .await
            .unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(translator.call_count(), 0);
    }

    #[tokio::test]
    async fn query_unit_failure_names_language() {
        let translator = FakeTranslator::failing_on("boom query");
        let query = Query::new("boom query", "en".into());

        let err = translate_query(&translator, &query, &langs(&["en", "fr"]), limits())
            .await
            .unwrap_err();

        match err {
            FanOutError::Query { language, .. } => assert_eq!(language.as_str(), "fr"),
            other => panic!("expected query failure, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_unit_timeout_is_reported() {
        let translator = FakeTranslator::stalling_on("slow");
        let query = Query::new("slow", "en".into());
        let limits = FanOutLimits {
            concurrency: 2,
            unit_timeout: Duration::from_millis(50),
        };

        let err = translate_query(&translator, &query, &langs(&["en", "it"]), limits)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FanOutError::Query {
                source: TranslateError::Timeout(_),
                ..
            }
        ));
        assert!(err.to_string().contains("timed out after 50ms"), "got: {err}");
    }

    #[tokio::test]
    async fn document_unit_timeout_names_document() {
        let translator = FakeTranslator::stalling_on("stuck");
        let sets = vec![retrieved("fr", &["quick"]), retrieved("es", &["fast", "stuck"])];
        let limits = FanOutLimits {
            concurrency: 3,
            unit_timeout: Duration::from_millis(50),
        };

        let err = translate_documents(&translator, &sets, &"en".into(), limits)
            .await
            .unwrap_err();

        match err {
            FanOutError::Document {
                language,
                index,
                source: TranslateError::Timeout(after),
            } => {
                assert_eq!(language.as_str(), "es");
                assert_eq!(index, 1);
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected document timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn documents_pool_in_input_order() {
        let translator = FakeTranslator::new();
        let sets = vec![
            retrieved("fr", &["a", "bbbbbbbbbb", "ccc"]),
            retrieved("en", &[]),
            retrieved("it", &["dddddd", "e"]),
        ];

        let pooled = translate_documents(&translator, &sets, &"en".into(), limits())
            .await
            .unwrap();

        assert_eq!(
            pooled,
            vec![
                "[en] a",
                "[en] bbbbbbbbbb",
                "[en] ccc",
                "[en] dddddd",
                "[en] e",
            ]
        );
    }

    #[tokio::test]
    async fn documents_one_unit_per_document() {
        let translator = FakeTranslator::new();
        let sets = vec![retrieved("fr", &["x", "y"]), retrieved("es", &["z"])];

        let pooled = translate_documents(&translator, &sets, &"en".into(), limits())
            .await
            .unwrap();

        let expected: usize = sets.iter().map(|s| s.documents.len()).sum();
        assert_eq!(pooled.len(), expected);
        assert_eq!(translator.call_count(), 3);
        let calls = translator.calls.lock().unwrap();
        assert!(calls.iter().any(|(t, s, _)| t == "z" && s == "es"));
    }

    #[tokio::test]
    async fn document_failure_names_language_and_index() {
        let translator = FakeTranslator::failing_on("bad");
        let sets = vec![retrieved("fr", &["ok"]), retrieved("it", &["fine", "bad"])];

        let err = translate_documents(&translator, &sets, &"en".into(), limits())
            .await
            .unwrap_err();

        match err {
            FanOutError::Document {
                language, index, ..
            } => {
                assert_eq!(language.as_str(), "it");
                assert_eq!(index, 1);
            }
            other => panic!("expected document failure, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_documents_no_calls() {
        let translator = FakeTranslator::new();
        let pooled = translate_documents(&translator, &[], &"en".into(), limits())
            .await
            .unwrap();
        assert!(pooled.is_empty());
        assert_eq!(translator.call_count(), 0);
    }
}
