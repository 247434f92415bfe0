use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::ApiKey;
use crate::lang::{LanguageCode, parse_language_list};

const PLACEHOLDER_API_KEY: &str = "YOUR API KEY";
const DEFAULT_LANGUAGES: &str = "en,fr,it,es";
const DEFAULT_COMMON_LANGUAGE: &str = "en";
const DEFAULT_CORPUS_DIR: &str = "corpora";
const DEFAULT_INDEX_DIR: &str = "indices";
const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("LANGUAGE_DETECT_API_KEY not set. Get one at https://detectlanguage.com")]
    ApiKeyNotSet,

    #[error("LANGUAGE_DETECT_API_KEY still holds the placeholder value; replace it with your API key")]
    PlaceholderApiKey,

    #[error("EXPAND_LANGUAGES must list at least one language")]
    NoLanguages,

    #[error("EXPAND_LANGUAGES lists '{0}' more than once")]
    DuplicateLanguage(LanguageCode),

    #[error("common language '{0}' is not in EXPAND_LANGUAGES")]
    CommonLanguageUnsupported(LanguageCode),

    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Startup configuration, read once from the environment.
///
/// - `LANGUAGE_DETECT_API_KEY`: detection credential (required)
/// - `EXPAND_LANGUAGES`: comma-separated supported languages (default `en,fr,it,es`)
/// - `EXPAND_COMMON_LANGUAGE`: language documents are pooled in (default `en`)
/// - `EXPAND_CORPUS_DIR` / `EXPAND_INDEX_DIR`: corpus and index locations
/// - `EXPAND_CONCURRENCY`: in-flight units per stage (default 8)
/// - `EXPAND_UNIT_TIMEOUT_SECS`: deadline per translation unit (default 30)
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: ApiKey,
    pub languages: Vec<LanguageCode>,
    pub common_language: LanguageCode,
    pub corpus_dir: PathBuf,
    pub index_dir: PathBuf,
    pub concurrency: usize,
    pub unit_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("LANGUAGE_DETECT_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::ApiKeyNotSet)?;
        if api_key == PLACEHOLDER_API_KEY {
            return Err(ConfigError::PlaceholderApiKey);
        }

        let languages = parse_language_list(
            &lookup("EXPAND_LANGUAGES").unwrap_or_else(|| DEFAULT_LANGUAGES.to_string()),
        );
        if languages.is_empty() {
            return Err(ConfigError::NoLanguages);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = languages.iter().find(|l| !seen.insert(*l)) {
            return Err(ConfigError::DuplicateLanguage(dup.clone()));
        }

        let common_language = LanguageCode::new(
            &lookup("EXPAND_COMMON_LANGUAGE").unwrap_or_else(|| DEFAULT_COMMON_LANGUAGE.to_string()),
        );
        if !languages.contains(&common_language) {
            return Err(ConfigError::CommonLanguageUnsupported(common_language));
        }

        let dir = |var: &str, default: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        let corpus_dir = dir("EXPAND_CORPUS_DIR", DEFAULT_CORPUS_DIR);
        let index_dir = dir("EXPAND_INDEX_DIR", DEFAULT_INDEX_DIR);

        let concurrency = positive(&lookup, "EXPAND_CONCURRENCY", DEFAULT_CONCURRENCY as u64)?;
        let timeout_secs = positive(&lookup, "EXPAND_UNIT_TIMEOUT_SECS", DEFAULT_UNIT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key: ApiKey::new(api_key),
            languages,
            common_language,
            corpus_dir,
            index_dir,
            concurrency: concurrency as usize,
            unit_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidNumber { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("LANGUAGE_DETECT_API_KEY", "abc")]).unwrap();
        assert_eq!(cfg.api_key.expose(), "abc");
        assert_eq!(cfg.languages.len(), 4);
        assert_eq!(cfg.common_language.as_str(), "en");
        assert_eq!(cfg.corpus_dir, PathBuf::from("corpora"));
        assert_eq!(cfg.index_dir, PathBuf::from("indices"));
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.unit_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_or_blank_key_is_fatal() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::ApiKeyNotSet);
        assert_eq!(
            config(&[("LANGUAGE_DETECT_API_KEY", "  ")]).unwrap_err(),
            ConfigError::ApiKeyNotSet
        );
    }

    #[test]
    fn placeholder_key_is_fatal() {
        let err = config(&[("LANGUAGE_DETECT_API_KEY", "YOUR API KEY")]).unwrap_err();
        assert_eq!(err, ConfigError::PlaceholderApiKey);
    }

    #[test]
    fn custom_languages() {
        let cfg = config(&[
            ("LANGUAGE_DETECT_API_KEY", "k"),
            ("EXPAND_LANGUAGES", "de, nl"),
            ("EXPAND_COMMON_LANGUAGE", "NL"),
        ])
        .unwrap();
        assert_eq!(cfg.languages, vec![LanguageCode::new("de"), LanguageCode::new("nl")]);
        assert_eq!(cfg.common_language.as_str(), "nl");
    }

    #[test]
    fn common_language_must_be_supported() {
        let err = config(&[
            ("LANGUAGE_DETECT_API_KEY", "k"),
            ("EXPAND_LANGUAGES", "fr,it"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::CommonLanguageUnsupported("en".into()));
    }

    #[test]
    fn duplicate_and_empty_languages_rejected() {
        let dup = config(&[("LANGUAGE_DETECT_API_KEY", "k"), ("EXPAND_LANGUAGES", "en,fr,EN")]);
        assert_eq!(dup.unwrap_err(), ConfigError::DuplicateLanguage("en".into()));

        let empty = config(&[("LANGUAGE_DETECT_API_KEY", "k"), ("EXPAND_LANGUAGES", ",")]);
        assert_eq!(empty.unwrap_err(), ConfigError::NoLanguages);
    }

    #[test]
    fn numbers_must_be_positive() {
        let err = config(&[("LANGUAGE_DETECT_API_KEY", "k"), ("EXPAND_CONCURRENCY", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: "EXPAND_CONCURRENCY", .. }));

        let err = config(&[("LANGUAGE_DETECT_API_KEY", "k"), ("EXPAND_UNIT_TIMEOUT_SECS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: "EXPAND_UNIT_TIMEOUT_SECS", .. }));
    }
}
