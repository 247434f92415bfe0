use std::fmt;

/// Short language identifier such as `en` or `fr`, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// A query text together with the language it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub language: LanguageCode,
}

impl Query {
    pub fn new(text: impl Into<String>, language: LanguageCode) -> Self {
        Self {
            text: text.into(),
            language,
        }
    }
}

/// Parses a comma-separated language list, e.g. `"en, fr,it"`.
pub fn parse_language_list(raw: &str) -> Vec<LanguageCode> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(LanguageCode::new)
        .collect()
}
