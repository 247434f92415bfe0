//! ASCII folding shared by index tokenization and query sanitisation, so an
//! accented corpus word and its sanitised query form meet on one token.

use deunicode::deunicode;

/// Transliterates `text` to ASCII and lowercases it: `"Cœur"` becomes
/// `"coeur"`, `"Straße"` becomes `"strasse"`.
pub fn fold_ascii(text: &str) -> String {
    let mut folded = deunicode(text);
    folded.make_ascii_lowercase();
    folded
}

/// Folds `text` and splits it on every character outside `[a-z0-9]`.
pub fn folded_tokens(text: &str) -> Vec<String> {
    fold_ascii(text)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
