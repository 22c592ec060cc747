//! Placeholder template compilation and application.
//!
//! Templates contain zero or more `{key}` placeholders where `key` is
//! `[A-Za-z0-9_]+`. Compilation splits the string once into alternating
//! static parts and placeholder keys so application is a single interleaving
//! pass with no per-call scanning.
//!
//! Two syntaxes are deliberately left alone:
//! - `{lang:...}` references are reserved and expanded by the resolver
//!   before compilation.
//! - `%name%` tokens belong to external expansion and pass through verbatim.

mod error;
mod parse;

use std::collections::HashMap;

pub use error::TemplateError;
pub use parse::{compile, extract_keys, has_placeholders, validate};

/// A template pre-split for O(N) substitution without regex.
///
/// Invariant: `parts.len() == keys.len() + 1`. The rendered output is
/// `parts[0] + value(keys[0]) + parts[1] + ... + parts[N]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    original: String,
    parts: Vec<String>,
    keys: Vec<String>,
}

impl CompiledTemplate {
    pub(crate) fn new(original: String, parts: Vec<String>, keys: Vec<String>) -> Self {
        debug_assert_eq!(parts.len(), keys.len() + 1);
        Self {
            original,
            parts,
            keys,
        }
    }

    /// The source string this template was compiled from.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The placeholder keys, in order of appearance.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// True when the template contains at least one placeholder.
    pub fn has_placeholders(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Interleave static parts with placeholder values.
    ///
    /// A key missing from `values` is re-emitted verbatim as `{key}` so a
    /// composed pipeline (e.g. external `%...%` expansion followed by a
    /// second substitution pass) can still resolve it.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use lingo::template::compile;
    ///
    /// let t = compile("Hi {name}, you have {count} mails");
    /// let values = HashMap::from([("name".to_string(), "Ana".to_string())]);
    /// assert_eq!(t.apply(&values), "Hi Ana, you have {count} mails");
    /// ```
    pub fn apply(&self, values: &HashMap<String, String>) -> String {
        if self.keys.is_empty() {
            return self.original.clone();
        }
        let mut out = String::with_capacity(self.original.len() + 16);
        for (part, key) in self.parts.iter().zip(self.keys.iter()) {
            out.push_str(part);
            match values.get(key) {
                Some(value) => out.push_str(value),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
        }
        out.push_str(self.parts.last().map(String::as_str).unwrap_or(""));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_without_placeholders_is_identity() {
        let t = compile("plain text, no braces");
        assert_eq!(t.apply(&HashMap::new()), "plain text, no braces");
        assert!(!t.has_placeholders());
    }

    #[test]
    fn missing_value_passes_through() {
        let t = compile("Hi {name}");
        assert_eq!(t.apply(&HashMap::new()), "Hi {name}");
    }

    #[test]
    fn parts_keys_invariant() {
        let t = compile("{a} and {b} and {c}");
        assert_eq!(t.keys().len(), 3);
        // parts = ["", " and ", " and ", ""]
        assert_eq!(t.parts.len(), t.keys.len() + 1);
    }
}
