//! Message file extraction.

use serde_yaml::{Mapping, Value};

use super::extract_all;

/// Extracts message files, which are translatable in their entirety.
///
/// Unlike the inventory extractor there is nothing to filter: the whole
/// tree is the translation surface. The write policy still applies — only
/// the source-language file is overwritten on re-extraction.
#[derive(Debug, Default)]
pub struct MessagesExtractor;

impl MessagesExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, doc: &Value) -> Mapping {
        extract_all(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_tree_is_kept() {
        let doc: Value =
            serde_yaml::from_str("greeting: hello\nerrors:\n  not-found: nope\n").unwrap();
        let out = MessagesExtractor::new().extract(&doc);
        assert_eq!(out.len(), 2);
    }
}
