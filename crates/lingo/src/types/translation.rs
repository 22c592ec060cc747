//! Translation entries and plural form sets.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LanguageCode;
use crate::plural::PluralCategory;

/// Where a translation entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationOrigin {
    /// Loaded from a namespace's YAML files.
    File,
    /// Created through the dynamic API at runtime.
    Api,
    /// Written by the download/merge pipeline.
    Sync,
    /// Imported from a user-supplied file.
    Import,
}

/// The CLDR plural forms of a translation.
///
/// `other` is mandatory; every other category is optional. Lookup falls back
/// to `other` when the selected category has no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct PluralForms {
    pub zero: Option<String>,
    pub one: Option<String>,
    pub two: Option<String>,
    pub few: Option<String>,
    pub many: Option<String>,
    /// Required default form.
    pub other: String,
}

impl PluralForms {
    /// The text for a category, if that category was provided.
    pub fn get(&self, category: PluralCategory) -> Option<&str> {
        match category {
            PluralCategory::Zero => self.zero.as_deref(),
            PluralCategory::One => self.one.as_deref(),
            PluralCategory::Two => self.two.as_deref(),
            PluralCategory::Few => self.few.as_deref(),
            PluralCategory::Many => self.many.as_deref(),
            PluralCategory::Other => Some(&self.other),
        }
    }

    /// The text for a category, falling back to `other`.
    pub fn select(&self, category: PluralCategory) -> &str {
        self.get(category).unwrap_or(&self.other)
    }

    /// True when no optional category is present.
    pub fn is_other_only(&self) -> bool {
        self.zero.is_none()
            && self.one.is_none()
            && self.two.is_none()
            && self.few.is_none()
            && self.many.is_none()
    }
}

/// A single translatable entry: `(language, namespace, key) → template`.
///
/// The registry owns these exclusively; everything else holds `Arc` clones
/// or derived strings.
///
/// # Example
///
/// ```
/// use lingo::types::{LanguageCode, Translation, TranslationOrigin};
///
/// let t = Translation::builder()
///     .namespace("app")
///     .key("hello")
///     .language(LanguageCode::parse("pt_br").unwrap())
///     .text("Olá, {name}!")
///     .origin(TranslationOrigin::File)
///     .build();
/// assert_eq!(t.text, "Olá, {name}!");
/// assert!(t.plural_forms.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct Translation {
    pub namespace: String,
    pub key: String,
    pub language: LanguageCode,
    /// Canonical scalar form, used whenever no count is supplied.
    pub text: String,
    /// Present only for plural-aware entries; `other` always present inside.
    pub plural_forms: Option<PluralForms>,
    pub origin: TranslationOrigin,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
    /// md5 of `text` at the last successful upload, when known.
    pub source_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_forms_fall_back_to_other() {
        let forms = PluralForms::builder()
            .one("1 item".to_string())
            .other("{count} items".to_string())
            .build();
        assert_eq!(forms.select(PluralCategory::One), "1 item");
        assert_eq!(forms.select(PluralCategory::Few), "{count} items");
        assert_eq!(forms.get(PluralCategory::Few), None);
        assert!(!forms.is_other_only());
    }
}
