//! CLDR plural category selection.
//!
//! Different languages have different plural rules - English has "one" and
//! "other", Russian has "one", "few", "many", and "other", and Arabic uses
//! all six categories. Selection goes through a per-language override
//! registry first, then falls back to the ICU CLDR tables keyed on the
//! primary subtag; an unknown language uses English rules.

use std::collections::HashMap;

use icu_locale_core::{Locale, locale};
use icu_plurals::{PluralRuleType, PluralRules};
use thiserror::Error;

use crate::types::LanguageCode;

/// A CLDR plural category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    /// The lowercase key suffix used in translation files, e.g. `"one"` in
    /// `shop.items.one`.
    pub fn suffix(self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }

    /// Parse a key suffix back into a category.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "zero" => Some(PluralCategory::Zero),
            "one" => Some(PluralCategory::One),
            "two" => Some(PluralCategory::Two),
            "few" => Some(PluralCategory::Few),
            "many" => Some(PluralCategory::Many),
            "other" => Some(PluralCategory::Other),
            _ => None,
        }
    }

    /// All categories, in CLDR order.
    pub fn all() -> [PluralCategory; 6] {
        [
            PluralCategory::Zero,
            PluralCategory::One,
            PluralCategory::Two,
            PluralCategory::Few,
            PluralCategory::Many,
            PluralCategory::Other,
        ]
    }
}

/// Negative counts have no plural category and are rejected at the entry
/// point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plural count must be non-negative, got {count}")]
pub struct NegativeCount {
    pub count: i64,
}

/// A custom plural rule: count to category.
pub type PluralRule = fn(i64) -> PluralCategory;

fn one_other(n: i64) -> PluralCategory {
    if n == 1 {
        PluralCategory::One
    } else {
        PluralCategory::Other
    }
}

/// Map a primary subtag onto an ICU locale with plural data.
///
/// Unknown languages fall back to English rules.
fn icu_locale(primary: &str) -> Locale {
    match primary {
        "en" => locale!("en"),
        "ru" => locale!("ru"),
        "ar" => locale!("ar"),
        "de" => locale!("de"),
        "es" => locale!("es"),
        "fr" => locale!("fr"),
        "it" => locale!("it"),
        "pt" => locale!("pt"),
        "ja" => locale!("ja"),
        "zh" => locale!("zh"),
        "ko" => locale!("ko"),
        "nl" => locale!("nl"),
        "pl" => locale!("pl"),
        "tr" => locale!("tr"),
        "uk" => locale!("uk"),
        "vi" => locale!("vi"),
        "th" => locale!("th"),
        "id" => locale!("id"),
        "el" => locale!("el"),
        "ro" => locale!("ro"),
        "cs" => locale!("cs"),
        "he" => locale!("he"),
        _ => locale!("en"), // fallback to English
    }
}

/// Per-language plural selection with an override registry.
///
/// # Example
///
/// ```
/// use lingo::plural::{PluralCategory, PluralSelector};
/// use lingo::types::LanguageCode;
///
/// let selector = PluralSelector::new();
/// let pt = LanguageCode::parse("pt_br").unwrap();
/// assert_eq!(selector.select(&pt, 1).unwrap(), PluralCategory::One);
/// assert_eq!(selector.select(&pt, 5).unwrap(), PluralCategory::Other);
/// assert!(selector.select(&pt, -1).is_err());
/// ```
#[derive(Debug, Default)]
pub struct PluralSelector {
    /// Full-code overrides consulted before the ICU tables.
    overrides: HashMap<String, PluralRule>,
}

impl PluralSelector {
    /// A selector with the baseline overrides registered: Portuguese,
    /// Spanish, and English use the simple one/other rule.
    pub fn new() -> Self {
        let mut selector = Self {
            overrides: HashMap::new(),
        };
        for code in ["pt_br", "pt_pt", "es_es", "es_mx", "en_us", "en_gb"] {
            selector.overrides.insert(code.to_string(), one_other);
        }
        selector
    }

    /// Register or replace an override rule for a full language code.
    pub fn register_rule(&mut self, code: &LanguageCode, rule: PluralRule) {
        self.overrides.insert(code.as_str().to_string(), rule);
    }

    /// Select the plural category for a count in a language.
    ///
    /// Negative counts are rejected. Unknown languages use English rules.
    pub fn select(
        &self,
        language: &LanguageCode,
        count: i64,
    ) -> Result<PluralCategory, NegativeCount> {
        if count < 0 {
            return Err(NegativeCount { count });
        }
        if let Some(rule) = self.overrides.get(language.as_str()) {
            return Ok(rule(count));
        }
        Ok(icu_category(language.primary(), count))
    }
}

/// Get the CLDR plural category for a number via the ICU tables.
fn icu_category(primary: &str, n: i64) -> PluralCategory {
    let Ok(rules) = PluralRules::try_new(icu_locale(primary).into(), PluralRuleType::Cardinal.into())
    else {
        return one_other(n);
    };
    match rules.category_for(n) {
        icu_plurals::PluralCategory::Zero => PluralCategory::Zero,
        icu_plurals::PluralCategory::One => PluralCategory::One,
        icu_plurals::PluralCategory::Two => PluralCategory::Two,
        icu_plurals::PluralCategory::Few => PluralCategory::Few,
        icu_plurals::PluralCategory::Many => PluralCategory::Many,
        icu_plurals::PluralCategory::Other => PluralCategory::Other,
    }
}
