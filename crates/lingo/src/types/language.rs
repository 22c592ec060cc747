//! Validated language codes and language descriptors.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Error produced when a language code fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid language code '{code}': expected the form xx_yy (lowercase)")]
pub struct LanguageError {
    /// The rejected input.
    pub code: String,
}

/// A validated language code of the form `xx_yy` (lowercase).
///
/// Every code stored anywhere in the engine has passed through
/// [`LanguageCode::parse`], so downstream code never re-validates.
///
/// # Example
///
/// ```
/// use lingo::types::LanguageCode;
///
/// let code = LanguageCode::parse("pt_br").unwrap();
/// assert_eq!(code.as_str(), "pt_br");
/// assert_eq!(code.primary(), "pt");
///
/// assert!(LanguageCode::parse("PT_BR").is_err());
/// assert!(LanguageCode::parse("pt-br").is_err());
/// assert!(LanguageCode::parse("pt").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Parse and validate a language code.
    ///
    /// Accepts exactly two lowercase ASCII letters, an underscore, and two
    /// lowercase ASCII letters.
    pub fn parse(code: &str) -> Result<Self, LanguageError> {
        let bytes = code.as_bytes();
        let valid = bytes.len() == 5
            && bytes[0].is_ascii_lowercase()
            && bytes[1].is_ascii_lowercase()
            && bytes[2] == b'_'
            && bytes[3].is_ascii_lowercase()
            && bytes[4].is_ascii_lowercase();
        if valid {
            Ok(Self(code.to_string()))
        } else {
            Err(LanguageError {
                code: code.to_string(),
            })
        }
    }

    /// The full code, e.g. `"pt_br"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary subtag, e.g. `"pt"` for `"pt_br"`.
    ///
    /// Used for CLDR plural rule lookup, which keys on the language alone.
    pub fn primary(&self) -> &str {
        &self.0[..2]
    }
}

impl Display for LanguageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for LanguageCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        LanguageCode::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A language known to the engine: code, display name, enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Validated code, e.g. `pt_br`.
    pub code: LanguageCode,
    /// Human-readable display name, e.g. `Português (Brasil)`.
    pub name: String,
    /// Disabled languages are skipped by loaders and resolvers.
    pub enabled: bool,
}

/// Region defaults for bare primary subtags seen during auto-detection.
///
/// Host locales sometimes arrive as `pt` or `en` with no region. These map
/// to the canonical region the engine ships translations for.
const REGION_DEFAULTS: &[(&str, &str)] = &[
    ("en", "en_us"),
    ("pt", "pt_br"),
    ("es", "es_es"),
    ("fr", "fr_fr"),
    ("de", "de_de"),
    ("it", "it_it"),
    ("ru", "ru_ru"),
    ("ja", "ja_jp"),
    ("ko", "ko_kr"),
    ("zh", "zh_cn"),
    ("nl", "nl_nl"),
    ("pl", "pl_pl"),
    ("tr", "tr_tr"),
    ("uk", "uk_ua"),
];

/// Normalize a host-supplied locale string into a validated code.
///
/// Handles the three shapes hosts produce:
/// - `xx_yy` or `XX_YY` mixtures: lowercased, validated.
/// - `xx-YY`: the separator is rewritten to `_`, then lowercased.
/// - bare `xx`: resolved through the region defaults table.
///
/// Returns `None` when the input fits none of these shapes.
///
/// # Example
///
/// ```
/// use lingo::types::normalize_locale;
///
/// assert_eq!(normalize_locale("pt-BR").unwrap().as_str(), "pt_br");
/// assert_eq!(normalize_locale("EN_US").unwrap().as_str(), "en_us");
/// assert_eq!(normalize_locale("es").unwrap().as_str(), "es_es");
/// assert!(normalize_locale("klingon").is_none());
/// ```
pub fn normalize_locale(raw: &str) -> Option<LanguageCode> {
    let lowered = raw.trim().to_ascii_lowercase().replace('-', "_");
    if let Ok(code) = LanguageCode::parse(&lowered) {
        return Some(code);
    }
    if lowered.len() == 2 {
        let mapped = REGION_DEFAULTS
            .iter()
            .find(|(primary, _)| *primary == lowered)
            .map(|(_, full)| *full)?;
        return LanguageCode::parse(mapped).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_canonical_form() {
        assert!(LanguageCode::parse("en_us").is_ok());
        assert!(LanguageCode::parse("pt_br").is_ok());
    }

    #[test]
    fn parse_rejects_other_shapes() {
        for bad in ["en", "en-us", "EN_US", "en_USA", "e1_us", "en_u1", ""] {
            assert!(LanguageCode::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn normalize_handles_host_shapes() {
        assert_eq!(normalize_locale("pt_BR").unwrap().as_str(), "pt_br");
        assert_eq!(normalize_locale(" en-US ").unwrap().as_str(), "en_us");
        assert_eq!(normalize_locale("de").unwrap().as_str(), "de_de");
        assert!(normalize_locale("xx").is_none());
        assert!(normalize_locale("not a locale").is_none());
    }
}
