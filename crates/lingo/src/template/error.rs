//! Template validation errors.

use thiserror::Error;

/// An error found while validating a template string.
///
/// Validation is stricter than compilation: compilation treats anything that
/// is not a well-formed `{key}` placeholder as literal text, while validation
/// reports the malformed construct so authors can fix it at ingest time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{` with no matching `}`, or a stray `}`.
    #[error("unbalanced brace at byte {position}")]
    UnbalancedBrace { position: usize },

    /// Placeholder content outside `[A-Za-z0-9_]+` (the reserved `lang:`
    /// prefix is allowed at validation time and expanded upstream).
    #[error("invalid placeholder '{{{content}}}' at byte {position}")]
    InvalidPlaceholder { content: String, position: usize },

    /// A placeholder with no content at all: `{}`.
    #[error("empty placeholder at byte {position}")]
    EmptyPlaceholder { position: usize },
}
