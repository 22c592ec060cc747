//! Template scanning with winnow.

use winnow::combinator::{alt, delimited, repeat};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use super::{CompiledTemplate, TemplateError};

/// One scanned piece of a template string.
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A well-formed placeholder body: `[A-Za-z0-9_]+`.
fn placeholder_key(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse `{key}`.
fn placeholder<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited('{', take_while(1.., placeholder_key), '}').parse_next(input)
}

/// Parse a run of literal characters up to the next `{`.
fn literal_run<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c| c != '{').parse_next(input)
}

/// Parse one segment. A `{` that does not open a well-formed placeholder is
/// consumed as a single literal character.
fn segment(input: &mut &str) -> ModalResult<Segment> {
    alt((
        placeholder.map(|key: &str| Segment::Placeholder(key.to_string())),
        literal_run.map(|text: &str| Segment::Literal(text.to_string())),
        any.map(|c: char| Segment::Literal(c.to_string())),
    ))
    .parse_next(input)
}

/// Compile a template string into its split form.
///
/// Compilation never fails: malformed braces and reserved constructs are
/// kept as literal text. Use [`validate`] to reject them instead.
///
/// # Example
///
/// ```
/// use lingo::template::compile;
///
/// let t = compile("Olá, {name}!");
/// assert_eq!(t.keys(), ["name"]);
/// assert_eq!(t.original(), "Olá, {name}!");
/// ```
pub fn compile(input: &str) -> CompiledTemplate {
    let mut remaining = input;
    let segments: Vec<Segment> = repeat(0.., segment)
        .parse_next(&mut remaining)
        .unwrap_or_default();

    let mut parts = vec![String::new()];
    let mut keys = Vec::new();
    for seg in segments {
        match seg {
            Segment::Literal(text) => {
                if let Some(last) = parts.last_mut() {
                    last.push_str(&text);
                }
            }
            Segment::Placeholder(key) => {
                keys.push(key);
                parts.push(String::new());
            }
        }
    }
    CompiledTemplate::new(input.to_string(), parts, keys)
}

/// True when the string contains at least one well-formed placeholder.
pub fn has_placeholders(input: &str) -> bool {
    !extract_keys(input).is_empty()
}

/// The placeholder keys of a template, in order of appearance.
pub fn extract_keys(input: &str) -> Vec<String> {
    compile(input).keys().to_vec()
}

/// Validate a template string.
///
/// Rejects unbalanced braces and placeholder content outside the allowed
/// set. The reserved `{lang:...}` form is accepted here because it is
/// expanded before compilation; `%name%` tokens are not inspected at all.
///
/// # Example
///
/// ```
/// use lingo::template::validate;
///
/// assert!(validate("Hi {name}").is_ok());
/// assert!(validate("{lang:common.prefix} Hi").is_ok());
/// assert!(validate("Hi %server%").is_ok());
/// assert!(validate("Hi {na me}").is_err());
/// assert!(validate("Hi {name").is_err());
/// ```
pub fn validate(input: &str) -> Result<(), TemplateError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                let close = bytes[i + 1..]
                    .iter()
                    .position(|&b| b == b'}' || b == b'{')
                    .map(|offset| i + 1 + offset);
                match close {
                    Some(end) if bytes[end] == b'}' => {
                        let content = &input[i + 1..end];
                        if content.is_empty() {
                            return Err(TemplateError::EmptyPlaceholder { position: i });
                        }
                        let reserved = content.starts_with("lang:");
                        if !reserved && !content.chars().all(placeholder_key) {
                            return Err(TemplateError::InvalidPlaceholder {
                                content: content.to_string(),
                                position: i,
                            });
                        }
                        i = end + 1;
                    }
                    _ => return Err(TemplateError::UnbalancedBrace { position: i }),
                }
            }
            b'}' => return Err(TemplateError::UnbalancedBrace { position: i }),
            _ => i += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_splits_alternating() {
        let t = compile("a {x} b {y} c");
        assert_eq!(t.keys(), ["x", "y"]);
    }

    #[test]
    fn stray_brace_is_literal() {
        let t = compile("set {a b} end");
        assert!(t.keys().is_empty());
        assert_eq!(t.original(), "set {a b} end");
    }

    #[test]
    fn lang_reference_is_not_a_placeholder() {
        let t = compile("{lang:common.prefix} hello");
        assert!(t.keys().is_empty());
    }

    #[test]
    fn percent_tokens_ignored() {
        let t = compile("hello %player_name%");
        assert!(t.keys().is_empty());
        assert!(validate("hello %player_name%").is_ok());
    }

    #[test]
    fn validate_rejects_unbalanced() {
        assert_eq!(
            validate("oops {name"),
            Err(TemplateError::UnbalancedBrace { position: 5 })
        );
        assert_eq!(
            validate("oops } here"),
            Err(TemplateError::UnbalancedBrace { position: 5 })
        );
        assert_eq!(
            validate("{a}{"),
            Err(TemplateError::UnbalancedBrace { position: 3 })
        );
    }

    #[test]
    fn validate_rejects_bad_content() {
        assert!(matches!(
            validate("{a b}"),
            Err(TemplateError::InvalidPlaceholder { .. })
        ));
        assert_eq!(
            validate("x {} y"),
            Err(TemplateError::EmptyPlaceholder { position: 2 })
        );
        assert!(validate("{lang:anything goes.here}").is_ok());
    }
}
