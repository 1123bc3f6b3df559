//! Input validation and sanitization.
//!
//! Text is cleaned at three points: a captured line is sanitized before
//! anything else sees it, the sanitized text is validated on submit, and
//! user-authored content is sanitized again when rendered. The pattern
//! battery below is a heuristic layer only; the guarantee comes from
//! [`escape_html`], which leaves none of `< > & " ' /` in raw form.
//!
//! Anything printed to the terminal also goes through [`strip_control`], so
//! server text cannot smuggle escape sequences onto the screen.
//!
//! [`sanitize`] is idempotent: stripping runs to a fixpoint and escaping
//! never re-escapes an entity it could have produced itself.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::error::ValidationError;

pub const MAX_CHAT_CHARS: usize = 5000;
pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 100;

/// What kind of field a piece of text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Chat,
    Name,
}

impl InputKind {
    fn subject(self) -> &'static str {
        match self {
            InputKind::Chat => "Message",
            InputKind::Name => "Name",
        }
    }
}

/// A refused input, with a cleaned fallback when one is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct Rejection {
    pub error: ValidationError,
    pub sanitized: Option<String>,
}

impl Rejection {
    fn bare(error: ValidationError) -> Self {
        Self { error, sanitized: None }
    }

    fn with_fallback(error: ValidationError, raw: &str) -> Self {
        Self { error, sanitized: Some(sanitize(raw)) }
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

static DETECTORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<script.*?>.*?</script>",
        r"(?i)javascript:",
        r"(?i)on[a-z0-9_]+\s*=",
        r"(?is)<iframe.*?>.*?</iframe>",
        r"(?is)<object.*?>.*?</object>",
        r"(?is)<embed.*?>",
        r"(?is)<link.*?>",
        r"(?is)<meta.*?>",
        r"(?is)<style.*?>.*?</style>",
        r"(?i)data:text/html",
        r"(?i)vbscript:",
        // ASCII word boundaries: a preceding accented letter does not shield a keyword.
        r"(?i)(?-u:\b)(select|insert|update|delete|drop|create|alter|exec|execute|union|script)(?-u:\b)",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});

// Order matters: the quoted handler form must go before the bare one.
static STRIPPERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<script.*?>.*?</script>",
        r"(?is)<iframe.*?>.*?</iframe>",
        r"(?is)<object.*?>.*?</object>",
        r"(?is)<style.*?>.*?</style>",
        r"(?is)<embed.*?>",
        r"(?is)<link.*?>",
        r"(?is)<meta.*?>",
        r"(?i)javascript:",
        r"(?i)vbscript:",
        r"(?i)data:text/html",
        r#"(?i)on[a-z0-9_]+\s*=\s*["'][^"']*["']"#,
        r"(?i)on[a-z0-9_]+\s*=\s*[^\s>]*",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});

static NAME_CHARS: Lazy<Regex> = Lazy::new(|| re(r"^[\p{L}\p{N}\s\-'.,]+$"));

/// Entity bodies (text after `&`) that [`escape_html`] emits.
const ENTITIES: [&str; 6] = ["amp;", "lt;", "gt;", "quot;", "#x27;", "#x2F;"];

/// HTML-escape `< > & " ' /`. An `&` that already opens one of the
/// entities this function produces is left alone.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '&' => {
                let rest = &text[i + 1..];
                if ENTITIES.iter().any(|e| rest.starts_with(e)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// True when the lower-cased input trips any pattern in the battery.
pub fn contains_malicious_content(input: &str) -> bool {
    let normalized = input.to_lowercase();
    DETECTORS.iter().any(|r| r.is_match(&normalized))
}

fn strip_dangerous(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let mut changed = false;
        for r in STRIPPERS.iter() {
            if r.is_match(&current) {
                current = r.replace_all(&current, "").into_owned();
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Strip dangerous markup, escape what remains, trim.
pub fn sanitize(input: &str) -> String {
    escape_html(&strip_dangerous(input)).trim().to_string()
}

/// Drop C0 and C1 control characters (ESC, BEL, CSI, ...) except `\n` and
/// `\t`.
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect()
}

/// Cleanup applied to user-authored text right before it is shown.
pub fn sanitize_for_display(text: &str) -> String {
    strip_control(&sanitize(text))
}

/// Sanitize a line captured from the terminal, then validate it as chat.
/// The returned text is what gets stored and sent.
pub fn capture_chat_input(line: &str) -> Result<String, Rejection> {
    validate_chat_input(&sanitize(line))
}

/// Validate `text` as the given kind of input. On success returns the
/// trimmed text.
pub fn validate(text: &str, kind: InputKind) -> Result<String, Rejection> {
    let trimmed = text.trim();
    let subject = kind.subject();
    if trimmed.is_empty() {
        return Err(Rejection::bare(ValidationError::Empty { subject }));
    }
    let len = trimmed.chars().count();

    match kind {
        InputKind::Chat => {
            if len > MAX_CHAT_CHARS {
                return Err(Rejection::bare(ValidationError::TooLong {
                    subject,
                    max: MAX_CHAT_CHARS,
                }));
            }
            if contains_malicious_content(trimmed) {
                return Err(Rejection::with_fallback(
                    ValidationError::Unsafe(
                        "Message contains potentially unsafe content. Please remove any scripts or HTML tags.",
                    ),
                    trimmed,
                ));
            }
        }
        InputKind::Name => {
            if len < MIN_NAME_CHARS {
                return Err(Rejection::bare(ValidationError::TooShort {
                    subject,
                    min: MIN_NAME_CHARS,
                }));
            }
            if len > MAX_NAME_CHARS {
                return Err(Rejection::bare(ValidationError::TooLong {
                    subject,
                    max: MAX_NAME_CHARS,
                }));
            }
            if !NAME_CHARS.is_match(trimmed) {
                return Err(Rejection::with_fallback(ValidationError::InvalidCharacters, trimmed));
            }
            if contains_malicious_content(trimmed) {
                return Err(Rejection::with_fallback(
                    ValidationError::Unsafe("Name contains potentially unsafe content. Please use a valid name."),
                    trimmed,
                ));
            }
        }
    }

    Ok(trimmed.to_string())
}

pub fn validate_chat_input(text: &str) -> Result<String, Rejection> {
    validate(text, InputKind::Chat)
}

pub fn validate_name_input(text: &str) -> Result<String, Rejection> {
    validate(text, InputKind::Name)
}
