//! Placeholder interpolation for log and error messages.
//!
//! Templates use `{key}` placeholders resolved from a [`LogContext`].
//! Unknown placeholders and unmatched braces are copied through unchanged.
//! Each substituted value is capped at [`MAX_FIELD_OUTPUT_LEN`] bytes so a
//! single huge message cannot blow up a log line.

use std::borrow::Cow;
use std::fmt;

use crate::LogContext;

/// Maximum length for any individual substituted value.
pub const MAX_FIELD_OUTPUT_LEN: usize = 1024;

/// Truncation indicator appended to truncated values.
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Renders `template` with values from `context`.
///
/// ```rust
/// use intercept_errors::{format::interpolate, LogContext};
///
/// let context = LogContext::new().with("file", "main.rs").with("line", 10u32);
/// assert_eq!(interpolate("in {file}[{line}] {other}", &context), "in main.rs[10] {other}");
/// ```
pub fn interpolate(template: &str, context: &LogContext) -> String {
    let mut out = String::with_capacity(template.len());
    // Writing into a String cannot fail.
    let _ = write_interpolated(&mut out, template, context);
    out
}

/// Writes `template` with values from `context` without an intermediate buffer.
pub fn write_interpolated(
    f: &mut impl fmt::Write,
    template: &str,
    context: &LogContext,
) -> fmt::Result {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        f.write_str(&rest[..open])?;
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder_key(&after[..close]) => {
                let key = &after[..close];
                match context.get(key) {
                    Some(value) => f.write_str(&truncate_with_indicator(value))?,
                    None => {
                        f.write_char('{')?;
                        f.write_str(key)?;
                        f.write_char('}')?;
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                f.write_char('{')?;
                rest = after;
            }
        }
    }
    f.write_str(rest)
}

/// Placeholder keys are non-empty runs of `[A-Za-z0-9_.]`.
fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

/// Truncate a value to [`MAX_FIELD_OUTPUT_LEN`] bytes on a UTF-8 boundary.
///
/// Returns a Cow<str> to avoid allocation when no truncation is needed.
pub(crate) fn truncate_with_indicator(s: &str) -> Cow<'_, str> {
    truncate_to(s, MAX_FIELD_OUTPUT_LEN)
}

/// Truncate to `max_bytes`, appending the indicator when anything was cut.
pub(crate) fn truncate_to(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }
    if max_bytes <= TRUNCATION_INDICATOR.len() {
        return Cow::Borrowed(&TRUNCATION_INDICATOR[..max_bytes]);
    }

    let max_content_len = max_bytes - TRUNCATION_INDICATOR.len();
    let mut idx = max_content_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&s[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}
