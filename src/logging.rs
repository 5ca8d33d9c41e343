//! Leveled logging capability used to report captured errors.
//!
//! The interceptor emits exactly one record per captured error: a message
//! template plus a [`LogContext`] of named substitutions. Loggers decide how
//! to render it; [`crate::format::interpolate`] is the stock renderer.
//!
//! # Memory Properties
//!
//! - Context values are `Cow<'static, str>`: literals stay borrowed
//! - Owned values are zeroized when the context drops
//! - Up to eight fields live inline (no heap allocation)

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use zeroize::Zeroize;

// ============================================================================
// Levels
// ============================================================================

/// Log severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// System is unusable
    Emergency,
    /// Action must be taken immediately
    Alert,
    /// Critical conditions
    Critical,
    /// Runtime errors; captured errors are logged here
    Error,
    /// Exceptional occurrences that are not errors
    Warning,
    /// Normal but significant events
    Notice,
    /// Informational events
    Info,
    /// Detailed debug information
    Debug,
}

impl LogLevel {
    /// Lowercase level name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Context
// ============================================================================

/// Context value wrapper with zeroization for owned data.
///
/// Borrowed values are assumed static and are not zeroized.
#[derive(Debug)]
pub struct ContextField {
    value: Cow<'static, str>,
}

impl ContextField {
    /// The wrapped value.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.value.as_ref()
    }
}

impl From<&'static str> for ContextField {
    fn from(value: &'static str) -> Self {
        Self {
            value: Cow::Borrowed(value),
        }
    }
}

impl From<String> for ContextField {
    fn from(value: String) -> Self {
        Self {
            value: Cow::Owned(value),
        }
    }
}

impl From<Cow<'static, str>> for ContextField {
    fn from(value: Cow<'static, str>) -> Self {
        Self { value }
    }
}

impl From<u32> for ContextField {
    fn from(value: u32) -> Self {
        Self {
            value: Cow::Owned(value.to_string()),
        }
    }
}

impl Zeroize for ContextField {
    fn zeroize(&mut self) {
        if let Cow::Owned(ref mut s) = self.value {
            s.zeroize();
        }
    }
}

impl Drop for ContextField {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Named substitutions for a log message template.
///
/// Keys are `&'static str` so the set of placeholders a caller can fill is
/// fixed at compile time.
#[derive(Debug, Default)]
pub struct LogContext {
    fields: SmallVec<[(&'static str, ContextField); 8]>,
}

impl LogContext {
    /// Empty context.
    #[inline]
    pub fn new() -> Self {
        Self {
            fields: SmallVec::new(),
        }
    }

    /// Adds a field, replacing any existing value under `key`.
    pub fn with(mut self, key: &'static str, value: impl Into<ContextField>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a field in place, replacing any existing value under `key`.
    pub fn insert(&mut self, key: &'static str, value: impl Into<ContextField>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether no field is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Logger Capability
// ============================================================================

/// Accepts leveled log messages.
///
/// `message` is a template with `{key}` placeholders resolved from
/// `context`; implementations must not assume it is pre-rendered.
pub trait Logger: Send + Sync {
    /// Records one message.
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);

    /// Shorthand for `log(LogLevel::Error, ..)`.
    fn error(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Error, message, context);
    }

    /// Shorthand for `log(LogLevel::Warning, ..)`.
    fn warning(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Warning, message, context);
    }
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        (**self).log(level, message, context);
    }
}

/// Discards every message. The interceptor's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _message: &str, _context: &LogContext) {}
}

/// Forwards messages to the `tracing` ecosystem.
///
/// The template is rendered with [`crate::format::interpolate`] and emitted
/// under the `intercept_errors` target. Emergency, alert and critical map to
/// `ERROR`; notice maps to `INFO`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let rendered = crate::format::interpolate(message, context);
        let level_name = level.as_str();
        match level {
            LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
                tracing::error!(target: "intercept_errors", severity = level_name, "{}", rendered)
            }
            LogLevel::Warning => {
                tracing::warn!(target: "intercept_errors", severity = level_name, "{}", rendered)
            }
            LogLevel::Notice | LogLevel::Info => {
                tracing::info!(target: "intercept_errors", severity = level_name, "{}", rendered)
            }
            LogLevel::Debug => {
                tracing::debug!(target: "intercept_errors", severity = level_name, "{}", rendered)
            }
        }
    }
}
