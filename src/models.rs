//! Captured error records.
//!
//! A [`CapturedError`] is produced exactly once per interceptor, either from
//! a core error or from an uncaught exception. It is immutable after
//! construction and shared as `Arc<CapturedError>` with callbacks.
//!
//! Message and file path are owned copies; they are zeroized on drop like
//! any other context text in this crate.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use crate::{CoreErrorCode, Exception, Severity};

/// Where a captured error came from.
#[derive(Clone)]
pub enum CapturedSource {
    /// A core error raised by the runtime.
    Core(CoreErrorCode),
    /// An uncaught exception.
    Exception {
        /// Fully-qualified exception type name.
        type_name: &'static str,
        /// Type names from the thrown type up to the root.
        lineage: Vec<&'static str>,
        /// Backtrace captured when the exception was created.
        backtrace: Arc<Backtrace>,
    },
}

impl fmt::Debug for CapturedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(code) => f.debug_tuple("Core").field(code).finish(),
            Self::Exception {
                type_name, lineage, ..
            } => f
                .debug_struct("Exception")
                .field("type_name", type_name)
                .field("lineage", lineage)
                .finish_non_exhaustive(),
        }
    }
}

/// Immutable record of the single error an interceptor handled.
pub struct CapturedError {
    message: String,
    code: i64,
    file: String,
    line: u32,
    source: CapturedSource,
}

impl CapturedError {
    /// Record for a core error.
    pub fn core(
        code: CoreErrorCode,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            message: message.into(),
            code: i64::from(code.bits()),
            file: file.into(),
            line,
            source: CapturedSource::Core(code),
        }
    }

    /// Record for an uncaught exception.
    pub fn exception(exception: &Exception) -> Self {
        Self {
            message: exception.message().to_owned(),
            code: exception.code(),
            file: exception.file().to_owned(),
            line: exception.line(),
            source: CapturedSource::Exception {
                type_name: exception.type_name(),
                lineage: exception.kind().lineage(),
                backtrace: exception.shared_backtrace(),
            },
        }
    }

    /// Error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Core error bits or exception code.
    #[inline]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Source file.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Source line.
    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Where the error came from.
    #[inline]
    pub const fn source(&self) -> &CapturedSource {
        &self.source
    }

    /// Exception type name, `None` for core errors.
    pub fn original_exception_type(&self) -> Option<&'static str> {
        match &self.source {
            CapturedSource::Core(_) => None,
            CapturedSource::Exception { type_name, .. } => Some(*type_name),
        }
    }

    /// Returns whether this record came from a core error.
    #[inline]
    pub const fn is_core(&self) -> bool {
        matches!(self.source, CapturedSource::Core(_))
    }

    /// Severity class; uncaught exceptions are always errors.
    pub const fn severity(&self) -> Severity {
        match &self.source {
            CapturedSource::Core(code) => code.severity(),
            CapturedSource::Exception { .. } => Severity::Error,
        }
    }

    /// Type label used in log lines.
    ///
    /// Core errors render their code name (`FATAL`); exceptions render
    /// `Type[code]`.
    pub fn type_label(&self) -> String {
        match &self.source {
            CapturedSource::Core(code) => code.name().to_owned(),
            CapturedSource::Exception { type_name, .. } => format!("{}[{}]", type_name, self.code),
        }
    }
}

impl Clone for CapturedError {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            code: self.code,
            file: self.file.clone(),
            line: self.line,
            source: self.source.clone(),
        }
    }
}

impl Zeroize for CapturedError {
    fn zeroize(&mut self) {
        self.message.zeroize();
        self.file.zeroize();
    }
}

impl Drop for CapturedError {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedError")
            .field("message", &self.message)
            .field("code", &self.code)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for CapturedError {
    /// `TYPE: "message" in file path[line]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: \"{}\" in file {}[{}]",
            self.type_label(),
            self.message,
            self.file,
            self.line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core_errors, exceptions};

    #[test]
    fn core_record_uses_code_name() {
        let captured = CapturedError::core(core_errors::FATAL, "boom", "f.rs", 10);
        assert!(captured.is_core());
        assert_eq!(captured.code(), 1);
        assert_eq!(captured.type_label(), "FATAL");
        assert_eq!(captured.original_exception_type(), None);
        assert_eq!(captured.to_string(), "FATAL: \"boom\" in file f.rs[10]");
    }

    #[test]
    fn exception_record_keeps_type_and_code() {
        let err = Exception::new(&exceptions::RUNTIME, "lost")
            .with_code(42)
            .with_location("lib.rs", 7);
        let captured = CapturedError::exception(&err);
        assert!(!captured.is_core());
        assert_eq!(captured.type_label(), "RuntimeException[42]");
        assert_eq!(captured.original_exception_type(), Some("RuntimeException"));
        assert_eq!(captured.file(), "lib.rs");
        assert_eq!(captured.line(), 7);
        assert_eq!(captured.severity(), Severity::Error);
    }

    #[test]
    fn severity_follows_core_code() {
        let captured = CapturedError::core(core_errors::USER_WARNING, "w", "f.rs", 1);
        assert_eq!(captured.severity(), Severity::Warning);
    }

    #[test]
    fn zeroize_clears_owned_text() {
        let mut captured = CapturedError::core(core_errors::FATAL, "secret", "/etc/app", 1);
        captured.zeroize();
        assert_eq!(captured.message(), "");
        assert_eq!(captured.file(), "");
    }
}
