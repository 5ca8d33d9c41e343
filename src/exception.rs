//! Exception types and thrown exception values.
//!
//! Exception types are `static` descriptors linked to their parent type.
//! A thrown [`Exception`] points at its descriptor, so "is this value an
//! instance of `T` or one of its subtypes" is a walk up the parent chain
//! with no reflection involved.
//!
//! # Example
//!
//! ```rust
//! use intercept_errors::{define_exception_types, exceptions, Exception};
//!
//! define_exception_types! {
//!     /// Raised when the storage backend is gone.
//!     pub static STORAGE_ERROR = "StorageError": exceptions::RUNTIME;
//! }
//!
//! let err = Exception::new(&STORAGE_ERROR, "disk detached");
//! assert!(err.kind().is_a(&exceptions::RUNTIME));
//! assert!(err.kind().is_a(&exceptions::EXCEPTION));
//! assert!(!err.kind().is_a(&exceptions::LOGIC));
//! ```

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::InterceptError;

// ============================================================================
// Exception Type Descriptors
// ============================================================================

/// Static descriptor of an exception type.
///
/// Identity is the type name: two descriptors with the same name are the
/// same type for matching purposes.
#[derive(Debug)]
pub struct ExceptionType {
    name: &'static str,
    parent: Option<&'static ExceptionType>,
}

impl ExceptionType {
    /// Creates a descriptor. Normally invoked through [`define_exception_types!`].
    pub const fn new(name: &'static str, parent: Option<&'static ExceptionType>) -> Self {
        Self { name, parent }
    }

    /// Fully-qualified type name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Direct parent type, if any.
    #[inline]
    pub const fn parent(&self) -> Option<&'static ExceptionType> {
        self.parent
    }

    /// Returns whether `self` is `other` or descends from it.
    pub fn is_a(&self, other: &ExceptionType) -> bool {
        self.name == other.name || self.is_subclass_of(other)
    }

    /// Returns whether `self` strictly descends from `other`.
    pub fn is_subclass_of(&self, other: &ExceptionType) -> bool {
        let mut current = self.parent;
        while let Some(ty) = current {
            if ty.name == other.name {
                return true;
            }
            current = ty.parent;
        }
        false
    }

    /// Type names from `self` up to the root.
    pub fn lineage(&self) -> Vec<&'static str> {
        let mut names = vec![self.name];
        let mut current = self.parent;
        while let Some(ty) = current {
            names.push(ty.name);
            current = ty.parent;
        }
        names
    }
}

impl PartialEq for ExceptionType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ExceptionType {}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Resolves a type-or-instance argument to its exception type.
pub trait AsExceptionType {
    /// The exception type named by `self`.
    fn exception_type(&self) -> &'static ExceptionType;
}

impl AsExceptionType for &'static ExceptionType {
    #[inline]
    fn exception_type(&self) -> &'static ExceptionType {
        self
    }
}

impl AsExceptionType for Exception {
    #[inline]
    fn exception_type(&self) -> &'static ExceptionType {
        self.kind
    }
}

impl AsExceptionType for &Exception {
    #[inline]
    fn exception_type(&self) -> &'static ExceptionType {
        self.kind
    }
}

/// Defines `static` exception type descriptors.
///
/// `NAME = "TypeName"` declares a root type; `NAME = "TypeName": PARENT`
/// declares a subtype of `PARENT`.
#[macro_export]
macro_rules! define_exception_types {
    (@parent) => { None };
    (@parent $parent:path) => { Some(&$parent) };
    ($($(#[$meta:meta])* $vis:vis static $name:ident = $type_name:literal $(: $parent:path)?;)*) => {
        $(
            $(#[$meta])*
            $vis static $name: $crate::ExceptionType = $crate::ExceptionType::new(
                $type_name,
                $crate::define_exception_types!(@parent $($parent)?),
            );
        )*
    };
}

/// Built-in exception hierarchy.
///
/// ```text
/// Exception
/// ├── LogicException
/// │   ├── InvalidArgumentException
/// │   └── UndefinedConstantException
/// ├── RuntimeException
/// │   ├── UnexpectedValueException
/// │   └── PanicException
/// └── CoreErrorException
/// ```
pub mod exceptions {
    crate::define_exception_types! {
        /// Root of every exception type.
        pub static EXCEPTION = "Exception";
        /// Errors in program logic that should be fixed in code.
        pub static LOGIC = "LogicException": EXCEPTION;
        /// Bad argument passed to a function.
        pub static INVALID_ARGUMENT = "InvalidArgumentException": LOGIC;
        /// A symbolic constant lookup missed.
        pub static UNDEFINED_CONSTANT = "UndefinedConstantException": LOGIC;
        /// Errors only detectable at run time.
        pub static RUNTIME = "RuntimeException": EXCEPTION;
        /// A value did not match the expected set of values.
        pub static UNEXPECTED_VALUE = "UnexpectedValueException": RUNTIME;
        /// A Rust panic without an exception payload.
        pub static PANIC = "PanicException": RUNTIME;
        /// A core error re-thrown as an exception.
        pub static CORE_ERROR = "CoreErrorException": EXCEPTION;
    }
}

/// Exception types watched by default in every environment.
pub fn default_uncaught_exceptions() -> [&'static ExceptionType; 1] {
    [&exceptions::EXCEPTION]
}

// ============================================================================
// Exception Values
// ============================================================================

/// A thrown exception.
///
/// The source location defaults to the caller of [`Exception::new`].
#[derive(Clone)]
pub struct Exception {
    kind: &'static ExceptionType,
    message: String,
    code: i64,
    file: Cow<'static, str>,
    line: u32,
    previous: Option<Box<Exception>>,
    backtrace: Arc<Backtrace>,
}

impl Exception {
    /// Creates an exception of type `kind` located at the caller.
    #[track_caller]
    pub fn new(kind: &'static ExceptionType, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            kind,
            message: message.into(),
            code: 0,
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            previous: None,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// Sets the numeric exception code.
    #[inline]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Overrides the source location.
    #[inline]
    pub fn with_location(mut self, file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    /// Chains the exception that caused this one.
    #[inline]
    pub fn with_previous(mut self, previous: Exception) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// Exception type.
    #[inline]
    pub const fn kind(&self) -> &'static ExceptionType {
        self.kind
    }

    /// Type name, shorthand for `kind().name()`.
    #[inline]
    pub const fn type_name(&self) -> &'static str {
        self.kind.name
    }

    /// Exception message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Numeric exception code, zero unless set.
    #[inline]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// File the exception was raised in.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line the exception was raised at.
    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// The exception that caused this one.
    #[inline]
    pub fn previous(&self) -> Option<&Exception> {
        self.previous.as_deref()
    }

    /// Backtrace captured at construction (empty unless `RUST_BACKTRACE` is set).
    #[inline]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub(crate) fn shared_backtrace(&self) -> Arc<Backtrace> {
        Arc::clone(&self.backtrace)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("type", &self.kind.name)
            .field("message", &self.message)
            .field("code", &self.code)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("previous", &self.previous)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name, self.message)
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.previous
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<InterceptError> for Exception {
    #[track_caller]
    fn from(err: InterceptError) -> Self {
        Exception::new(&exceptions::INVALID_ARGUMENT, err.to_string())
    }
}

/// Builds an [`Exception`] with a formatted message at the invocation site.
///
/// ```rust
/// use intercept_errors::{exception, exceptions};
///
/// let id = 7;
/// let err = exception!(exceptions::UNEXPECTED_VALUE, "row {} missing", id);
/// assert_eq!(err.message(), "row 7 missing");
/// ```
#[macro_export]
macro_rules! exception {
    ($kind:path, $($arg:tt)+) => {
        $crate::Exception::new(&$kind, format!($($arg)+))
    };
}
