//! Core error code registry.
//!
//! Core errors are fatal conditions raised by the runtime itself rather than
//! thrown as exceptions. Each code is a single bit so that callers can pass
//! masks around, with [`core_errors::ALL`] covering every bit.
//!
//! # Governance
//!
//! Codes exist only as const values produced by [`define_core_errors!`].
//! `CoreErrorCode` has no public constructor, so every value a caller holds
//! is known to the registry and always has a name.
//!
//! # Example
//!
//! ```rust
//! use intercept_errors::{CoreErrorCode, core_errors};
//!
//! assert_eq!(CoreErrorCode::to_integer("FATAL").unwrap(), 1);
//! assert_eq!(CoreErrorCode::to_name(4096).unwrap(), "RECOVERABLE");
//! assert_eq!(core_errors::USER_WARNING.name(), "USER_WARNING");
//! ```

use crate::{InterceptError, InvalidArgument, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Severity Classification
// ============================================================================

/// Broad severity class of a core error code.
///
/// Small Copy enum; derived purely from the code bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Unrecoverable errors (the default bucket).
    Error,
    /// Warnings raised by the runtime, the compiler, or user code.
    Warning,
    /// Notices, informational only.
    Notice,
    /// Use of deprecated functionality.
    Deprecated,
    /// Strictness suggestions.
    Strict,
    /// Source could not be parsed.
    Parse,
}

impl Severity {
    /// Human-readable label.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Notice => "Notice",
            Self::Deprecated => "Deprecated",
            Self::Strict => "Strict",
            Self::Parse => "Parse",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Core Error Code
// ============================================================================

/// A named core error code.
///
/// Equality and hashing use the numeric bits only.
#[derive(Clone, Copy)]
pub struct CoreErrorCode {
    name: &'static str,
    bits: i32,
}

impl CoreErrorCode {
    /// Internal constructor used by [`define_core_errors!`].
    #[doc(hidden)]
    pub const fn __internal_new(name: &'static str, bits: i32) -> Self {
        assert!(bits > 0, "Core error bits must be positive");
        Self { name, bits }
    }

    /// Symbolic name, e.g. `"FATAL"`.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Numeric value.
    #[inline]
    pub const fn bits(&self) -> i32 {
        self.bits
    }

    /// Every registered code, including [`core_errors::ALL`].
    #[inline]
    pub fn all() -> &'static [CoreErrorCode] {
        core_errors::REGISTERED
    }

    /// Looks up a code by its numeric value.
    pub fn from_bits(bits: i32) -> Option<Self> {
        Self::all().iter().copied().find(|code| code.bits == bits)
    }

    /// Looks up a code by its symbolic name.
    ///
    /// # Errors
    ///
    /// `InvalidArgument::UnknownName` when no code carries that name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|code| code.name == name)
            .ok_or_else(|| {
                InterceptError::InvalidArgument(InvalidArgument::UnknownName {
                    name: name.to_owned(),
                })
            })
    }

    /// Returns whether `bits` is a registered code value.
    #[inline]
    pub fn is_valid(bits: i32) -> bool {
        Self::from_bits(bits).is_some()
    }

    /// Converts a code or a code name into its integer value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the value or name is not registered.
    pub fn to_integer(code: impl IntoCoreError) -> Result<i32> {
        code.into_core_error().map(|code| code.bits)
    }

    /// Converts a code or a code name into its symbolic name.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the value or name is not registered.
    pub fn to_name(code: impl IntoCoreError) -> Result<&'static str> {
        code.into_core_error().map(|code| code.name)
    }

    /// Splits a bitmask into the individual registered codes it covers.
    ///
    /// [`core_errors::ALL`] itself is never part of the expansion; a full
    /// mask yields every single-bit code.
    pub fn expand_mask(mask: i32) -> Vec<CoreErrorCode> {
        Self::all()
            .iter()
            .copied()
            .filter(|code| code.bits != core_errors::ALL.bits && mask & code.bits == code.bits)
            .collect()
    }

    /// Returns whether this is the catch-all [`core_errors::ALL`] code.
    #[inline]
    pub const fn is_all(&self) -> bool {
        self.bits == core_errors::ALL.bits
    }

    /// Severity class of this code.
    pub const fn severity(&self) -> Severity {
        use core_errors::*;
        match self.bits {
            b if b == WARNING.bits
                || b == USER_WARNING.bits
                || b == COMPILE_WARNING.bits
                || b == CORE_WARNING.bits =>
            {
                Severity::Warning
            }
            b if b == NOTICE.bits || b == USER_NOTICE.bits => Severity::Notice,
            b if b == DEPRECATED.bits || b == USER_DEPRECATED.bits => Severity::Deprecated,
            b if b == STRICT.bits => Severity::Strict,
            b if b == PARSE.bits => Severity::Parse,
            _ => Severity::Error,
        }
    }
}

impl PartialEq for CoreErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl Eq for CoreErrorCode {}

impl Hash for CoreErrorCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl fmt::Debug for CoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.bits)
    }
}

impl fmt::Display for CoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Conversion Into Codes
// ============================================================================

/// Anything that can name a core error: a code, its integer value, or its name.
pub trait IntoCoreError {
    /// Resolves `self` against the registry.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the value does not name a registered code.
    fn into_core_error(self) -> Result<CoreErrorCode>;
}

impl IntoCoreError for CoreErrorCode {
    #[inline]
    fn into_core_error(self) -> Result<CoreErrorCode> {
        Ok(self)
    }
}

impl IntoCoreError for &CoreErrorCode {
    #[inline]
    fn into_core_error(self) -> Result<CoreErrorCode> {
        Ok(*self)
    }
}

impl IntoCoreError for i32 {
    fn into_core_error(self) -> Result<CoreErrorCode> {
        CoreErrorCode::from_bits(self).ok_or(InterceptError::InvalidArgument(
            InvalidArgument::UnknownCode {
                value: i64::from(self),
            },
        ))
    }
}

impl IntoCoreError for &str {
    #[inline]
    fn into_core_error(self) -> Result<CoreErrorCode> {
        CoreErrorCode::from_name(self)
    }
}

impl IntoCoreError for String {
    #[inline]
    fn into_core_error(self) -> Result<CoreErrorCode> {
        CoreErrorCode::from_name(&self)
    }
}

// ============================================================================
// Definition Macro
// ============================================================================

/// Defines core error codes as consts plus a `REGISTERED` table.
///
/// Intended for the [`core_errors`] module; every code the registry knows
/// comes from a single invocation so lookups stay exhaustive.
#[macro_export]
macro_rules! define_core_errors {
    ($($(#[$meta:meta])* $name:ident = $bits:expr),* $(,)?) => {
        $(
            $(#[$meta])*
            pub const $name: $crate::CoreErrorCode =
                $crate::CoreErrorCode::__internal_new(stringify!($name), $bits);
        )*

        /// Every code defined in this module, in declaration order.
        pub const REGISTERED: &[$crate::CoreErrorCode] = &[$($name),*];
    };
}

/// Canonical core error codes.
pub mod core_errors {
    crate::define_core_errors! {
        /// Fatal run-time error; execution cannot continue.
        FATAL = 1,
        /// Run-time warning.
        WARNING = 2,
        /// Compile-time parse error.
        PARSE = 4,
        /// Run-time notice.
        NOTICE = 8,
        /// Fatal error during runtime start-up.
        CORE_FATAL = 16,
        /// Warning during runtime start-up.
        CORE_WARNING = 32,
        /// Fatal compile-time error.
        COMPILE_FATAL = 64,
        /// Compile-time warning.
        COMPILE_WARNING = 128,
        /// User-raised fatal error.
        USER_FATAL = 256,
        /// User-raised warning.
        USER_WARNING = 512,
        /// User-raised notice.
        USER_NOTICE = 1024,
        /// Strictness suggestion.
        STRICT = 2048,
        /// Catchable fatal error.
        RECOVERABLE = 4096,
        /// Deprecation notice.
        DEPRECATED = 8192,
        /// User-raised deprecation notice.
        USER_DEPRECATED = 16384,
        /// Every code above.
        ALL = 32767,
    }
}

/// Core errors watched by default in every environment.
pub const DEFAULT_CORE_ERRORS: [CoreErrorCode; 6] = [
    core_errors::FATAL,
    core_errors::PARSE,
    core_errors::CORE_FATAL,
    core_errors::USER_FATAL,
    core_errors::USER_WARNING,
    core_errors::RECOVERABLE,
];
