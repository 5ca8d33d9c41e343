//! # Intercept Errors
//!
//! Single-shot interception of fatal core errors and uncaught exceptions.
//!
//! ## Design Philosophy
//!
//! 1. **Hooks are process-wide slots** held by an explicit [`HookRegistry`]
//! 2. **Installing returns a token** that restores exactly what was replaced
//! 3. **Filters are per environment**, so "dev" and "live" can watch different things
//! 4. **The first matching error wins** and the interceptor becomes terminal
//! 5. **Captured errors never propagate**: they are logged once and handed to a callback
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --handle()--> Intercepting --matching error--> Captured (terminal)
//!   ^                     |
//!   +----unhandle()-------+
//! ```
//!
//! Dropping the last `Arc<ErrorInterceptor>` while intercepting restores the
//! previous hooks, so hooks never outlive their owner.
//!
//! ## Quick Start
//!
//! ```rust
//! use intercept_errors::{core_errors, exceptions, ErrorInterceptor, HookRegistry};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! static REGISTRY: HookRegistry = HookRegistry::new();
//! static CALLS: AtomicUsize = AtomicUsize::new(0);
//!
//! let interceptor = ErrorInterceptor::builder()
//!     .environment("dev")
//!     .registry(&REGISTRY)
//!     .profile("dev", |profile| {
//!         profile
//!             .core_errors([core_errors::FATAL, core_errors::RECOVERABLE])
//!             .exceptions([&exceptions::RUNTIME])
//!             .callback(Arc::new(|_: &ErrorInterceptor| {
//!                 CALLS.fetch_add(1, Ordering::SeqCst);
//!             }))
//!     })
//!     .build()?;
//!
//! assert!(interceptor.handle());
//! assert!(REGISTRY.raise_core_error(1, "boom", "main.rs", 10));
//!
//! assert!(!interceptor.is_handling());
//! assert_eq!(CALLS.load(Ordering::SeqCst), 1);
//! assert_eq!(interceptor.last_error().unwrap().message(), "boom");
//! # Ok::<(), intercept_errors::InterceptError>(())
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): enables [`TracingLogger`], which forwards records to `tracing`

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;

pub mod codes;
pub mod config;
pub mod exception;
pub mod format;
pub mod hooks;
pub mod interceptor;
pub mod logging;
pub mod models;
pub mod panic_bridge;
pub mod render;
pub mod ring_buffer;

pub use codes::*;
pub use config::*;
pub use exception::*;
pub use hooks::*;
pub use interceptor::*;
pub use logging::*;
pub use models::*;
pub use ring_buffer::*;

/// Type alias for Results using our error type.
pub type Result<T> = std::result::Result<T, InterceptError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Reasons a configuration argument was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    /// An environment name was empty.
    EmptyEnvironment,
    /// An integer did not match any registered core error code.
    UnknownCode {
        /// The rejected value.
        value: i64,
    },
    /// A name did not match any registered core error code.
    UnknownName {
        /// The rejected name.
        name: String,
    },
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEnvironment => f.write_str("the environment name cannot be empty"),
            Self::UnknownCode { value } => write!(f, "unknown core error code {}", value),
            Self::UnknownName { name } => write!(f, "unknown core error name '{}'", name),
        }
    }
}

impl std::error::Error for InvalidArgument {}

/// Errors returned by configuration operations.
///
/// Captured core errors and exceptions are never reported through this
/// type; they end up in [`ErrorInterceptor::last_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptError {
    /// Bad configuration input.
    InvalidArgument(InvalidArgument),
}

impl InterceptError {
    /// Shorthand for the empty environment name error.
    #[inline]
    pub(crate) const fn empty_environment() -> Self {
        Self::InvalidArgument(InvalidArgument::EmptyEnvironment)
    }
}

impl From<InvalidArgument> for InterceptError {
    fn from(reason: InvalidArgument) -> Self {
        Self::InvalidArgument(reason)
    }
}

impl fmt::Display for InterceptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(reason) => write!(f, "invalid argument: {}", reason),
        }
    }
}

impl std::error::Error for InterceptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(reason) => Some(reason),
        }
    }
}
