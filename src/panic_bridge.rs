//! Routes Rust panics into a registry's exception hook.
//!
//! Rust has no "uncaught exception" slot of its own; the closest thing is
//! the panic hook. [`install`] replaces it with a hook that turns the panic
//! payload into an [`Exception`]. Code run through [`catch`] has that
//! exception offered to [`HookRegistry::throw_uncaught`] once unwinding has
//! finished. Panics outside [`catch`], and panics the exception hook does
//! not handle, behave as they did before the bridge.
//!
//! Payloads are converted as follows:
//!
//! - an [`Exception`] (thrown with [`throw`]) is passed on as is
//! - a `&str` or `String` message becomes a `PanicException` located at the panic site
//! - anything else becomes a `PanicException` with a placeholder message
//!
//! Delivery never happens inside the panic hook itself. A callback that
//! panics while reporting is therefore caught like any other callback
//! panic instead of aborting the process.
//!
//! ```rust
//! use intercept_errors::panic_bridge::{self, throw};
//! use intercept_errors::{exceptions, ErrorInterceptor, Exception, HookRegistry};
//! use std::sync::Arc;
//!
//! static REGISTRY: HookRegistry = HookRegistry::new();
//!
//! let interceptor = ErrorInterceptor::builder().registry(&REGISTRY).build()?;
//! interceptor.set_callback(Arc::new(|_: &ErrorInterceptor| {}));
//! interceptor.handle();
//!
//! let bridge = panic_bridge::install(&REGISTRY);
//! let outcome = panic_bridge::catch(|| -> u32 {
//!     throw(Exception::new(&exceptions::RUNTIME, "disk full"))
//! });
//! drop(bridge);
//!
//! assert_eq!(outcome.unwrap_err().message(), "disk full");
//! assert!(interceptor.last_error().is_some());
//! # Ok::<(), intercept_errors::InterceptError>(())
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;

use crate::{exceptions, Exception, HookRegistry};

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

thread_local! {
    /// Number of [`catch`] frames active on this thread; zero while delivering.
    static CATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Exception recorded by the hook, waiting for its `catch` frame.
    static PARKED: RefCell<Option<(&'static HookRegistry, Exception)>> = const { RefCell::new(None) };
}

/// Installed panic bridge. Dropping it restores the previous panic hook.
#[must_use = "the previous panic hook is restored when the bridge drops"]
pub struct PanicBridge {
    previous: Option<Arc<PanicHook>>,
}

impl std::fmt::Debug for PanicBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicBridge")
            .field("installed", &self.previous.is_some())
            .finish()
    }
}

/// Replaces the process panic hook with one that reports to `registry`.
///
/// Inside [`catch`] with an exception hook installed, the panic is parked
/// for delivery and the previous hook stays silent. Otherwise the previous
/// hook runs as usual.
///
/// Must not be called while the current thread is panicking.
pub fn install(registry: &'static HookRegistry) -> PanicBridge {
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    let fallback = Arc::clone(&previous);

    panic::set_hook(Box::new(move |info| {
        if CATCH_DEPTH.get() == 0 {
            fallback(info);
            return;
        }
        // Inside `catch` the slot always describes the latest panic.
        if !registry.has_exception_hook() {
            PARKED.set(None);
            fallback(info);
            return;
        }
        PARKED.set(Some((registry, exception_from_panic(info))));
    }));

    PanicBridge {
        previous: Some(previous),
    }
}

impl Drop for PanicBridge {
    fn drop(&mut self) {
        // The panic hook cannot be swapped from a panicking thread; the
        // bridge then stays installed and keeps falling through.
        if std::thread::panicking() {
            return;
        }
        let Some(previous) = self.previous.take() else {
            return;
        };

        // Dropping our hook releases its clone of `previous`.
        drop(panic::take_hook());
        match Arc::try_unwrap(previous) {
            Ok(hook) => panic::set_hook(hook),
            Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
        }
    }
}

/// Runs `f`, delivering a panic that escapes it as an uncaught exception.
///
/// Returns `Ok` with the closure's value when it does not panic, and `Err`
/// with the exception when the registry's exception hook handled it. A
/// panic nobody handles keeps unwinding out of `catch` with its original
/// payload; when an exception hook was installed, the previous panic hook
/// has not seen it.
///
/// Delivery runs after unwinding has finished, with no panic in progress.
/// Frames nest; each panic is delivered by the innermost one.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Exception> {
    let payload = {
        let _frame = CatchFrame::enter();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => return Ok(value),
            Err(payload) => payload,
        }
    };

    let Some((registry, exception)) = PARKED.take() else {
        panic::resume_unwind(payload);
    };

    // Panics raised while delivering belong to no frame.
    let outer = CATCH_DEPTH.replace(0);
    let handled = registry.throw_uncaught(&exception);
    CATCH_DEPTH.set(outer);

    if handled {
        Err(exception)
    } else {
        panic::resume_unwind(payload)
    }
}

struct CatchFrame;

impl CatchFrame {
    fn enter() -> Self {
        CATCH_DEPTH.set(CATCH_DEPTH.get() + 1);
        Self
    }
}

impl Drop for CatchFrame {
    fn drop(&mut self) {
        CATCH_DEPTH.set(CATCH_DEPTH.get().saturating_sub(1));
    }
}

/// Throws `exception` as an uncaught exception.
///
/// Unwinds like any panic; with a bridge installed and inside [`catch`],
/// the exception reaches the registry's exception hook unchanged.
pub fn throw(exception: Exception) -> ! {
    panic::panic_any(exception)
}

/// Builds the exception reported for a panic.
pub fn exception_from_panic(info: &PanicHookInfo<'_>) -> Exception {
    let payload = info.payload();
    if let Some(exception) = payload.downcast_ref::<Exception>() {
        return exception.clone();
    }

    let exception = Exception::new(&exceptions::PANIC, panic_message(payload));
    match info.location() {
        Some(location) => exception.with_location(location.file().to_owned(), location.line()),
        None => exception,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}
