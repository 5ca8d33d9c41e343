//! Process-wide hook slots.
//!
//! A [`HookRegistry`] owns one core-error hook slot and one uncaught
//! exception hook slot. Installing a hook hands back the hook it replaced
//! as an opaque [`PreviousHook`] token; restoring consumes the token, so
//! every install is paired with exactly one restore.
//!
//! The registry also tracks the last fatal error nobody handled and a list
//! of shutdown finalizers. Finalizers run once, in registration order, from
//! [`HookRegistry::run_shutdown`] or when a [`ShutdownGuard`] drops. Each
//! registration hands back a [`ShutdownId`] that withdraws it again.
//!
//! # Reentrancy
//!
//! Hooks are cloned out of the slot and called with no lock held, so a hook
//! may install or restore hooks on the same registry.
//!
//! # Example
//!
//! ```rust
//! use intercept_errors::HookRegistry;
//! use std::sync::Arc;
//!
//! static REGISTRY: HookRegistry = HookRegistry::new();
//!
//! let previous = REGISTRY.set_core_error_hook(Some(Arc::new(|code: i32, _: &str, _: &str, _: u32| code == 1)));
//! assert!(REGISTRY.raise_core_error(1, "boom", "main.rs", 3));
//! assert!(!REGISTRY.raise_core_error(2, "meh", "main.rs", 4));
//! assert_eq!(REGISTRY.last_error().map(|e| e.code), Some(2));
//!
//! REGISTRY.restore_core_error_hook(previous);
//! assert!(!REGISTRY.has_core_error_hook());
//! ```

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use zeroize::Zeroize;

use crate::Exception;

/// Hook receiving core errors: `(code, message, file, line) -> handled`.
pub type CoreErrorHook = Arc<dyn Fn(i32, &str, &str, u32) -> bool + Send + Sync>;

/// Hook receiving uncaught exceptions: `(exception) -> handled`.
pub type ExceptionHook = Arc<dyn Fn(&Exception) -> bool + Send + Sync>;

type Finalizer = Box<dyn FnOnce() + Send>;

/// The hook a slot held before an install.
///
/// Hand it back to the matching `restore_*` method to undo the install.
#[must_use = "dropping the token loses the hook it replaced"]
pub struct PreviousHook<H> {
    hook: Option<H>,
}

impl<H> PreviousHook<H> {
    /// Returns whether the slot was empty before the install.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hook.is_none()
    }
}

impl<H> fmt::Debug for PreviousHook<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviousHook")
            .field("present", &self.hook.is_some())
            .finish()
    }
}

/// A core error nobody handled.
///
/// Message and file are zeroized on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingError {
    /// Core error code bits
    pub code: i32,
    /// Error message as raised
    pub message: String,
    /// Source file
    pub file: String,
    /// Source line
    pub line: u32,
}

impl Zeroize for PendingError {
    fn zeroize(&mut self) {
        self.message.zeroize();
        self.file.zeroize();
    }
}

impl Drop for PendingError {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Identifies a queued shutdown finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShutdownId(u64);

struct Slots {
    core_error: Option<CoreErrorHook>,
    exception: Option<ExceptionHook>,
    last_error: Option<PendingError>,
    finalizers: Vec<(ShutdownId, Finalizer)>,
    next_finalizer: u64,
}

/// Global hook slots plus shutdown bookkeeping.
pub struct HookRegistry {
    slots: Mutex<Slots>,
}

static GLOBAL: HookRegistry = HookRegistry::new();

impl HookRegistry {
    /// Creates an empty registry, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                core_error: None,
                exception: None,
                last_error: None,
                finalizers: Vec::new(),
                next_finalizer: 0,
            }),
        }
    }

    /// The process-wide registry.
    #[inline]
    pub fn global() -> &'static HookRegistry {
        &GLOBAL
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Slots> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------------

    /// Installs `hook` (or clears the slot with `None`) and returns the hook it replaced.
    pub fn set_core_error_hook(&self, hook: Option<CoreErrorHook>) -> PreviousHook<CoreErrorHook> {
        let previous = mem::replace(&mut self.lock().core_error, hook);
        PreviousHook { hook: previous }
    }

    /// Puts back the hook recorded in `previous`.
    ///
    /// An empty token clears the slot.
    pub fn restore_core_error_hook(&self, previous: PreviousHook<CoreErrorHook>) {
        self.lock().core_error = previous.hook;
    }

    /// Installs `hook` (or clears the slot with `None`) and returns the hook it replaced.
    pub fn set_exception_hook(&self, hook: Option<ExceptionHook>) -> PreviousHook<ExceptionHook> {
        let previous = mem::replace(&mut self.lock().exception, hook);
        PreviousHook { hook: previous }
    }

    /// Puts back the hook recorded in `previous`.
    ///
    /// An empty token clears the slot.
    pub fn restore_exception_hook(&self, previous: PreviousHook<ExceptionHook>) {
        self.lock().exception = previous.hook;
    }

    /// The currently installed core-error hook.
    pub fn core_error_hook(&self) -> Option<CoreErrorHook> {
        self.lock().core_error.clone()
    }

    /// The currently installed exception hook.
    pub fn exception_hook(&self) -> Option<ExceptionHook> {
        self.lock().exception.clone()
    }

    /// Returns whether a core-error hook is installed.
    #[inline]
    pub fn has_core_error_hook(&self) -> bool {
        self.lock().core_error.is_some()
    }

    /// Returns whether an exception hook is installed.
    #[inline]
    pub fn has_exception_hook(&self) -> bool {
        self.lock().exception.is_some()
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    /// Offers a core error to the installed hook.
    ///
    /// Returns whether the hook handled it. Unhandled errors become the
    /// pending [`last_error`](Self::last_error).
    pub fn raise_core_error(&self, code: i32, message: &str, file: &str, line: u32) -> bool {
        let hook = self.core_error_hook();
        let handled = hook.is_some_and(|hook| hook(code, message, file, line));
        if !handled {
            self.record_fatal(code, message, file, line);
        }
        handled
    }

    /// Records a fatal error that never reached a hook.
    ///
    /// Shutdown finalizers pick it up through [`last_error`](Self::last_error).
    pub fn record_fatal(&self, code: i32, message: &str, file: &str, line: u32) {
        self.lock().last_error = Some(PendingError {
            code,
            message: message.to_owned(),
            file: file.to_owned(),
            line,
        });
    }

    /// The last unhandled fatal error, if any.
    pub fn last_error(&self) -> Option<PendingError> {
        self.lock().last_error.clone()
    }

    /// Removes and returns the last unhandled fatal error.
    pub fn take_last_error(&self) -> Option<PendingError> {
        self.lock().last_error.take()
    }

    /// Offers an uncaught exception to the installed hook.
    ///
    /// Returns whether the hook handled it; the caller decides what an
    /// unhandled exception means.
    pub fn throw_uncaught(&self, exception: &Exception) -> bool {
        let hook = self.exception_hook();
        hook.is_some_and(|hook| hook(exception))
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    /// Queues `finalizer` to run at shutdown.
    ///
    /// The returned id withdraws it through
    /// [`unregister_shutdown`](Self::unregister_shutdown); owners that go
    /// away before shutdown should do so, or the queue keeps their entry.
    pub fn register_shutdown(&self, finalizer: impl FnOnce() + Send + 'static) -> ShutdownId {
        let mut slots = self.lock();
        let id = ShutdownId(slots.next_finalizer);
        slots.next_finalizer += 1;
        slots.finalizers.push((id, Box::new(finalizer)));
        id
    }

    /// Drops a queued finalizer without running it.
    ///
    /// Returns false when it already ran or was withdrawn.
    pub fn unregister_shutdown(&self, id: ShutdownId) -> bool {
        let removed = {
            let mut slots = self.lock();
            let index = slots.finalizers.iter().position(|(queued, _)| *queued == id);
            index.map(|index| slots.finalizers.remove(index))
        };
        // The finalizer may own values whose drop reenters the registry.
        removed.is_some()
    }

    /// Number of queued finalizers.
    pub fn pending_finalizers(&self) -> usize {
        self.lock().finalizers.len()
    }

    /// Runs every queued finalizer in registration order.
    ///
    /// Finalizers registered while running are run in the same pass.
    /// Returns how many ran.
    pub fn run_shutdown(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = mem::take(&mut self.lock().finalizers);
            if batch.is_empty() {
                return ran;
            }
            for (_, finalizer) in batch {
                finalizer();
                ran += 1;
            }
        }
    }

    /// Guard that runs shutdown finalizers when dropped.
    ///
    /// Hold it at the top of `main` so finalizers run on every exit path
    /// that unwinds.
    pub fn shutdown_guard(&'static self) -> ShutdownGuard {
        ShutdownGuard { registry: self }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        f.debug_struct("HookRegistry")
            .field("core_error_hook", &slots.core_error.is_some())
            .field("exception_hook", &slots.exception.is_some())
            .field("last_error", &slots.last_error)
            .field("finalizers", &slots.finalizers.len())
            .finish()
    }
}

/// Runs the registry's shutdown finalizers on drop.
#[must_use = "finalizers run when the guard drops"]
#[derive(Debug)]
pub struct ShutdownGuard {
    registry: &'static HookRegistry,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.registry.run_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> &'static HookRegistry {
        Box::leak(Box::new(HookRegistry::new()))
    }

    #[test]
    fn install_returns_replaced_hook() {
        let registry = registry();
        let first = registry.set_core_error_hook(Some(Arc::new(|_: i32, _: &str, _: &str, _: u32| true)));
        assert!(first.is_empty());

        let second = registry.set_core_error_hook(Some(Arc::new(|_: i32, _: &str, _: &str, _: u32| false)));
        assert!(!second.is_empty());
        assert!(!registry.raise_core_error(1, "m", "f", 1));

        registry.restore_core_error_hook(second);
        assert!(registry.raise_core_error(1, "m", "f", 1));

        registry.restore_core_error_hook(first);
        assert!(!registry.has_core_error_hook());
    }

    #[test]
    fn unhandled_core_error_becomes_pending() {
        let registry = registry();
        assert!(!registry.raise_core_error(256, "oom", "alloc.rs", 9));
        assert_eq!(
            registry.last_error(),
            Some(PendingError {
                code: 256,
                message: "oom".into(),
                file: "alloc.rs".into(),
                line: 9,
            })
        );
        assert!(registry.take_last_error().is_some());
        assert!(registry.last_error().is_none());
    }

    #[test]
    fn handled_core_error_is_not_recorded() {
        let registry = registry();
        let _previous = registry.set_core_error_hook(Some(Arc::new(|_: i32, _: &str, _: &str, _: u32| true)));
        assert!(registry.raise_core_error(1, "m", "f", 1));
        assert!(registry.last_error().is_none());
    }

    #[test]
    fn exception_hook_round_trip() {
        let registry = registry();
        let exc = Exception::new(&exceptions::RUNTIME, "lost");
        assert!(!registry.throw_uncaught(&exc));

        let previous = registry.set_exception_hook(Some(Arc::new(|e: &Exception| {
            e.kind().is_a(&exceptions::RUNTIME)
        })));
        assert!(registry.throw_uncaught(&exc));
        assert!(!registry.throw_uncaught(&Exception::new(&exceptions::LOGIC, "x")));

        registry.restore_exception_hook(previous);
        assert!(!registry.has_exception_hook());
    }

    #[test]
    fn hooks_may_reenter_the_registry() {
        let registry = registry();
        let previous = registry.set_core_error_hook(Some(Arc::new(move |_: i32, _: &str, _: &str, _: u32| {
            // Uninstall from inside the hook.
            let _ = registry.set_core_error_hook(None);
            true
        })));
        assert!(previous.is_empty());
        assert!(registry.raise_core_error(1, "m", "f", 1));
        assert!(!registry.has_core_error_hook());
    }

    #[test]
    fn finalizers_run_once_in_order() {
        static ORDER: Mutex<Vec<u8>> = Mutex::new(Vec::new());
        let registry = registry();
        registry.register_shutdown(|| ORDER.lock().unwrap().push(1));
        registry.register_shutdown(move || {
            ORDER.lock().unwrap().push(2);
            registry.register_shutdown(|| ORDER.lock().unwrap().push(3));
        });
        assert_eq!(registry.pending_finalizers(), 2);

        assert_eq!(registry.run_shutdown(), 3);
        assert_eq!(registry.run_shutdown(), 0);
        assert_eq!(*ORDER.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn withdrawn_finalizers_never_run() {
        static RAN: AtomicUsize = AtomicUsize::new(0);
        let registry = registry();
        let first = registry.register_shutdown(|| {
            RAN.fetch_add(1, Ordering::SeqCst);
        });
        let second = registry.register_shutdown(|| {
            RAN.fetch_add(10, Ordering::SeqCst);
        });
        assert_ne!(first, second);

        assert!(registry.unregister_shutdown(second));
        assert!(!registry.unregister_shutdown(second));
        assert_eq!(registry.pending_finalizers(), 1);

        assert_eq!(registry.run_shutdown(), 1);
        assert!(!registry.unregister_shutdown(first));
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_error_zeroizes() {
        let mut pending = PendingError {
            code: 1,
            message: "secret path".into(),
            file: "/home/user/app.rs".into(),
            line: 4,
        };
        pending.zeroize();
        assert!(pending.message.is_empty());
        assert!(pending.file.is_empty());
        assert_eq!(pending.code, 1);
    }

    #[test]
    fn shutdown_guard_runs_on_drop() {
        static RAN: AtomicUsize = AtomicUsize::new(0);
        let registry = registry();
        registry.register_shutdown(|| {
            RAN.fetch_add(1, Ordering::SeqCst);
        });
        {
            let _guard = registry.shutdown_guard();
        }
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }
}
