//! The error interceptor state machine.
//!
//! ```text
//! Idle --handle()--> Intercepting --matching error--> Captured
//!   ^                     |
//!   +----unhandle()-------+
//! ```
//!
//! While intercepting, the interceptor's own hooks sit in the registry's
//! slots. The first core error or uncaught exception that matches the
//! running environment's filters is captured: the previous hooks are put
//! back, the error is logged once at error level, and the environment's
//! callback runs with the interceptor as its argument. After that the
//! interceptor is terminal and `handle()` always returns false.
//!
//! # One active interceptor per registry
//!
//! Hook slots hold a single hook. If a second interceptor calls `handle()`
//! on the same registry while the first is intercepting, the second saves
//! the first's hooks as "previous". Unhandling the second puts the first's
//! hooks back, not the original ones, and unhandling the first afterwards
//! restores the originals over whatever is installed at that point.
//! Nest install and release in LIFO order.
//!
//! # Concurrency
//!
//! All state sits behind one mutex. The check that an error matches and the
//! transition to `Captured` happen under that lock, so concurrent deliveries
//! capture exactly one error. The lock is released before hooks are
//! restored, the logger runs or the callback runs.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, RwLock, Weak};

use smallvec::SmallVec;

use crate::codes::DEFAULT_CORE_ERRORS;
use crate::exception::default_uncaught_exceptions;
use crate::hooks::{CoreErrorHook, ExceptionHook, PreviousHook, ShutdownId};
use crate::{
    AsExceptionType, CapturedError, CoreErrorCode, Exception, ExceptionType, HookRegistry,
    IntoCoreError, InterceptError, InterceptorBuilder, LogContext, Logger, NullLogger, Result,
};

/// Environment used when none is given.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Log template for a captured error.
pub const CAPTURED_ERROR_TEMPLATE: &str = "{label} {type}: \"{message}\" in file {file}[{line}].";

/// Label logged for captured core errors.
pub const CORE_ERROR_LABEL: &str = "Core Error";

/// Label logged for captured uncaught exceptions.
pub const UNCAUGHT_EXCEPTION_LABEL: &str = "Uncaught Exception";

/// Callback run once an error is captured.
pub type Callback = Arc<dyn Fn(&ErrorInterceptor) + Send + Sync>;

type CoreErrorSet = SmallVec<[CoreErrorCode; 8]>;
type ExceptionSet = SmallVec<[&'static ExceptionType; 4]>;

static DEFAULT_CALLBACK: LazyLock<Callback> =
    LazyLock::new(|| Arc::new(crate::render::report_to_stderr));

struct State {
    running_env: String,
    callbacks: HashMap<String, Callback>,
    core_errors: HashMap<String, CoreErrorSet>,
    exceptions: HashMap<String, ExceptionSet>,
    is_handling: bool,
    last_error: Option<Arc<CapturedError>>,
    prev_core_hook: Option<PreviousHook<CoreErrorHook>>,
    prev_exception_hook: Option<PreviousHook<ExceptionHook>>,
    shutdown: Option<ShutdownId>,
}

type SavedHooks = (
    Option<PreviousHook<CoreErrorHook>>,
    Option<PreviousHook<ExceptionHook>>,
);

impl State {
    fn new(running_env: String) -> Self {
        let mut state = Self {
            running_env,
            callbacks: HashMap::new(),
            core_errors: HashMap::new(),
            exceptions: HashMap::new(),
            is_handling: false,
            last_error: None,
            prev_core_hook: None,
            prev_exception_hook: None,
            shutdown: None,
        };
        let env = state.running_env.clone();
        state.ensure_callback(&env);
        state
    }

    /// Registers `callback`, seeding absent filter sets with the defaults.
    fn set_callback(&mut self, env: &str, callback: Callback) {
        self.callbacks.insert(env.to_owned(), callback);
        self.core_errors
            .entry(env.to_owned())
            .or_insert_with(|| CoreErrorSet::from_slice(&DEFAULT_CORE_ERRORS));
        self.exceptions
            .entry(env.to_owned())
            .or_insert_with(|| default_uncaught_exceptions().into_iter().collect());
    }

    fn ensure_callback(&mut self, env: &str) {
        if !self.callbacks.contains_key(env) {
            self.set_callback(env, ErrorInterceptor::default_callback());
        }
    }

    fn watches_core_error(&self, env: &str, code: CoreErrorCode) -> bool {
        self.core_errors
            .get(env)
            .is_some_and(|set| set.iter().any(|watched| *watched == code || watched.is_all()))
    }

    fn watches_exception(&self, env: &str, ty: &ExceptionType) -> bool {
        self.exceptions
            .get(env)
            .is_some_and(|set| set.iter().any(|watched| ty.is_a(watched)))
    }

    fn running_callback(&self) -> Callback {
        self.callbacks
            .get(&self.running_env)
            .cloned()
            .unwrap_or_else(ErrorInterceptor::default_callback)
    }

    /// Leaves the intercepting state and hands back the saved hooks.
    fn release(&mut self) -> SavedHooks {
        self.is_handling = false;
        (self.prev_core_hook.take(), self.prev_exception_hook.take())
    }
}

/// Intercepts the first matching core error or uncaught exception.
///
/// Always held in an `Arc`; the installed hooks keep a weak reference, so
/// dropping the last `Arc` while intercepting restores the previous hooks.
pub struct ErrorInterceptor {
    this: Weak<ErrorInterceptor>,
    state: Mutex<State>,
    logger: RwLock<Arc<dyn Logger>>,
    registry: &'static HookRegistry,
}

impl ErrorInterceptor {
    /// Creates an interceptor on the global registry with a [`NullLogger`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument::EmptyEnvironment` when `running_env` is empty.
    pub fn new(running_env: impl Into<String>) -> Result<Arc<Self>> {
        Self::create(running_env.into(), Arc::new(NullLogger), HookRegistry::global())
    }

    /// Starts building an interceptor.
    pub fn builder() -> InterceptorBuilder {
        InterceptorBuilder::new()
    }

    pub(crate) fn create(
        running_env: String,
        logger: Arc<dyn Logger>,
        registry: &'static HookRegistry,
    ) -> Result<Arc<Self>> {
        if running_env.is_empty() {
            return Err(InterceptError::empty_environment());
        }
        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: Mutex::new(State::new(running_env)),
            logger: RwLock::new(logger),
            registry,
        }))
    }

    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The registry this interceptor installs into.
    #[inline]
    pub fn registry(&self) -> &'static HookRegistry {
        self.registry
    }

    /// The logger receiving captured-error records.
    pub fn logger(&self) -> Arc<dyn Logger> {
        match self.logger.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the logger.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) -> &Self {
        match self.logger.write() {
            Ok(mut guard) => *guard = logger,
            Err(poisoned) => *poisoned.into_inner() = logger,
        }
        self
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Installs this interceptor's hooks.
    ///
    /// Returns false when already intercepting or when an error has been
    /// captured. The first successful call also queues a shutdown finalizer
    /// that delivers the registry's pending fatal error, if any. Dropping
    /// the interceptor withdraws that finalizer.
    pub fn handle(&self) -> bool {
        let mut state = self.lock_state();
        if state.is_handling || state.last_error.is_some() {
            return false;
        }

        state.prev_exception_hook = Some(self.registry.set_exception_hook(Some(self.exception_hook())));
        state.prev_core_hook = Some(self.registry.set_core_error_hook(Some(self.core_error_hook())));

        if state.shutdown.is_none() {
            let this = self.this.clone();
            state.shutdown = Some(self.registry.register_shutdown(move || {
                if let Some(interceptor) = this.upgrade() {
                    interceptor.handle_pending_fatal();
                }
            }));
        }

        state.is_handling = true;
        true
    }

    /// Restores the hooks saved by [`handle`](Self::handle).
    ///
    /// Returns false when not intercepting or when an error has been captured.
    pub fn unhandle(&self) -> bool {
        let mut state = self.lock_state();
        if !state.is_handling || state.last_error.is_some() {
            return false;
        }
        let saved = state.release();
        drop(state);

        self.restore_hooks(saved);
        true
    }

    fn restore_hooks(&self, (core, exception): SavedHooks) {
        if let Some(previous) = exception {
            self.registry.restore_exception_hook(previous);
        }
        if let Some(previous) = core {
            self.registry.restore_core_error_hook(previous);
        }
    }

    /// Returns whether the hooks are installed.
    pub fn is_handling(&self) -> bool {
        self.lock_state().is_handling
    }

    /// The captured error, once there is one.
    pub fn last_error(&self) -> Option<Arc<CapturedError>> {
        self.lock_state().last_error.clone()
    }

    /// Hook that forwards core errors to [`handle_core_error`](Self::handle_core_error).
    ///
    /// Holds a weak reference; once the interceptor is gone the hook reports
    /// "not handled".
    pub fn core_error_hook(&self) -> CoreErrorHook {
        let this = self.this.clone();
        Arc::new(move |code: i32, message: &str, file: &str, line: u32| {
            this.upgrade()
                .is_some_and(|interceptor| interceptor.handle_core_error(code, message, file, line))
        })
    }

    /// Hook that forwards exceptions to
    /// [`handle_uncaught_exception`](Self::handle_uncaught_exception).
    pub fn exception_hook(&self) -> ExceptionHook {
        let this = self.this.clone();
        Arc::new(move |exception: &Exception| {
            this.upgrade()
                .is_some_and(|interceptor| interceptor.handle_uncaught_exception(exception))
        })
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    /// Captures a core error if intercepting and the running environment watches `code`.
    ///
    /// Codes missing from the registry are never handled.
    pub fn handle_core_error(&self, code: i32, message: &str, file: &str, line: u32) -> bool {
        let Some(code) = CoreErrorCode::from_bits(code) else {
            return false;
        };
        let state = self.lock_state();
        if !state.is_handling || !state.watches_core_error(&state.running_env, code) {
            return false;
        }
        self.trigger_error(state, CapturedError::core(code, message, file, line), CORE_ERROR_LABEL)
    }

    /// Captures an exception if intercepting and its type, or an ancestor,
    /// is watched by the running environment.
    pub fn handle_uncaught_exception(&self, exception: &Exception) -> bool {
        let state = self.lock_state();
        if !state.is_handling || !state.watches_exception(&state.running_env, exception.kind()) {
            return false;
        }
        self.trigger_error(state, CapturedError::exception(exception), UNCAUGHT_EXCEPTION_LABEL)
    }

    fn handle_pending_fatal(&self) -> bool {
        let Some(pending) = self.registry.last_error() else {
            return false;
        };
        let handled =
            self.handle_core_error(pending.code, &pending.message, &pending.file, pending.line);
        if handled {
            let _ = self.registry.take_last_error();
        }
        handled
    }

    /// Captures `captured` and reports it. Always returns true.
    fn trigger_error(
        &self,
        mut state: MutexGuard<'_, State>,
        captured: CapturedError,
        label: &'static str,
    ) -> bool {
        let saved = state.release();
        let captured = Arc::new(captured);
        state.last_error = Some(Arc::clone(&captured));
        let callback = state.running_callback();
        drop(state);

        self.restore_hooks(saved);

        let context = LogContext::new()
            .with("label", label)
            .with("type", captured.type_label())
            .with("message", captured.message().to_owned())
            .with("file", captured.file().to_owned())
            .with("line", captured.line());
        self.logger().error(CAPTURED_ERROR_TEMPLATE, &context);

        // The captured error is already fatal; a failing callback must not mask it.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(self)));
        true
    }

    // ------------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------------

    /// Name of the running environment.
    pub fn running_environment(&self) -> String {
        self.lock_state().running_env.clone()
    }

    /// Switches the running environment and returns the previous one.
    ///
    /// A default callback is registered for `env` if it has none.
    ///
    /// # Errors
    ///
    /// `InvalidArgument::EmptyEnvironment` when `env` is empty; nothing changes.
    pub fn set_running_environment(&self, env: impl Into<String>) -> Result<String> {
        let env = env.into();
        if env.is_empty() {
            return Err(InterceptError::empty_environment());
        }
        let mut state = self.lock_state();
        state.ensure_callback(&env);
        Ok(std::mem::replace(&mut state.running_env, env))
    }

    /// Registers `env` with a default callback if it has none.
    pub(crate) fn register_environment(&self, env: &str) -> Result<()> {
        check_env(env)?;
        self.lock_state().ensure_callback(env);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------------

    /// Shared default callback: prints a plain-text report to stderr.
    ///
    /// Meant for development only.
    pub fn default_callback() -> Callback {
        Arc::clone(&DEFAULT_CALLBACK)
    }

    /// Sets the running environment's callback.
    pub fn set_callback(&self, callback: Callback) -> &Self {
        let mut state = self.lock_state();
        let env = state.running_env.clone();
        state.set_callback(&env, callback);
        self
    }

    /// Sets `env`'s callback.
    ///
    /// Absent core-error and exception sets for `env` are seeded with
    /// [`default_core_errors`](Self::default_core_errors) and
    /// [`default_uncaught_exceptions`](Self::default_uncaught_exceptions).
    ///
    /// # Errors
    ///
    /// `InvalidArgument::EmptyEnvironment` when `env` is empty.
    pub fn set_callback_in(&self, env: &str, callback: Callback) -> Result<&Self> {
        check_env(env)?;
        self.lock_state().set_callback(env, callback);
        Ok(self)
    }

    /// The running environment's callback.
    pub fn callback(&self) -> Callback {
        self.lock_state().running_callback()
    }

    /// `env`'s callback, if one is registered.
    pub fn callback_in(&self, env: &str) -> Option<Callback> {
        self.lock_state().callbacks.get(env).cloned()
    }

    // ------------------------------------------------------------------------
    // Core Errors
    // ------------------------------------------------------------------------

    /// Core errors watched in every environment unless configured otherwise.
    pub fn default_core_errors() -> Vec<CoreErrorCode> {
        DEFAULT_CORE_ERRORS.to_vec()
    }

    /// Replaces the running environment's watched core errors.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when a code or name is not registered; nothing changes.
    pub fn set_core_errors<I>(&self, codes: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: IntoCoreError,
    {
        let env = self.running_environment();
        self.set_core_errors_in(&env, codes)
    }

    /// Replaces `env`'s watched core errors. An empty set watches nothing.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `env` is empty or a code is not registered;
    /// nothing changes.
    pub fn set_core_errors_in<I>(&self, env: &str, codes: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: IntoCoreError,
    {
        check_env(env)?;
        let mut set = CoreErrorSet::new();
        for code in codes {
            let code = code.into_core_error()?;
            if !set.contains(&code) {
                set.push(code);
            }
        }

        let mut state = self.lock_state();
        state.ensure_callback(env);
        state.core_errors.insert(env.to_owned(), set);
        Ok(self)
    }

    /// The running environment's watched core errors.
    pub fn core_errors(&self) -> Vec<CoreErrorCode> {
        let state = self.lock_state();
        state
            .core_errors
            .get(&state.running_env)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    /// `env`'s watched core errors; empty for unknown environments.
    pub fn core_errors_in(&self, env: &str) -> Vec<CoreErrorCode> {
        self.lock_state()
            .core_errors
            .get(env)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    /// Stops watching `code` in the running environment.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `code` is not registered.
    pub fn remove_core_error(&self, code: impl IntoCoreError) -> Result<bool> {
        let env = self.running_environment();
        self.remove_core_error_in(&env, code)
    }

    /// Stops watching `code` in `env`.
    ///
    /// [`core_errors::ALL`](crate::core_errors::ALL) clears the whole set.
    /// Returns whether the set changed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `code` is not registered.
    pub fn remove_core_error_in(&self, env: &str, code: impl IntoCoreError) -> Result<bool> {
        let code = code.into_core_error()?;
        let mut state = self.lock_state();
        let Some(set) = state.core_errors.get_mut(env) else {
            return Ok(false);
        };

        if code.is_all() {
            let changed = !set.is_empty();
            set.clear();
            return Ok(changed);
        }
        match set.iter().position(|watched| *watched == code) {
            Some(index) => {
                set.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns whether the running environment watches `code`.
    pub fn is_handling_core_error(&self, code: impl IntoCoreError) -> bool {
        let state = self.lock_state();
        code.into_core_error()
            .is_ok_and(|code| state.watches_core_error(&state.running_env, code))
    }

    /// Returns whether `env` watches `code`, directly or through `ALL`.
    ///
    /// Unregistered codes and unknown environments are not watched.
    pub fn is_handling_core_error_in(&self, env: &str, code: impl IntoCoreError) -> bool {
        code.into_core_error()
            .is_ok_and(|code| self.lock_state().watches_core_error(env, code))
    }

    // ------------------------------------------------------------------------
    // Uncaught Exceptions
    // ------------------------------------------------------------------------

    /// Exception types watched in every environment unless configured otherwise.
    pub fn default_uncaught_exceptions() -> Vec<&'static ExceptionType> {
        default_uncaught_exceptions().to_vec()
    }

    /// Replaces the running environment's watched exception types.
    pub fn set_uncaught_exceptions<I>(&self, types: I) -> &Self
    where
        I: IntoIterator,
        I::Item: AsExceptionType,
    {
        let mut state = self.lock_state();
        let env = state.running_env.clone();
        state.exceptions.insert(env, collect_types(types));
        self
    }

    /// Replaces `env`'s watched exception types. An empty set watches nothing.
    ///
    /// # Errors
    ///
    /// `InvalidArgument::EmptyEnvironment` when `env` is empty.
    pub fn set_uncaught_exceptions_in<I>(&self, env: &str, types: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: AsExceptionType,
    {
        check_env(env)?;
        let set = collect_types(types);
        let mut state = self.lock_state();
        state.ensure_callback(env);
        state.exceptions.insert(env.to_owned(), set);
        Ok(self)
    }

    /// The running environment's watched exception types.
    pub fn uncaught_exceptions(&self) -> Vec<&'static ExceptionType> {
        let state = self.lock_state();
        state
            .exceptions
            .get(&state.running_env)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    /// `env`'s watched exception types; empty for unknown environments.
    pub fn uncaught_exceptions_in(&self, env: &str) -> Vec<&'static ExceptionType> {
        self.lock_state()
            .exceptions
            .get(env)
            .map(|set| set.to_vec())
            .unwrap_or_default()
    }

    /// Stops watching a type, given as a type or an exception value.
    pub fn remove_uncaught_exception(&self, ty: impl AsExceptionType) -> bool {
        let env = self.running_environment();
        self.remove_uncaught_exception_in(&env, ty)
    }

    /// Stops watching a type in `env`. Only the exact type is removed,
    /// never its subtypes. Returns whether the set changed.
    pub fn remove_uncaught_exception_in(&self, env: &str, ty: impl AsExceptionType) -> bool {
        let ty = ty.exception_type();
        let mut state = self.lock_state();
        let Some(set) = state.exceptions.get_mut(env) else {
            return false;
        };
        match set.iter().position(|watched| *watched == ty) {
            Some(index) => {
                set.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns whether the running environment watches `ty` or one of its ancestors.
    pub fn is_handling_uncaught_exception(&self, ty: impl AsExceptionType) -> bool {
        let state = self.lock_state();
        state.watches_exception(&state.running_env, ty.exception_type())
    }

    /// Returns whether `env` watches `ty` or one of its ancestors.
    pub fn is_handling_uncaught_exception_in(&self, env: &str, ty: impl AsExceptionType) -> bool {
        self.lock_state().watches_exception(env, ty.exception_type())
    }
}

impl Drop for ErrorInterceptor {
    fn drop(&mut self) {
        self.unhandle();
        if let Some(id) = self.lock_state().shutdown.take() {
            self.registry.unregister_shutdown(id);
        }
    }
}

impl fmt::Debug for ErrorInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ErrorInterceptor")
            .field("running_env", &state.running_env)
            .field("environments", &state.callbacks.len())
            .field("is_handling", &state.is_handling)
            .field("last_error", &state.last_error)
            .finish_non_exhaustive()
    }
}

#[inline]
fn check_env(env: &str) -> Result<()> {
    if env.is_empty() {
        Err(InterceptError::empty_environment())
    } else {
        Ok(())
    }
}

fn collect_types<I>(types: I) -> ExceptionSet
where
    I: IntoIterator,
    I::Item: AsExceptionType,
{
    let mut set = ExceptionSet::new();
    for ty in types {
        let ty = ty.exception_type();
        if !set.contains(&ty) {
            set.push(ty);
        }
    }
    set
}
