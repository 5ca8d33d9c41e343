//! Property-based tests for intercept_errors
//!
//! These tests use proptest to generate random inputs and verify invariants hold.

use intercept_errors::{
    core_errors, define_exception_types, exceptions, format::interpolate, CoreErrorCode,
    ErrorInterceptor, Exception, ExceptionType, HookRegistry, InterceptError, InvalidArgument,
    LogContext, RingBufferLogger,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

define_exception_types! {
    static APP_RUNTIME = "AppRuntimeException": exceptions::RUNTIME;
    static APP_DEEP = "AppDeepException": APP_RUNTIME;
    static STANDALONE = "StandaloneError";
}

fn fresh(env: &str) -> Arc<ErrorInterceptor> {
    let registry: &'static HookRegistry = Box::leak(Box::new(HookRegistry::new()));
    ErrorInterceptor::builder()
        .environment(env)
        .registry(registry)
        .build()
        .unwrap()
}

fn single_codes() -> Vec<CoreErrorCode> {
    CoreErrorCode::all()
        .iter()
        .copied()
        .filter(|code| !code.is_all())
        .collect()
}

fn any_code() -> impl Strategy<Value = CoreErrorCode> {
    prop::sample::select(single_codes())
}

fn any_env() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

fn any_type() -> impl Strategy<Value = &'static ExceptionType> {
    prop::sample::select(vec![
        &exceptions::EXCEPTION,
        &exceptions::LOGIC,
        &exceptions::INVALID_ARGUMENT,
        &exceptions::RUNTIME,
        &exceptions::UNEXPECTED_VALUE,
        &exceptions::PANIC,
        &APP_RUNTIME,
        &APP_DEEP,
        &STANDALONE,
    ])
}

// ============================================================================
// CONFIGURATION PROPERTIES
// ============================================================================

proptest! {
    /// Set, query, remove, query again
    #[test]
    fn set_then_remove_core_error(env in any_env(), code in any_code()) {
        let interceptor = fresh("base");
        interceptor.set_core_errors_in(&env, [code]).unwrap();
        prop_assert!(interceptor.is_handling_core_error_in(&env, code));
        prop_assert!(interceptor.remove_core_error_in(&env, code).unwrap());
        prop_assert!(!interceptor.is_handling_core_error_in(&env, code));
    }

    /// Codes survive a set/get round trip in order, without duplicates
    #[test]
    fn core_error_round_trip(env in any_env(), codes in prop::collection::vec(any_code(), 1..10)) {
        let interceptor = fresh("base");
        interceptor.set_core_errors_in(&env, codes.iter().copied()).unwrap();

        let mut expected = Vec::new();
        for code in codes {
            if !expected.contains(&code) {
                expected.push(code);
            }
        }
        prop_assert_eq!(interceptor.core_errors_in(&env), expected);
    }

    /// Names and integers resolve to the same codes
    #[test]
    fn names_and_integers_agree(code in any_code()) {
        let by_name = fresh("base");
        by_name.set_core_errors([code.name()]).unwrap();
        let by_bits = fresh("base");
        by_bits.set_core_errors([code.bits()]).unwrap();
        prop_assert_eq!(by_name.core_errors(), by_bits.core_errors());
    }

    /// Unregistered integers are rejected and change nothing
    #[test]
    fn unknown_codes_are_rejected(bits in any::<i32>()) {
        prop_assume!(!CoreErrorCode::is_valid(bits));
        let interceptor = fresh("base");
        let result = interceptor.set_core_errors([bits]);
        prop_assert!(
            matches!(
                result,
                Err(InterceptError::InvalidArgument(InvalidArgument::UnknownCode { .. }))
            ),
            "expected UnknownCode"
        );
        prop_assert_eq!(interceptor.core_errors(), ErrorInterceptor::default_core_errors());
        prop_assert!(!interceptor.handle_core_error(bits, "m", "f", 1));
    }

    /// The empty name never becomes the running environment
    #[test]
    fn empty_environment_never_applies(env in any_env()) {
        let interceptor = fresh(&env);
        prop_assert!(interceptor.set_running_environment("").is_err());
        prop_assert_eq!(interceptor.running_environment(), env);
    }

    /// Switching returns the previous name and seeds a callback
    #[test]
    fn switching_environment(from in any_env(), to in any_env()) {
        let interceptor = fresh(&from);
        prop_assert_eq!(interceptor.set_running_environment(to.clone()).unwrap(), from);
        prop_assert!(interceptor.callback_in(&to).is_some());
    }
}

// ============================================================================
// MATCHING PROPERTIES
// ============================================================================

proptest! {
    /// Watching a type matches exactly the type and its descendants
    #[test]
    fn exception_matching_follows_hierarchy(watched in any_type(), thrown in any_type()) {
        let interceptor = fresh("base");
        interceptor.set_uncaught_exceptions([watched]);

        let expected = thrown.lineage().contains(&watched.name());
        prop_assert_eq!(interceptor.is_handling_uncaught_exception(thrown), expected);
        prop_assert_eq!(
            interceptor.is_handling_uncaught_exception(Exception::new(thrown, "x")),
            expected
        );
    }

    /// Watching ALL matches every single code
    #[test]
    fn all_matches_everything(code in any_code()) {
        let interceptor = fresh("base");
        interceptor.set_core_errors([core_errors::ALL]).unwrap();
        prop_assert!(interceptor.is_handling_core_error(code));
    }
}

// ============================================================================
// LIFECYCLE PROPERTIES
// ============================================================================

proptest! {
    /// A second handle() is a no-op
    #[test]
    fn handle_is_idempotent(env in any_env()) {
        let interceptor = fresh(&env);
        prop_assert!(interceptor.handle());
        prop_assert!(!interceptor.handle());
        prop_assert!(interceptor.is_handling());
    }

    /// Unhandle succeeds once per handle
    #[test]
    fn unhandle_once(rounds in 1usize..5) {
        let interceptor = fresh("base");
        for _ in 0..rounds {
            prop_assert!(interceptor.handle());
            prop_assert!(interceptor.unhandle());
            prop_assert!(!interceptor.unhandle());
        }
        prop_assert!(!interceptor.registry().has_core_error_hook());
    }

    /// After a capture the interceptor stays captured
    #[test]
    fn capture_is_terminal(code in any_code(), message in "\\PC{0,64}", line in 1u32..10_000) {
        let interceptor = fresh("base");
        interceptor.set_core_errors([code]).unwrap();
        interceptor.set_callback(Arc::new(|_: &ErrorInterceptor| {}));
        prop_assert!(interceptor.handle());

        prop_assert!(interceptor.handle_core_error(code.bits(), &message, "src.rs", line));
        prop_assert!(!interceptor.is_handling());
        prop_assert!(!interceptor.handle());
        prop_assert!(!interceptor.handle_core_error(code.bits(), &message, "src.rs", line));

        let captured = interceptor.last_error().unwrap();
        prop_assert_eq!(captured.message(), message.as_str());
        prop_assert_eq!(captured.line(), line);
    }

    /// Exceptions outside the watched set leave the state alone
    #[test]
    fn non_matching_exception_is_ignored(thrown in any_type()) {
        let interceptor = fresh("base");
        interceptor.set_uncaught_exceptions([&exceptions::LOGIC]);
        prop_assume!(!thrown.is_a(&exceptions::LOGIC));

        interceptor.handle();
        prop_assert!(!interceptor.handle_uncaught_exception(&Exception::new(thrown, "x")));
        prop_assert!(interceptor.is_handling());
        prop_assert!(interceptor.last_error().is_none());
    }
}

// ============================================================================
// FORMATTING PROPERTIES
// ============================================================================

proptest! {
    /// Interpolated output stays valid UTF-8 and bounded per field
    #[test]
    fn interpolation_is_bounded(message in "\\PC{0,4000}") {
        let context = LogContext::new().with("message", message.clone());
        let rendered = interpolate("[{message}]", &context);
        prop_assert!(rendered.len() <= 2 + 1024);
        if message.len() <= 1024 {
            prop_assert_eq!(rendered, format!("[{}]", message));
        }
    }

    /// Logged captures always carry the captured message, bounded
    #[test]
    fn logged_capture_is_bounded(message in "\\PC{0,2000}") {
        let logger = RingBufferLogger::new(4, 512);
        let interceptor = fresh("base");
        interceptor.set_logger(Arc::new(logger.clone()));
        interceptor.set_callback(Arc::new(|_: &ErrorInterceptor| {}));
        interceptor.handle();
        interceptor.handle_core_error(1, &message, "f.rs", 1);

        let entries = logger.get_all();
        prop_assert_eq!(entries.len(), 1);
        prop_assert!(entries[0].size_bytes <= 512);
        prop_assert!(entries[0].message.starts_with("Core Error FATAL: \""));
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn dev_environment_scenario() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    let registry: &'static HookRegistry = Box::leak(Box::new(HookRegistry::new()));
    let logger = RingBufferLogger::new(8, 1024);

    let interceptor = ErrorInterceptor::builder()
        .environment("dev")
        .registry(registry)
        .logger(Arc::new(logger.clone()))
        .profile("dev", |p| {
            p.core_errors([core_errors::FATAL, core_errors::RECOVERABLE])
                .exceptions([&exceptions::RUNTIME])
                .callback(Arc::new(|_: &ErrorInterceptor| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                }))
        })
        .build()
        .unwrap();

    assert!(interceptor.handle());
    assert!(interceptor.handle_core_error(core_errors::FATAL.bits(), "boom", "f.php", 10));

    let entries = logger.get_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].message.as_ref(),
        "Core Error FATAL: \"boom\" in file f.php[10]."
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn unwatched_exception_scenario() {
    let interceptor = fresh("dev");
    interceptor.set_uncaught_exceptions([&exceptions::RUNTIME]);
    interceptor.handle();

    assert!(!interceptor.handle_uncaught_exception(&Exception::new(&exceptions::LOGIC, "no")));
    assert!(interceptor.is_handling());
}
