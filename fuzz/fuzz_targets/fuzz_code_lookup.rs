#![no_main]

use intercept_errors::{CoreErrorCode, ErrorInterceptor, HookRegistry};
use libfuzzer_sys::fuzz_target;

static REGISTRY: HookRegistry = HookRegistry::new();

fuzz_target!(|input: (i32, &str)| {
    let (bits, name) = input;

    if let Ok(code) = CoreErrorCode::from_name(name) {
        assert_eq!(CoreErrorCode::to_name(code.bits()).ok(), Some(code.name()));
    }

    let Ok(interceptor) = ErrorInterceptor::builder().registry(&REGISTRY).build() else {
        return;
    };
    let accepted = interceptor.set_core_errors([bits]).is_ok();
    assert_eq!(accepted, CoreErrorCode::is_valid(bits));
    assert_eq!(interceptor.is_handling_core_error(bits), accepted);
});
