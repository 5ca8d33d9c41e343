//! Builder for [`ErrorInterceptor`].
//!
//! Collects the running environment, logger, registry and per-environment
//! profiles, then applies them in one go. Profiles are applied in the order
//! they were added; a later profile for the same environment overrides the
//! parts it sets.
//!
//! ```rust
//! use intercept_errors::{core_errors, exceptions, ErrorInterceptor, HookRegistry, RingBufferLogger};
//! use std::sync::Arc;
//!
//! static REGISTRY: HookRegistry = HookRegistry::new();
//!
//! let interceptor = ErrorInterceptor::builder()
//!     .environment("live")
//!     .environment_from_var("APP_ENVIRONMENT_SURELY_UNSET")
//!     .logger(Arc::new(RingBufferLogger::new(32, 1024)))
//!     .registry(&REGISTRY)
//!     .profile("live", |p| p.core_errors([core_errors::ALL]).exceptions([&exceptions::RUNTIME]))
//!     .build()?;
//!
//! assert_eq!(interceptor.running_environment(), "live");
//! assert!(interceptor.is_handling_core_error(core_errors::NOTICE));
//! # Ok::<(), intercept_errors::InterceptError>(())
//! ```

use std::sync::Arc;

use crate::interceptor::{Callback, DEFAULT_ENVIRONMENT};
use crate::{CoreErrorCode, ErrorInterceptor, ExceptionType, HookRegistry, Logger, NullLogger, Result};

/// Settings for one environment.
///
/// Parts left unset keep whatever the interceptor would otherwise use:
/// the default callback and the default filter sets.
#[derive(Default)]
pub struct EnvironmentProfile {
    callback: Option<Callback>,
    core_errors: Option<Vec<CoreErrorCode>>,
    exceptions: Option<Vec<&'static ExceptionType>>,
}

impl EnvironmentProfile {
    /// Core errors to watch.
    pub fn core_errors(mut self, codes: impl IntoIterator<Item = CoreErrorCode>) -> Self {
        self.core_errors = Some(codes.into_iter().collect());
        self
    }

    /// Exception types to watch, subtypes included.
    pub fn exceptions(mut self, types: impl IntoIterator<Item = &'static ExceptionType>) -> Self {
        self.exceptions = Some(types.into_iter().collect());
        self
    }

    /// Callback to run when an error is captured in this environment.
    pub fn callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// Builds an [`ErrorInterceptor`].
#[derive(Default)]
pub struct InterceptorBuilder {
    environment: Option<String>,
    environment_var: Option<String>,
    logger: Option<Arc<dyn Logger>>,
    registry: Option<&'static HookRegistry>,
    profiles: Vec<(String, EnvironmentProfile)>,
}

impl InterceptorBuilder {
    /// Builder with no settings: environment `"development"`, a
    /// [`NullLogger`] and the global registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running environment name.
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    /// Reads the running environment from the process variable `var` at
    /// build time. Unset or blank values fall back to
    /// [`environment`](Self::environment).
    pub fn environment_from_var(mut self, var: impl Into<String>) -> Self {
        self.environment_var = Some(var.into());
        self
    }

    /// Logger receiving captured-error records.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Registry to install hooks into instead of the global one.
    pub fn registry(mut self, registry: &'static HookRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Configures `env` through `configure`.
    pub fn profile(
        mut self,
        env: impl Into<String>,
        configure: impl FnOnce(EnvironmentProfile) -> EnvironmentProfile,
    ) -> Self {
        self.profiles
            .push((env.into(), configure(EnvironmentProfile::default())));
        self
    }

    fn resolve_environment(&self) -> String {
        let from_var = self
            .environment_var
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        from_var
            .or_else(|| self.environment.clone())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_owned())
    }

    /// Creates the interceptor and applies every profile.
    ///
    /// # Errors
    ///
    /// `InvalidArgument::EmptyEnvironment` when the resolved running
    /// environment or a profile name is empty.
    pub fn build(self) -> Result<Arc<ErrorInterceptor>> {
        let environment = self.resolve_environment();
        let logger = self.logger.unwrap_or_else(|| Arc::new(NullLogger));
        let registry = self.registry.unwrap_or_else(HookRegistry::global);
        let interceptor = ErrorInterceptor::create(environment, logger, registry)?;

        for (env, profile) in self.profiles {
            interceptor.register_environment(&env)?;
            if let Some(callback) = profile.callback {
                interceptor.set_callback_in(&env, callback)?;
            }
            if let Some(codes) = profile.core_errors {
                interceptor.set_core_errors_in(&env, codes)?;
            }
            if let Some(types) = profile.exceptions {
                interceptor.set_uncaught_exceptions_in(&env, types)?;
            }
        }
        Ok(interceptor)
    }
}
