//! Unified kernel error types for PlugHub.
//!
//! Structural failures (unknown names, duplicate registrations, illegal
//! lifecycle transitions) are returned to the caller immediately. Failures
//! raised by plugin-authored code during dispatch are wrapped into one of the
//! variants below and recorded per listener, tap, or plugin.

use std::fmt;
use thiserror::Error;

/// Boxed error produced by plugin-authored code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error kind categorization used across the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A named hook, service, or plugin was not found.
    NotFound,
    /// A name is already taken.
    Conflict,
    /// A call was malformed (wrong arity, wrong hook kind, illegal transition).
    Validation,
    /// Dependency resolution failed.
    Dependency,
    /// Plugin-authored code failed.
    Plugin,
    /// A listener exceeded its time budget.
    Timeout,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal kernel error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Dependency => write!(f, "DEPENDENCY"),
            Self::Plugin => write!(f, "PLUGIN"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A hook with this name was already created.
    #[error("hook '{0}' already exists")]
    DuplicateHook(String),

    /// No hook with this name exists.
    #[error("unknown hook '{0}'")]
    UnknownHook(String),

    /// A hook was called (or tapped) with the wrong number of arguments.
    #[error("hook '{hook}' expects {expected} argument(s), got {actual}")]
    HookArity {
        /// Hook name.
        hook: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// A hook was dispatched through a call path that does not match its kind.
    #[error("hook '{hook}' is {kind}, cannot dispatch as {requested}")]
    HookKindMismatch {
        /// Hook name.
        hook: String,
        /// Declared kind.
        kind: String,
        /// Requested dispatch strategy.
        requested: String,
    },

    /// A tap was rejected at registration.
    #[error("invalid tap on hook '{hook}': {reason}")]
    InvalidTap {
        /// Hook name.
        hook: String,
        /// Why the tap was rejected.
        reason: String,
    },

    /// A tap failed during a series or waterfall dispatch.
    #[error("tap from plugin '{plugin}' on hook '{hook}' failed: {source}")]
    TapFailed {
        /// Hook name.
        hook: String,
        /// Plugin that owns the tap.
        plugin: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A service name is already registered.
    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    /// No service with this name exists.
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// A service factory failed.
    #[error("factory for service '{service}' failed: {source}")]
    ServiceFactory {
        /// Service name.
        service: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A service instance is not of the requested type.
    #[error("service '{service}' is not a {expected}")]
    ServiceTypeMismatch {
        /// Service name.
        service: String,
        /// Requested type name.
        expected: &'static str,
    },

    /// A dependency cycle was found. The first name is repeated at the end.
    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// Names along the cycle.
        cycle: Vec<String>,
    },

    /// A plugin with this name is already registered.
    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    /// No plugin with this name exists.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// A lifecycle method was called from a state that does not allow it.
    #[error("plugin '{plugin}' cannot {action} while {state}")]
    InvalidTransition {
        /// Plugin name.
        plugin: String,
        /// Current state.
        state: String,
        /// Attempted operation.
        action: String,
    },

    /// Another lifecycle step of the same plugin has not finished.
    #[error("plugin '{plugin}' cannot {action} while another lifecycle step is running")]
    TransitionInProgress {
        /// Plugin name.
        plugin: String,
        /// Attempted operation.
        action: String,
    },

    /// A declared dependency is missing or not yet initialized.
    #[error("plugin '{plugin}' depends on '{dependency}', which is not ready")]
    DependencyNotReady {
        /// Plugin name.
        plugin: String,
        /// Dependency name.
        dependency: String,
    },

    /// A plugin's `init` failed.
    #[error("plugin '{plugin}' failed to initialize: {source}")]
    PluginInit {
        /// Plugin name.
        plugin: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Another lifecycle method (`enable`, `disable`, `destroy`) failed.
    #[error("plugin '{plugin}' failed to {action}: {source}")]
    PluginLifecycle {
        /// Plugin name.
        plugin: String,
        /// Lifecycle method name.
        action: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A plugin does not expose the requested method.
    #[error("plugin '{plugin}' has no method '{method}'")]
    MethodNotFound {
        /// Plugin name.
        plugin: String,
        /// Method name.
        method: String,
    },

    /// A direct plugin call failed.
    #[error("call to '{plugin}.{method}' failed: {source}")]
    PluginCall {
        /// Target plugin name.
        plugin: String,
        /// Method name.
        method: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A listener did not settle within its time budget.
    #[error("listener {listener} timed out after {timeout_ms}ms")]
    ListenerTimeout {
        /// Listener identifier.
        listener: u64,
        /// Budget in milliseconds.
        timeout_ms: u64,
    },

    /// A storage middleware rejected a mutation.
    #[error("storage mutation of '{key}' rejected: {reason}")]
    StorageRejected {
        /// Full storage key.
        key: String,
        /// Rejection reason.
        reason: String,
    },

    /// No lazy plugin with this name is registered.
    #[error("unknown lazy plugin '{0}'")]
    UnknownLazyPlugin(String),

    /// A lazy loader failed.
    #[error("lazy plugin '{plugin}' failed to load: {source}")]
    LazyLoad {
        /// Plugin name.
        plugin: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A configuration error occurred.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KernelError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownHook(_)
            | Self::UnknownService(_)
            | Self::UnknownPlugin(_)
            | Self::UnknownLazyPlugin(_)
            | Self::MethodNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateHook(_)
            | Self::DuplicateService(_)
            | Self::DuplicatePlugin(_)
            | Self::TransitionInProgress { .. } => ErrorKind::Conflict,
            Self::HookArity { .. }
            | Self::HookKindMismatch { .. }
            | Self::InvalidTap { .. }
            | Self::ServiceTypeMismatch { .. }
            | Self::InvalidTransition { .. }
            | Self::StorageRejected { .. } => ErrorKind::Validation,
            Self::CircularDependency { .. } | Self::DependencyNotReady { .. } => {
                ErrorKind::Dependency
            }
            Self::TapFailed { .. }
            | Self::ServiceFactory { .. }
            | Self::PluginInit { .. }
            | Self::PluginLifecycle { .. }
            | Self::PluginCall { .. }
            | Self::LazyLoad { .. } => ErrorKind::Plugin,
            Self::ListenerTimeout { .. } => ErrorKind::Timeout,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Wraps a failed `init` of `plugin`.
    pub fn plugin_init(plugin: impl Into<String>, source: anyhow::Error) -> Self {
        Self::PluginInit {
            plugin: plugin.into(),
            source: source.into(),
        }
    }

    /// Wraps a failed `enable`/`disable`/`destroy` of `plugin`.
    pub fn plugin_lifecycle(
        plugin: impl Into<String>,
        action: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::PluginLifecycle {
            plugin: plugin.into(),
            action: action.into(),
            source: source.into(),
        }
    }

    /// Wraps a failed tap.
    pub fn tap_failed(hook: impl Into<String>, plugin: impl Into<String>, source: anyhow::Error) -> Self {
        Self::TapFailed {
            hook: hook.into(),
            plugin: plugin.into(),
            source: source.into(),
        }
    }

    /// Wraps a failed service factory.
    pub fn service_factory(service: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ServiceFactory {
            service: service.into(),
            source: source.into(),
        }
    }

    /// Builds an illegal-transition error.
    pub fn invalid_transition(
        plugin: impl Into<String>,
        state: impl fmt::Display,
        action: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            plugin: plugin.into(),
            state: state.to_string(),
            action: action.into(),
        }
    }

    /// Returns whether this is a `CircularDependency` error.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}

impl From<config::ConfigError> for KernelError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
