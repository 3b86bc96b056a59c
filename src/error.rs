//! Error types for the plugin runtime, its registries and the property tree.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A lookup missed.
    NotFound,
    /// Something with the same name or key already exists.
    Duplicate,
    /// A module broke the plugin binary contract.
    ContractViolation,
    /// An allocation failed.
    ResourceExhaustion,
    /// The operation would break a structural invariant.
    StructuralViolation,
    /// Bad configuration input.
    Config,
    /// Operating system I/O failure.
    Io,
}

/// Errors that can occur during plugin operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Plugin not found.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// Plugin already loaded.
    #[error("plugin already loaded: {0}")]
    PluginAlreadyLoaded(String),

    /// No file in the plugin directory satisfied the request.
    #[error("no plugin file matches \"{name}\" ({policy} version {version})")]
    NoMatchingFile {
        /// Requested plugin name.
        name: String,
        /// Version policy used for the search.
        policy: String,
        /// Requested version.
        version: String,
    },

    /// The module could not be opened.
    #[error("failed to open module {path}: {reason}")]
    ModuleOpen {
        /// Path or catalog name of the module.
        path: String,
        /// Loader message.
        reason: String,
    },

    /// The module could not be closed.
    #[error("failed to close module {path}: {reason}")]
    ModuleClose {
        /// Path or catalog name of the module.
        path: String,
        /// Loader message.
        reason: String,
    },

    /// A required entry point is not exported by the module.
    #[error("module {module} does not export {symbol}")]
    MissingSymbol {
        /// Module name.
        module: String,
        /// Missing symbol name.
        symbol: String,
    },

    /// Plugin initialization failed.
    #[error("plugin initialization failed: {0}")]
    InitializationFailed(String),

    /// A loaded plugin reports a different version than its file name.
    #[error("plugin claims to be version {claimed}, but the file name is \"{file}\"")]
    VersionMismatch {
        /// Version the plugin reported from init.
        claimed: String,
        /// File the plugin was loaded from.
        file: String,
    },

    /// Plugin start failed.
    #[error("plugin {name} failed to start: {reason}")]
    StartFailed {
        /// Plugin name.
        name: String,
        /// Reason reported by the plugin.
        reason: String,
    },

    /// Plugin in invalid state for operation.
    #[error("invalid plugin state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state.
        expected: String,
        /// Actual state.
        actual: String,
    },

    /// A required plugin from a load list could not be brought up.
    #[error("required plugin {0} failed to load")]
    RequiredPluginFailed(String),

    /// Service name already taken.
    #[error("service already registered: {0}")]
    DuplicateService(String),

    /// Service lookup missed.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// Event name already taken.
    #[error("event already exists: {0}")]
    DuplicateEvent(String),

    /// Event lookup missed.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// The namespace already listens to the event.
    #[error("{namespace} already listens to {event}")]
    DuplicateListener {
        /// Listener namespace.
        namespace: String,
        /// Full event name.
        event: String,
    },

    /// No listener from the namespace on the event.
    #[error("no listener from {namespace} on {event}")]
    ListenerNotFound {
        /// Listener namespace.
        namespace: String,
        /// Full event name.
        event: String,
    },

    /// Map key already present.
    #[error("key {0:#x} already present")]
    DuplicateKey(u64),

    /// Property tree path did not resolve.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Property tree path is empty or has an empty segment.
    #[error("invalid path: \"{0}\"")]
    InvalidPath(String),

    /// Property tree leaf already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// Re-parenting would create a cycle.
    #[error("cannot move {node} under its own descendant {parent}")]
    CycleDetected {
        /// Node being moved.
        node: String,
        /// Requested parent.
        parent: String,
    },

    /// A valued node cannot be cloned.
    #[error("node {0} has a value but no duplicator")]
    NotDuplicable(String),

    /// A duplicator refused to clone a value.
    #[error("failed to duplicate value of node {0}")]
    DuplicationFailed(String),

    /// Simulated or real allocation failure.
    #[error("out of memory in {0}")]
    OutOfMemory(&'static str),

    /// Version string not in major.minor.patch form.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Unknown version policy.
    #[error("invalid version policy \"{0}\", need either \"minimum\" or \"exact\"")]
    InvalidPolicy(String),

    /// Missing key in a load list entry.
    #[error("missing required key: {0}")]
    MissingKey(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings or load list parse error.
    #[cfg(feature = "serde")]
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

impl Error {
    /// Create a plugin not found error.
    pub fn plugin_not_found(name: impl Into<String>) -> Self {
        Self::PluginNotFound(name.into())
    }

    /// Create a missing symbol error.
    pub fn missing_symbol(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::MissingSymbol {
            module: module.into(),
            symbol: symbol.into(),
        }
    }

    /// Create a module open error.
    pub fn module_open(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a module close error.
    pub fn module_close(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleClose {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an initialization failed error.
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a start failed error.
    pub fn start_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PluginNotFound(_)
            | Self::NoMatchingFile { .. }
            | Self::ServiceNotFound(_)
            | Self::EventNotFound(_)
            | Self::ListenerNotFound { .. }
            | Self::NodeNotFound(_) => ErrorKind::NotFound,

            Self::PluginAlreadyLoaded(_)
            | Self::DuplicateService(_)
            | Self::DuplicateEvent(_)
            | Self::DuplicateListener { .. }
            | Self::DuplicateKey(_)
            | Self::NodeExists(_) => ErrorKind::Duplicate,

            Self::ModuleOpen { .. }
            | Self::ModuleClose { .. }
            | Self::MissingSymbol { .. }
            | Self::InitializationFailed(_)
            | Self::VersionMismatch { .. }
            | Self::StartFailed { .. }
            | Self::InvalidState { .. }
            | Self::RequiredPluginFailed(_) => ErrorKind::ContractViolation,

            Self::OutOfMemory(_) => ErrorKind::ResourceExhaustion,

            Self::CycleDetected { .. }
            | Self::NotDuplicable(_)
            | Self::DuplicationFailed(_) => ErrorKind::StructuralViolation,

            Self::InvalidVersion(_)
            | Self::InvalidPolicy(_)
            | Self::MissingKey(_)
            | Self::InvalidPath(_) => ErrorKind::Config,
            #[cfg(feature = "serde")]
            Self::ConfigParse(_) => ErrorKind::Config,

            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns true if the caller can carry on as if the operation was a no-op.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::Duplicate | ErrorKind::StructuralViolation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::plugin_not_found("renderer");
        assert_eq!(err.to_string(), "plugin not found: renderer");

        let err = Error::VersionMismatch {
            claimed: "2.0.0".into(),
            file: "plugins/foo-1-0-0.so".into(),
        };
        assert!(err.to_string().contains("2.0.0"));
        assert!(err.to_string().contains("foo-1-0-0.so"));

        let err = Error::module_close("plugins/foo-1-0-0.so", "busy");
        assert_eq!(
            err.to_string(),
            "failed to close module plugins/foo-1-0-0.so: busy"
        );
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(Error::plugin_not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::DuplicateService("a.b".into()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            Error::missing_symbol("foo", "plugin_stop").kind(),
            ErrorKind::ContractViolation
        );
        assert_eq!(
            Error::OutOfMemory("map").kind(),
            ErrorKind::ResourceExhaustion
        );

        assert!(Error::plugin_not_found("test").is_recoverable());
        assert!(!Error::init_failed("test").is_recoverable());
        assert!(!Error::OutOfMemory("map").is_recoverable());
    }
}
