use thiserror::Error;

use crate::types::DynError;

/// Errors surfaced by scope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// A mandatory lookup found nothing to resolve
    #[error("instance of type '{type_name}' (classifier: '{classifier}') was not found in scopes")]
    NotFound {
        type_name: &'static str,
        classifier: String,
    },

    /// More than one factory matched where a single one is expected
    #[error(
        "multiple factories can provide type '{type_name}' (classifier: '{classifier}') \
         while a single one is expected"
    )]
    AmbiguousBinding {
        type_name: &'static str,
        classifier: String,
    },

    /// An explicit bind collided with an existing binding in the same scope
    #[error("instance '{key}' is already bound in this scope")]
    DuplicateBinding { key: String },

    /// A construction chain requested a key that is already being constructed
    #[error("unresolved circular dependency: {chain}")]
    CircularDependency { chain: String },

    /// The scope has been disposed and rejects all operations
    #[error("scope is disposed")]
    Disposed,

    /// A factory declared a selector no filter is registered for
    #[error(
        "factory for type '{type_name}' requires selector '{selector}', \
         but no filter is registered under that name"
    )]
    MissingSelector {
        type_name: &'static str,
        selector: String,
    },

    /// A capability type has no registered scope factory, the registry is incomplete
    #[error("no scope factory registered for capability type '{type_name}'")]
    MissingScopeFactory { type_name: &'static str },

    /// A resolved object does not have the requested type
    #[error("failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },

    /// A factory's construction body failed, the source error is passed through
    #[error("factory for '{type_name}' failed - error: {error}")]
    Construction {
        type_name: &'static str,
        error: DynError,
    },
}

/// Errors when installing the process-wide registry
#[derive(Error, Debug)]
pub enum InstallError {
    /// The registry can only be installed once per process
    #[error("a factory registry is already installed")]
    AlreadyInstalled,
}
