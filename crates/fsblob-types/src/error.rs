use thiserror::Error;

/// Errors produced while parsing or validating blob identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid blob name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("descriptor must carry a name, a key, or both")]
    EmptyDescriptor,

    #[error("operation requires a blob name")]
    MissingName,
}
