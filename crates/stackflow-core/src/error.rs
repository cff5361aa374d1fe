use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a descriptor set.
///
/// Every variant is a configuration error: nothing is provisioned when one
/// of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("IO error: {path}\nreason: {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("template render error: {0}")]
    TemplateRenderError(String),

    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("resource '{resource}' has unknown kind '{kind}'")]
    UnknownKind { resource: String, kind: String },

    #[error("resource '{resource}' depends on unknown resource '{dependency}'")]
    UnknownDependency {
        resource: String,
        dependency: String,
    },

    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("resource '{resource}' references '{reference}' which is not one of its dependencies")]
    InvalidReference { resource: String, reference: String },

    #[error(
        "resource '{resource}' embeds a credential in '{key}'\nhint: use value_env or generate instead of a literal"
    )]
    EmbeddedCredential { resource: String, key: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
