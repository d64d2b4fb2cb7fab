use thiserror::Error;

/// Errors raised by the fallible glue around the sanitizer: policy loading,
/// selector parsing and I/O. Sanitizing itself never fails.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Policy file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Policy serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("URI scheme {0:?} must end with ':'")]
    InvalidScheme(String),

    #[error("Invalid tag or attribute name {0:?}")]
    InvalidTag(String),

    #[error("Maximum nesting depth must be at least 1")]
    InvalidDepth,

    #[error("Unsupported selector {0:?}")]
    InvalidSelector(String),
}

pub type Result<T> = std::result::Result<T, Error>;
