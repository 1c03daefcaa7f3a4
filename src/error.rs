use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("regex search requested but the string store does not support it")]
    RegexUnsupported,

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no strings match '{0}'")]
    NoMatches(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ReplaceError {
    pub fn config(message: impl Into<String>) -> Self {
        ReplaceError::Configuration(message.into())
    }
}

/// Operator input outside the alphabet accepted by the current prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{input}' is not one of: {allowed}")]
pub struct InvalidAnswer {
    pub input: String,
    pub allowed: &'static str,
}

pub type ReplaceResult<T> = std::result::Result<T, ReplaceError>;
