/// Raised while building a provider from its raw configuration. Always fatal
/// to that provider instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown provider type `{0}`")]
    UnknownProviderType(String),
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("remote returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The remote instance is asleep and must be woken by its owner before
    /// any call can succeed.
    #[error("instance is hibernating: {0}")]
    Hibernating(String),
    #[error("cannot format event: {0}")]
    Format(String),
    #[error("{provider_type} does not support {operation}")]
    Unsupported {
        provider_type: &'static str,
        operation: &'static str,
    },
    #[error("{0}")]
    Remote(String),
    #[error("queue error: {0}")]
    Queue(String),
}

impl ProviderError {
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format(reason.into())
    }

    pub fn unsupported(provider_type: &'static str, operation: &'static str) -> Self {
        Self::Unsupported {
            provider_type,
            operation,
        }
    }
}
