use thiserror::Error;

use crate::ca::CaError;
use crate::gateway::GatewayError;

pub type Result<T> = std::result::Result<T, InjectorError>;

/// Every failure that can end an admission call.  None of these are retried internally; they are
/// rendered into the denied admission response.
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("could not decode admission payload: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: UpstreamError,
    },

    #[error("unsupported value {value:?} for {key}")]
    UnsupportedValue { key: String, value: String },

    #[error("could not parse value for {key}: {reason}")]
    Parse { key: String, reason: String },

    #[error("could not serialize patch: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Ca(#[from] CaError),
}

impl InjectorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(context: impl Into<String>, source: impl Into<UpstreamError>) -> Self {
        Self::Upstream { context: context.into(), source: source.into() }
    }
}
