mod dashboard;
mod memory;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use self::dashboard::DashboardGateway;
pub use self::memory::{MemoryGateway, StoredCertificate};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API definition {0} not found")]
    NotFound(String),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("gateway rejected request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// The subset of a gateway API definition the injector reads or writes; every other field is
/// carried through untouched in `extra`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ApiDefinition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub api_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub certificates: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiDefinition {
    pub fn listen_path(&self) -> Option<&str> {
        self.extra.get("proxy")?.get("listen_path")?.as_str()
    }

    pub fn target_url(&self) -> Option<&str> {
        self.extra.get("proxy")?.get("target_url")?.as_str()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnsuredService {
    pub id: String,
    pub created: bool,
}

/// The external API gateway.  Implementations are expected to carry their own request timeouts;
/// any failure is fatal to the admission call that triggered it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Return the ID of the definition registered under `definition.slug`, creating it first if
    /// there is none.
    async fn ensure_service(&self, definition: &ApiDefinition) -> Result<EnsuredService, GatewayError>;

    async fn get_by_object_id(&self, id: &str) -> Result<ApiDefinition, GatewayError>;

    async fn update_api(&self, definition: &ApiDefinition) -> Result<(), GatewayError>;

    /// Upload a PEM certificate chain and its key to the gateway's certificate store, returning
    /// the certificate ID.
    async fn create_certificate(&self, bundle: &str, key: &str) -> Result<String, GatewayError>;
}
