mod local;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use self::local::{LocalCa, CA_VALIDITY_YEARS, CERT_VALIDITY_YEARS};

#[derive(Debug, Error)]
pub enum CaError {
    #[error("invalid CA material: {0}")]
    InvalidCa(String),

    #[error("certificate generation failed: {0}")]
    Generation(String),

    #[error("certificate store failed: {0}")]
    Store(String),
}

/// Freshly issued TLS material.  The injector only holds it until it has been handed to the
/// gateway and the CA store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertBundle {
    pub certificate: String,
    pub private_key: String,
    pub issuing_ca: String,
    /// Leaf certificate followed by the issuing CA
    pub bundled: String,
    /// sha256 of the leaf; replaced by the gateway's certificate ID once uploaded
    pub fingerprint: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn generate_cert(&self, hostname: &str) -> Result<CertBundle, CaError>;

    /// Persist a reference to an issued certificate, returning the reference ID.
    async fn store_cert(&self, bundle: &CertBundle) -> Result<String, CaError>;
}
