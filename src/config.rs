use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Container;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::*;

/// The declarative sidecar template; read once at startup and never modified afterwards.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidecarConfig {
    pub containers: Vec<Container>,
    pub init_containers: Vec<Container>,
    pub create_routes: bool,
    #[serde(rename = "enableMeshTLS")]
    pub enable_mesh_tls: bool,
    #[serde(rename = "meshCertificateID")]
    pub mesh_certificate_id: String,
}

impl SidecarConfig {
    pub fn from_yaml(data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data).context("could not parse sidecar template")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
        info!("new sidecar configuration: sha256sum {}", content_hash(&data));
        Self::from_yaml(&data)
    }

    /// The pre-supplied mesh certificate, if the operator brought their own.
    pub fn byo_mesh_certificate(&self) -> Option<&str> {
        Some(self.mesh_certificate_id.as_str()).filter(|id| !id.is_empty())
    }
}

pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
