use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::*;

use super::{ApiDefinition, EnsuredService, Gateway, GatewayError};

#[derive(Debug, Default)]
struct State {
    apis: BTreeMap<String, ApiDefinition>,
    certificates: BTreeMap<String, StoredCertificate>,
    next_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCertificate {
    pub bundle: String,
    pub key: String,
}

/// A process-local gateway.  The lookup and insert of `ensure_service` happen under one lock, so
/// concurrent admission calls for the same slug always agree on a single definition.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<ApiDefinition> {
        self.lock().apis.values().find(|d| d.slug == slug).cloned()
    }

    pub fn apis(&self) -> Vec<ApiDefinition> {
        self.lock().apis.values().cloned().collect()
    }

    pub fn certificate(&self, id: &str) -> Option<StoredCertificate> {
        self.lock().certificates.get(id).cloned()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn ensure_service(&self, definition: &ApiDefinition) -> Result<EnsuredService, GatewayError> {
        let mut state = self.lock();
        if let Some(existing) = state.apis.values().find(|d| d.slug == definition.slug) {
            debug!("reusing definition {} for slug {}", existing.id, existing.slug);
            return Ok(EnsuredService { id: existing.id.clone(), created: false });
        }

        state.next_id += 1;
        let id = format!("{:024x}", state.next_id);
        let mut created = definition.clone();
        created.id = id.clone();
        if created.api_id.is_empty() {
            created.api_id = format!("{:032x}", state.next_id);
        }
        state.apis.insert(id.clone(), created);
        info!("created definition {id} for slug {}", definition.slug);

        Ok(EnsuredService { id, created: true })
    }

    async fn get_by_object_id(&self, id: &str) -> Result<ApiDefinition, GatewayError> {
        self.lock().apis.get(id).cloned().ok_or_else(|| GatewayError::NotFound(id.into()))
    }

    async fn update_api(&self, definition: &ApiDefinition) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let existing = state
            .apis
            .get_mut(&definition.id)
            .ok_or_else(|| GatewayError::NotFound(definition.id.clone()))?;
        *existing = definition.clone();
        Ok(())
    }

    async fn create_certificate(&self, bundle: &str, key: &str) -> Result<String, GatewayError> {
        if bundle.is_empty() || key.is_empty() {
            return Err(GatewayError::Rejected("certificate and key must not be empty".into()));
        }

        let id = hex::encode(Sha256::digest(bundle.as_bytes()));
        self.lock()
            .certificates
            .insert(id.clone(), StoredCertificate { bundle: bundle.into(), key: key.into() });
        Ok(id)
    }
}
