use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, ExtendedKeyUsagePurpose, IsCa, Issuer,
    KeyPair, KeyUsagePurpose,
};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::*;

use super::{CaError, CertBundle, CertificateAuthority};

const ORGANIZATION: &str = "Tyk Mesh";

pub const CA_VALIDITY_YEARS: i64 = 10;
pub const CERT_VALIDITY_YEARS: i64 = 1;

fn compute_validity(years: i64) -> (OffsetDateTime, OffsetDateTime) {
    let now = OffsetDateTime::now_utc();
    (now, now + time::Duration::days(years * 365))
}

/// Signs mesh server certificates with a CA held in process memory, and keeps the issued
/// certificate references in memory as well.
pub struct LocalCa {
    ca_cert_pem: String,
    ca_key_pem: String,
    store: Mutex<BTreeMap<String, CertBundle>>,
}

impl LocalCa {
    /// Create a new self-signed CA
    pub fn new(common_name: &str) -> Result<Self, CaError> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let (not_before, not_after) = compute_validity(CA_VALIDITY_YEARS);
        params.not_before = not_before;
        params.not_after = not_after;

        let key_pair =
            KeyPair::generate().map_err(|e| CaError::InvalidCa(format!("failed to generate CA key: {e}")))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CaError::InvalidCa(format!("failed to create CA cert: {e}")))?;

        Ok(Self::from_parts(cert.pem(), key_pair.serialize_pem()))
    }

    /// Load the CA from PEM
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, CaError> {
        let key = KeyPair::from_pem(key_pem).map_err(|e| CaError::InvalidCa(format!("failed to parse CA key: {e}")))?;
        Issuer::from_ca_cert_pem(cert_pem, &key)
            .map_err(|e| CaError::InvalidCa(format!("failed to parse CA cert: {e}")))?;

        Ok(Self::from_parts(cert_pem.into(), key_pem.into()))
    }

    fn from_parts(ca_cert_pem: String, ca_key_pem: String) -> Self {
        Self { ca_cert_pem, ca_key_pem, store: Mutex::new(BTreeMap::new()) }
    }

    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    pub fn stored(&self, reference: &str) -> Option<CertBundle> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).get(reference).cloned()
    }
}

#[async_trait]
impl CertificateAuthority for LocalCa {
    async fn generate_cert(&self, hostname: &str) -> Result<CertBundle, CaError> {
        let mut params = CertificateParams::new(vec![hostname.to_string()])
            .map_err(|e| CaError::Generation(format!("invalid hostname {hostname}: {e}")))?;
        params.distinguished_name = distinguished_name(hostname);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
        let (not_before, not_after) = compute_validity(CERT_VALIDITY_YEARS);
        params.not_before = not_before;
        params.not_after = not_after;

        let ca_key = KeyPair::from_pem(&self.ca_key_pem)
            .map_err(|e| CaError::InvalidCa(format!("failed to load CA key: {e}")))?;
        let issuer = Issuer::from_ca_cert_pem(&self.ca_cert_pem, &ca_key)
            .map_err(|e| CaError::InvalidCa(format!("failed to create issuer: {e}")))?;

        let key = KeyPair::generate().map_err(|e| CaError::Generation(format!("failed to generate key: {e}")))?;
        let cert = params
            .signed_by(&key, &issuer)
            .map_err(|e| CaError::Generation(format!("failed to sign certificate for {hostname}: {e}")))?;

        debug!("issued certificate for {hostname}");
        let certificate = cert.pem();
        Ok(CertBundle {
            bundled: format!("{certificate}{}", self.ca_cert_pem),
            fingerprint: hex::encode(Sha256::digest(cert.der())),
            certificate,
            private_key: key.serialize_pem(),
            issuing_ca: self.ca_cert_pem.clone(),
        })
    }

    async fn store_cert(&self, bundle: &CertBundle) -> Result<String, CaError> {
        if bundle.fingerprint.is_empty() {
            return Err(CaError::Store("certificate has no fingerprint".into()));
        }

        let reference = bundle.fingerprint.clone();
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.clone(), bundle.clone());
        Ok(reference)
    }
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    dn.push(DnType::OrganizationName, DnValue::Utf8String(ORGANIZATION.to_string()));
    dn
}
