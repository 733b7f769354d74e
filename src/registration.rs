//! Gateway route registration and mesh certificate issuance.
//!
//! Both run during the admission call, before the patch is built, because the patch carries the
//! gateway IDs they produce.  Neither is transactional: a step that fails leaves the steps before
//! it in place, both in the gateway and in the caller's annotation map.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use kube::core::ResourceExt;
use serde_json::{json, Value};
use tracing::*;

use crate::ca::CertificateAuthority;
use crate::config::SidecarConfig;
use crate::constants::*;
use crate::errors::{InjectorError, Result, UpstreamError};
use crate::gateway::{ApiDefinition, Gateway};
use crate::processor;

/// What the injector asks the gateway to route for one workload role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteOptions {
    pub slug: String,
    pub name: String,
    pub target: String,
    pub listen_path: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

impl RouteOptions {
    pub fn inbound(app: &str, hostname: &str) -> Self {
        let slug = format!("{app}{INBOUND_SLUG_SUFFIX}");
        RouteOptions {
            name: slug.clone(),
            slug,
            target: INBOUND_TARGET.into(),
            listen_path: INBOUND_LISTEN_PATH.into(),
            hostname: hostname.into(),
            tags: vec![app.into()],
        }
    }

    /// The mesh route points at the cluster service rather than the pod, so the cluster can load
    /// balance it.
    pub fn mesh(app: &str, hostname: &str, listen_path: &str, tls: bool) -> Self {
        let slug = format!("{app}{MESH_SLUG_SUFFIX}");
        let scheme = if tls { "https" } else { "http" };
        RouteOptions {
            name: slug.clone(),
            slug,
            target: format!("{scheme}://{hostname}:{SIDECAR_PORT}"),
            listen_path: listen_path.into(),
            hostname: MESH_HOSTNAME.into(),
            tags: vec![MESH_TAG.into()],
        }
    }

    pub fn document(&self) -> Value {
        json!({
            "name": self.name,
            "slug": self.slug,
            "domain": self.hostname,
            "tags": self.tags,
            "active": true,
            "use_keyless": true,
            "certificates": [],
            "proxy": {
                "listen_path": self.listen_path,
                "target_url": self.target,
                "strip_listen_path": true,
            },
        })
    }

    /// Render the definition, with any typed annotations applied on top.
    pub fn definition(&self, annotations: Option<&BTreeMap<String, String>>) -> Result<ApiDefinition> {
        let mut document = self.document();
        if let Some(annotations) = annotations {
            processor::process(annotations, &mut document)?;
        }
        Ok(serde_json::from_value(document)?)
    }
}

/// Look up or create the inbound and mesh routes for `pod`, recording their IDs in
/// `annotations`.
///
/// An existing inbound-service-id annotation makes this a no-op; whether that route still exists
/// in the gateway is not checked.  On failure the IDs recorded so far stay in `annotations`.
#[instrument(skip_all, fields(namespace = %namespace))]
pub async fn create_service_routes(
    gateway: &dyn Gateway,
    pod: &Pod,
    annotations: &mut BTreeMap<String, String>,
    namespace: &str,
    tls: bool,
) -> Result<()> {
    if annotations.contains_key(INBOUND_SERVICE_ID_ANNOTATION_KEY) {
        info!("routes already registered, skipping");
        return Ok(());
    }

    let app = pod
        .labels()
        .get(APP_LABEL_KEY)
        .ok_or_else(|| InjectorError::validation(format!("{APP_LABEL_KEY} label is required")))?;
    let namespace = if namespace.is_empty() { DEFAULT_NAMESPACE } else { namespace };
    let hostname = format!("{app}.{namespace}");

    let inbound = RouteOptions::inbound(app, &hostname);
    let definition = inbound.definition(Some(&*annotations))?;
    let ensured = gateway
        .ensure_service(&definition)
        .await
        .map_err(|e| InjectorError::upstream(format!("failed to create inbound service {}", inbound.slug), e))?;
    info!(created = ensured.created, "inbound service {} has ID {}", inbound.slug, ensured.id);
    annotations.insert(INBOUND_SERVICE_ID_ANNOTATION_KEY.into(), ensured.id);

    let listen_path = annotations.get(ROUTE_ANNOTATION_KEY).map(String::as_str).unwrap_or(app);
    let mesh = RouteOptions::mesh(app, &hostname, listen_path, tls);
    let definition = mesh.definition(None)?;
    let ensured = gateway
        .ensure_service(&definition)
        .await
        .map_err(|e| InjectorError::upstream(format!("failed to create mesh service {}", mesh.slug), e))?;
    info!(created = ensured.created, "mesh service {} has ID {}", mesh.slug, ensured.id);
    annotations.insert(MESH_SERVICE_ID_ANNOTATION_KEY.into(), ensured.id);

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CertStep {
    ResolveDomain,
    GenerateCertificate,
    UploadCertificate,
    StoreReference,
    AttachToDefinition,
}

impl fmt::Display for CertStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolveDomain => "resolve domain",
            Self::GenerateCertificate => "generate certificate",
            Self::UploadCertificate => "upload certificate",
            Self::StoreReference => "store certificate reference",
            Self::AttachToDefinition => "attach certificate to API definition",
        };
        f.write_str(name)
    }
}

/// Issue a server certificate for one API definition and attach it.
///
/// Steps run strictly in order and the furthest completed one is recorded, but nothing is undone
/// on failure; an uploaded certificate whose definition update fails stays uploaded.
pub struct CertificateSaga<'a> {
    gateway: &'a dyn Gateway,
    ca: &'a dyn CertificateAuthority,
    api_id: String,
    byo_certificate: Option<String>,
    furthest: Option<CertStep>,
}

impl<'a> CertificateSaga<'a> {
    pub fn new(gateway: &'a dyn Gateway, ca: &'a dyn CertificateAuthority, api_id: &str) -> Self {
        CertificateSaga { gateway, ca, api_id: api_id.into(), byo_certificate: None, furthest: None }
    }

    /// Attach an already-uploaded certificate instead of issuing a new one.
    pub fn with_certificate(mut self, certificate_id: Option<&str>) -> Self {
        self.byo_certificate = certificate_id.map(String::from);
        self
    }

    pub fn furthest_completed(&self) -> Option<CertStep> {
        self.furthest
    }

    fn complete(&mut self, step: CertStep) {
        debug!("MeshTLS: {step} done for {}", self.api_id);
        self.furthest = Some(step);
    }

    fn upstream_failure(&self, step: CertStep, context: &str, source: impl Into<UpstreamError>) -> InjectorError {
        warn!(api_id = %self.api_id, completed = ?self.furthest, "MeshTLS: {step} failed");
        InjectorError::upstream(context, source)
    }

    /// Returns the ID of the certificate now attached to the definition.
    pub async fn run(&mut self) -> Result<String> {
        let certificate_id = match self.byo_certificate.clone() {
            Some(id) => id,
            None => self.issue().await?,
        };

        let step = CertStep::AttachToDefinition;
        let mut definition = self
            .gateway
            .get_by_object_id(&self.api_id)
            .await
            .map_err(|e| self.upstream_failure(step, "failed to retrieve API definition", e))?;
        definition.certificates.push(certificate_id.clone());
        self.gateway.update_api(&definition).await.map_err(|e| {
            let context = format!("failed to store updated API Definition ({})", definition.id);
            self.upstream_failure(step, &context, e)
        })?;
        self.complete(step);
        info!("MeshTLS: updated API definition {} to use certificate {certificate_id}", self.api_id);

        Ok(certificate_id)
    }

    async fn issue(&mut self) -> Result<String> {
        let step = CertStep::ResolveDomain;
        let definition = self
            .gateway
            .get_by_object_id(&self.api_id)
            .await
            .map_err(|e| self.upstream_failure(step, "can't generate certificate", e))?;
        if definition.domain.is_empty() {
            warn!(api_id = %self.api_id, "MeshTLS: {step} failed");
            return Err(InjectorError::validation(format!("domain cannot be empty for API {}", self.api_id)));
        }
        self.complete(step);

        let step = CertStep::GenerateCertificate;
        let mut bundle = self
            .ca
            .generate_cert(&definition.domain)
            .await
            .map_err(|e| self.upstream_failure(step, "can't generate certificate", e))?;
        self.complete(step);
        info!("MeshTLS: generated server certificate for {}", definition.domain);

        let step = CertStep::UploadCertificate;
        let certificate_id = self
            .gateway
            .create_certificate(&bundle.bundled, &bundle.private_key)
            .await
            .map_err(|e| self.upstream_failure(step, "failed to upload certificate to gateway certificate store", e))?;
        bundle.fingerprint = certificate_id.clone();
        self.complete(step);

        let step = CertStep::StoreReference;
        self.ca
            .store_cert(&bundle)
            .await
            .map_err(|e| self.upstream_failure(step, "failed to store certificate reference in controller store", e))?;
        self.complete(step);

        Ok(certificate_id)
    }
}

/// Run the certificate saga for the inbound definition, then for the mesh definition.  A no-op
/// unless mesh TLS is enabled.
#[instrument(skip_all)]
pub async fn handle_mesh_tls(
    gateway: &dyn Gateway,
    ca: &dyn CertificateAuthority,
    config: &SidecarConfig,
    annotations: &BTreeMap<String, String>,
) -> Result<()> {
    if !config.enable_mesh_tls {
        info!("mesh TLS disabled, skipping");
        return Ok(());
    }

    let inbound_id = annotations
        .get(INBOUND_SERVICE_ID_ANNOTATION_KEY)
        .ok_or_else(|| InjectorError::validation("can't generate server cert without an inbound API ID"))?;
    info!("MeshTLS: starting last-mile TLS generation");
    CertificateSaga::new(gateway, ca, inbound_id).run().await?;

    // a cert for https://mesh keeps the hop from the gateway to the service encrypted too
    let mesh_id = annotations
        .get(MESH_SERVICE_ID_ANNOTATION_KEY)
        .ok_or_else(|| InjectorError::validation("can't generate server cert without a mesh API ID"))?;
    CertificateSaga::new(gateway, ca, mesh_id)
        .with_certificate(config.byo_mesh_certificate())
        .run()
        .await?;

    Ok(())
}
