use std::collections::BTreeMap;
use std::sync::Arc;

use json_patch::Patch;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, SerializePatchError};
use kube::core::{DynamicObject, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::*;

use crate::ca::CertificateAuthority;
use crate::config::SidecarConfig;
use crate::constants::*;
use crate::errors::{InjectorError, Result};
use crate::gateway::Gateway;
use crate::patch::PatchBuilder;
use crate::{policy, registration, sidecar};

/// How a decoded request leaves the dispatcher when nothing went wrong.
#[derive(Debug)]
pub enum Outcome {
    /// Admitted unmodified
    Skipped,
    /// Admitted with this patch attached
    Mutated(Patch),
}

impl Outcome {
    fn respond(self, res: AdmissionResponse) -> std::result::Result<AdmissionResponse, SerializePatchError> {
        match self {
            Outcome::Skipped => Ok(res),
            Outcome::Mutated(patch) => res.with_patch(patch),
        }
    }
}

/// The admission dispatcher.  Everything it holds is read-only after startup, so one instance is
/// shared by every concurrent request.
#[derive(Clone)]
pub struct Injector {
    config: Arc<SidecarConfig>,
    gateway: Arc<dyn Gateway>,
    ca: Arc<dyn CertificateAuthority>,
}

impl Injector {
    pub fn new(config: Arc<SidecarConfig>, gateway: Arc<dyn Gateway>, ca: Arc<dyn CertificateAuthority>) -> Self {
        Injector { config, gateway, ca }
    }

    /// Handle a raw AdmissionReview body.  Always produces a review; failures are reported as a
    /// disallowed response rather than a transport error.
    pub async fn handle(&self, body: &[u8]) -> AdmissionReview<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(err) => {
                error!("can't decode body: {err}");
                return AdmissionResponse::invalid(InjectorError::Decode(err.to_string())).into_review();
            },
        };
        self.review(review).await
    }

    pub async fn review(&self, review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
        let req: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(req) => req,
            Err(err) => {
                error!("invalid request: {err}");
                return AdmissionResponse::invalid(InjectorError::Decode(err.to_string())).into_review();
            },
        };

        let res = match self.mutate(&req).await {
            Ok(outcome) => outcome.respond(AdmissionResponse::from(&req)).unwrap_or_else(|err| {
                error!("could not serialize patch: {err}");
                AdmissionResponse::from(&req).deny(err)
            }),
            Err(err) => {
                warn!("denied: {:?} on {} {} ({err})", req.operation, req.kind.kind, req.name);
                AdmissionResponse::from(&req).deny(err)
            },
        };
        res.into_review()
    }

    #[instrument(skip_all, fields(uid = %req.uid, kind = %req.kind.kind))]
    pub async fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<Outcome> {
        // DELETE requests carry no object
        let Some(obj) = &req.object else {
            return Ok(Outcome::Skipped);
        };
        let namespace = req.namespace.clone().or_else(|| obj.namespace()).unwrap_or_default();

        info!(
            "AdmissionReview for Kind={}, Namespace={namespace} Name={} UID={} Operation={:?} UserInfo={:?}",
            req.kind.kind, req.name, req.uid, req.operation, req.user_info
        );

        match req.kind.kind.to_ascii_lowercase().as_str() {
            "pod" => self.mutate_pod(decode(obj)?, &namespace).await,
            "service" => self.mutate_service(decode(obj)?, &namespace),
            _ => Err(InjectorError::validation("type not supported")),
        }
    }

    pub async fn mutate_pod(&self, pod: Pod, namespace: &str) -> Result<Outcome> {
        let name = object_name(&pod.metadata);
        let Some(mut annotations) = injection_annotations(namespace, &name, pod.annotations()) else {
            info!("skipping mutation for {namespace}/{name} due to policy check");
            return Ok(Outcome::Skipped);
        };

        // routes first, since the IDs they produce end up in the patch
        if self.config.create_routes {
            registration::create_service_routes(
                self.gateway.as_ref(),
                &pod,
                &mut annotations,
                namespace,
                self.config.enable_mesh_tls,
            )
            .await?;
        }
        registration::handle_mesh_tls(self.gateway.as_ref(), self.ca.as_ref(), &self.config, &annotations).await?;

        let spec = sidecar::assemble_pod(&pod, &self.config)?;
        let patch = PatchBuilder::new().replace_spec(&spec)?.set_annotations(&annotations)?.build();
        info!("mutated {namespace}/{name} with {} patch operations", patch.0.len());
        Ok(Outcome::Mutated(patch))
    }

    pub fn mutate_service(&self, svc: Service, namespace: &str) -> Result<Outcome> {
        let name = object_name(&svc.metadata);
        let Some(annotations) = injection_annotations(namespace, &name, svc.annotations()) else {
            info!("SERVICE: skipping mutation for {namespace}/{name} due to policy check");
            return Ok(Outcome::Skipped);
        };

        let patch = PatchBuilder::new()
            .service_port(&svc, &sidecar::sidecar_service_port())?
            .set_annotations(&annotations)?
            .build();
        Ok(Outcome::Mutated(patch))
    }
}

/// Run the policy check and, if the object is to be injected, return its annotations with the
/// status marker set and the inject toggle removed.
fn injection_annotations(
    namespace: &str,
    name: &str,
    annotations: &BTreeMap<String, String>,
) -> Option<BTreeMap<String, String>> {
    if !policy::mutation_required(namespace, name, annotations) {
        return None;
    }

    let mut annotations = annotations.clone();
    annotations.insert(STATUS_ANNOTATION_KEY.into(), STATUS_INJECTED.into());
    annotations.remove(INJECT_ANNOTATION_KEY);
    Some(annotations)
}

// The apiserver may not have generated a name yet
fn object_name(meta: &ObjectMeta) -> String {
    meta.name.clone().or_else(|| meta.generate_name.clone()).unwrap_or_default()
}

fn decode<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|err| InjectorError::Decode(format!("could not unmarshal raw object: {err}")))
}
