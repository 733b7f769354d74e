use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{PodSpec, Service, ServicePort};

use crate::errors::Result;

/// Ordered list of patch operations; the order is preserved in the serialized patch, so later
/// operations may rely on paths touched by earlier ones.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    ops: Vec<PatchOperation>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_spec(mut self, spec: &PodSpec) -> Result<Self> {
        self.ops.push(PatchOperation::Replace(ReplaceOperation {
            path: PointerBuf::from_tokens(["spec"]),
            value: serde_json::to_value(spec)?,
        }));
        Ok(self)
    }

    /// Sets the complete annotation map; `add` on an existing member replaces it.
    pub fn set_annotations(mut self, annotations: &BTreeMap<String, String>) -> Result<Self> {
        self.ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "annotations"]),
            value: serde_json::to_value(annotations)?,
        }));
        Ok(self)
    }

    /// A service exposing more than one port gets the sidecar port appended to its port list
    /// (`add /spec/ports`); otherwise the first port is replaced (`replace /spec/ports/0`).
    pub fn service_port(mut self, svc: &Service, port: &ServicePort) -> Result<Self> {
        let existing = svc.spec.as_ref().and_then(|s| s.ports.as_ref()).map(Vec::as_slice).unwrap_or_default();

        let op = if existing.len() > 1 {
            let mut ports = existing.to_vec();
            ports.push(port.clone());
            PatchOperation::Add(AddOperation {
                path: PointerBuf::from_tokens(["spec", "ports"]),
                value: serde_json::to_value(ports)?,
            })
        } else {
            PatchOperation::Replace(ReplaceOperation {
                path: PointerBuf::from_tokens(["spec", "ports", "0"]),
                value: serde_json::to_value(port)?,
            })
        };
        self.ops.push(op);
        Ok(self)
    }

    pub fn build(self) -> Patch {
        Patch(self.ops)
    }
}
