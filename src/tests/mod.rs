mod ca_test;
mod config_test;
mod patch_test;
mod policy_test;

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, Pod, Service};
use rstest::*;
use serde_json::{json, Value};

use crate::admission::Injector;
use crate::ca::LocalCa;
use crate::config::SidecarConfig;
use crate::constants::*;
use crate::gateway::MemoryGateway;

pub const TEST_NAMESPACE: &str = "shop";
pub const TEST_APP: &str = "orders";
pub const TEST_POD_NAME: &str = "orders-7d4b9";

#[fixture]
pub fn test_pod() -> Pod {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": TEST_POD_NAME,
            "namespace": TEST_NAMESPACE,
            "labels": {APP_LABEL_KEY: TEST_APP},
            "annotations": {INJECT_ANNOTATION_KEY: "true"},
        },
        "spec": {
            "containers": [{"name": TEST_APP, "image": "registry.local/orders:1.4.2"}],
        },
    }))
    .unwrap()
}

#[fixture]
pub fn test_service() -> Service {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": TEST_APP,
            "namespace": TEST_NAMESPACE,
            "annotations": {INJECT_ANNOTATION_KEY: "yes"},
        },
        "spec": {
            "selector": {APP_LABEL_KEY: TEST_APP},
            "ports": [{"name": "http", "port": 80, "targetPort": 6767}],
        },
    }))
    .unwrap()
}

#[fixture]
pub fn sidecar_config() -> SidecarConfig {
    SidecarConfig {
        containers: vec![Container {
            name: MESH_CONTAINER_NAME.into(),
            image: Some("tykio/tyk-gateway:v5".into()),
            ..Default::default()
        }],
        init_containers: vec![Container {
            name: "tyk-mesh-init".into(),
            image: Some("tykio/mesh-init:v1".into()),
            ..Default::default()
        }],
        create_routes: true,
        enable_mesh_tls: false,
        mesh_certificate_id: String::new(),
    }
}

#[fixture]
pub fn gateway() -> Arc<MemoryGateway> {
    Arc::new(MemoryGateway::new())
}

#[fixture]
pub fn local_ca() -> Arc<LocalCa> {
    Arc::new(LocalCa::new("test-mesh-ca").unwrap())
}

pub fn build_injector(config: SidecarConfig, gateway: Arc<MemoryGateway>, ca: Arc<LocalCa>) -> Injector {
    Injector::new(Arc::new(config), gateway, ca)
}

pub fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// A serialized AdmissionReview wrapping `object`, the way the apiserver sends it
pub fn admission_review(kind: &str, object: Option<Value>) -> Vec<u8> {
    let mut request = json!({
        "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
        "kind": {"group": "", "version": "v1", "kind": kind},
        "resource": {"group": "", "version": "v1", "resource": format!("{}s", kind.to_lowercase())},
        "name": TEST_POD_NAME,
        "namespace": TEST_NAMESPACE,
        "operation": "CREATE",
        "userInfo": {"username": "system:serviceaccount:kube-system:replicaset-controller"},
        "dryRun": false,
    });
    match object {
        Some(obj) => request["object"] = obj,
        None => request["operation"] = json!("DELETE"),
    }

    serde_json::to_vec(&json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request,
    }))
    .unwrap()
}
