use k8s_openapi::api::core::v1::ServicePort;

use super::*;
use crate::patch::PatchBuilder;
use crate::sidecar::sidecar_service_port;

fn ops(builder: PatchBuilder) -> Vec<Value> {
    match serde_json::to_value(builder.build()).unwrap() {
        Value::Array(ops) => ops,
        other => panic!("patch is not a list: {other}"),
    }
}

fn with_ports(mut svc: Service, count: i32) -> Service {
    let ports = (0..count)
        .map(|i| ServicePort { name: Some(format!("p{i}")), port: 9000 + i, ..Default::default() })
        .collect();
    svc.spec.as_mut().unwrap().ports = Some(ports);
    svc
}

#[rstest]
fn test_pod_patch_order(test_pod: Pod) {
    let annos = annotations(&[(STATUS_ANNOTATION_KEY, STATUS_INJECTED)]);
    let builder = PatchBuilder::new()
        .replace_spec(test_pod.spec.as_ref().unwrap())
        .unwrap()
        .set_annotations(&annos)
        .unwrap();

    let ops = ops(builder);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0]["op"], "replace");
    assert_eq!(ops[0]["path"], "/spec");
    assert_eq!(ops[0]["value"]["containers"][0]["name"], TEST_APP);
    assert_eq!(ops[1]["op"], "add");
    assert_eq!(ops[1]["path"], "/metadata/annotations");
    assert_eq!(ops[1]["value"], json!({STATUS_ANNOTATION_KEY: STATUS_INJECTED}));
}

#[rstest]
#[case::none(0)]
#[case::single(1)]
fn test_service_port_replaces_first(test_service: Service, #[case] count: i32) {
    let svc = with_ports(test_service, count);
    let ops = ops(PatchBuilder::new().service_port(&svc, &sidecar_service_port()).unwrap());

    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "replace");
    assert_eq!(ops[0]["path"], "/spec/ports/0");
    assert_eq!(ops[0]["value"], json!({"name": SIDECAR_PORT_NAME, "port": SIDECAR_PORT, "targetPort": SIDECAR_PORT}));
}

#[rstest]
fn test_service_port_appends_to_many(test_service: Service) {
    let svc = with_ports(test_service, 2);
    let ops = ops(PatchBuilder::new().service_port(&svc, &sidecar_service_port()).unwrap());

    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "add");
    assert_eq!(ops[0]["path"], "/spec/ports");
    let ports = ops[0]["value"].as_array().unwrap();
    assert_eq!(ports.len(), 3);
    assert_eq!(ports[0]["name"], "p0");
    assert_eq!(ports[1]["name"], "p1");
    assert_eq!(ports[2]["name"], SIDECAR_PORT_NAME);
}
