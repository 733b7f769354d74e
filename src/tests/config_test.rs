use super::*;

#[rstest]
fn test_from_yaml() {
    let data = br#"
containers:
  - name: tyk-mesh
    image: tykio/tyk-gateway:v5
    env:
      - name: TYK_GW_SECRET
        value: s3cr3t
initContainers:
  - name: tyk-mesh-init
    image: tykio/mesh-init:v1
createRoutes: true
enableMeshTLS: true
meshCertificateID: 5e9d9544a1dcd60001d0ed20
"#;
    let config = SidecarConfig::from_yaml(data).unwrap();

    assert_eq!(config.containers.len(), 1);
    assert_eq!(config.containers[0].name, MESH_CONTAINER_NAME);
    assert_eq!(config.init_containers[0].name, "tyk-mesh-init");
    assert!(config.create_routes);
    assert!(config.enable_mesh_tls);
    assert_eq!(config.byo_mesh_certificate(), Some("5e9d9544a1dcd60001d0ed20"));
}

#[rstest]
fn test_from_yaml_defaults() {
    let config = SidecarConfig::from_yaml(b"containers: []\n").unwrap();

    assert!(config.init_containers.is_empty());
    assert!(!config.create_routes);
    assert!(!config.enable_mesh_tls);
    assert_eq!(config.byo_mesh_certificate(), None);
}

#[rstest]
fn test_from_yaml_invalid() {
    assert!(SidecarConfig::from_yaml(b"containers: 12\n").is_err());
}

#[rstest]
fn test_content_hash() {
    assert_eq!(
        crate::config::content_hash(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}
