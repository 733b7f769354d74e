// Injector toggle and mesh listen-path override, set by workload authors
pub const INJECT_ANNOTATION_KEY: &str = "injector.tyk.io/inject";
pub const ROUTE_ANNOTATION_KEY: &str = "injector.tyk.io/route";

// Written by the injector to track state and gateway object IDs
pub const STATUS_ANNOTATION_KEY: &str = "injector.tyk.io/status";
pub const INBOUND_SERVICE_ID_ANNOTATION_KEY: &str = "injector.tyk.io/inbound-service-id";
pub const MESH_SERVICE_ID_ANNOTATION_KEY: &str = "injector.tyk.io/mesh-service-id";

pub const STATUS_INJECTED: &str = "injected";

pub const IGNORED_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];
pub const DEFAULT_NAMESPACE: &str = "default";

pub const APP_LABEL_KEY: &str = "app";
pub const MISSING_APP_LABEL_SUFFIX: &str = "please-set-app-label";

pub const MESH_TAG: &str = "mesh";
pub const MESH_HOSTNAME: &str = "mesh";
pub const MESH_HOST_ALIASES: [&str; 2] = ["mesh", "mesh.local"];
pub const LOOPBACK_IP: &str = "127.0.0.1";

pub const INBOUND_SLUG_SUFFIX: &str = "-inbound";
pub const MESH_SLUG_SUFFIX: &str = "-mesh";
pub const INBOUND_TARGET: &str = "http://localhost:6767";
pub const INBOUND_LISTEN_PATH: &str = "/";

pub const SIDECAR_PORT: i32 = 8080;
pub const SIDECAR_PORT_NAME: &str = "tyk-sidecar";

// The gateway container picks up its segmentation tags from this variable
pub const MESH_CONTAINER_NAME: &str = "tyk-mesh";
pub const TAG_ENV_VAR: &str = "TYK_GW_DBAPPCONFOPTIONS_TAGS";

pub const CA_VOLUME_NAME: &str = "ca-pem";
pub const CERT_VOLUME_NAME: &str = "ssl-certs";
pub const CERT_MOUNT_PATH: &str = "/etc/ssl/certs";
