use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, HostAlias, Pod, PodSpec, ServicePort,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ResourceExt;
use tracing::*;

use crate::config::SidecarConfig;
use crate::constants::*;
use crate::errors::{InjectorError, Result};

/// Build the pod spec with the sidecar template applied.  The pod itself is left untouched.
///
/// Containers are appended without deduplication; running this twice on the same pod double-injects,
/// which the policy engine's `injected` marker prevents upstream.
pub fn assemble_pod(pod: &Pod, template: &SidecarConfig) -> Result<PodSpec> {
    let mut spec = pod.spec.clone().ok_or_else(|| InjectorError::validation("pod definition must have a spec"))?;

    let service_name = service_name(pod);
    spec.containers.extend(tag_containers(&service_name, template.containers.clone()));
    spec.host_aliases.get_or_insert_with(Vec::new).push(HostAlias {
        ip: LOOPBACK_IP.into(),
        hostnames: Some(MESH_HOST_ALIASES.iter().map(|h| h.to_string()).collect()),
    });
    spec.init_containers
        .get_or_insert_with(Vec::new)
        .extend(template.init_containers.iter().cloned());

    if template.enable_mesh_tls {
        add_tls_volumes(&mut spec);
        mount_cert_volume(&mut spec);
    }

    Ok(spec)
}

/// The name under which the workload is known to the mesh: its `app` label, or a placeholder
/// derived from the generate-name when the label is missing.
pub fn service_name(pod: &Pod) -> String {
    match pod.labels().get(APP_LABEL_KEY) {
        Some(name) => name.clone(),
        None => {
            let prefix = pod.metadata.generate_name.as_deref().unwrap_or_default();
            warn!("pod has no {APP_LABEL_KEY} label, using a placeholder service name");
            format!("{prefix}{MISSING_APP_LABEL_SUFFIX}")
        },
    }
}

/// Point the mesh gateway container at the `mesh,<service>` tag set, replacing an existing tag
/// variable in place.
pub fn tag_containers(service_name: &str, mut containers: Vec<Container>) -> Vec<Container> {
    let tag_env = EnvVar {
        name: TAG_ENV_VAR.into(),
        value: Some(format!("{MESH_TAG},{service_name}")),
        ..Default::default()
    };

    if let Some(mesh) = containers.iter_mut().find(|c| c.name.eq_ignore_ascii_case(MESH_CONTAINER_NAME)) {
        let env = mesh.env.get_or_insert_with(Vec::new);
        match env.iter_mut().find(|e| e.name == TAG_ENV_VAR) {
            Some(existing) => *existing = tag_env,
            None => env.push(tag_env),
        }
    }

    containers
}

fn add_tls_volumes(spec: &mut PodSpec) {
    let volumes = spec.volumes.get_or_insert_with(Vec::new);
    volumes.push(Volume {
        name: CA_VOLUME_NAME.into(),
        config_map: Some(ConfigMapVolumeSource { name: CA_VOLUME_NAME.into(), ..Default::default() }),
        ..Default::default()
    });
    volumes.push(Volume {
        name: CERT_VOLUME_NAME.into(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    });
}

fn mount_cert_volume(spec: &mut PodSpec) {
    for container in spec.containers.iter_mut() {
        container.volume_mounts.get_or_insert_with(Vec::new).push(VolumeMount {
            name: CERT_VOLUME_NAME.into(),
            mount_path: CERT_MOUNT_PATH.into(),
            ..Default::default()
        });
    }
}

pub fn sidecar_service_port() -> ServicePort {
    ServicePort {
        name: Some(SIDECAR_PORT_NAME.into()),
        port: SIDECAR_PORT,
        target_port: Some(IntOrString::Int(SIDECAR_PORT)),
        ..Default::default()
    }
}
