use std::collections::BTreeMap;

use tracing::*;

use crate::constants::*;

/// Decide whether an object needs the sidecar.  Evaluated fresh on every admission call since the
/// annotations may have changed in between.
pub fn mutation_required(namespace: &str, name: &str, annotations: &BTreeMap<String, String>) -> bool {
    if IGNORED_NAMESPACES.contains(&namespace) {
        info!("skip mutation for {name}, special namespace: {namespace}");
        return false;
    }

    let status = annotations.get(STATUS_ANNOTATION_KEY).map(String::as_str).unwrap_or_default();
    let required = if status.eq_ignore_ascii_case(STATUS_INJECTED) {
        false
    } else {
        annotations.get(INJECT_ANNOTATION_KEY).is_some_and(|v| is_truthy(v))
    };

    info!("mutation policy for {namespace}/{name}: status: {status:?} required: {required}");
    required
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "y" | "yes" | "true" | "on")
}
