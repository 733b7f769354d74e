use tracing_test::traced_test;

use super::*;
use crate::policy::mutation_required;

#[rstest]
#[case::yes("yes")]
#[case::y("y")]
#[case::upper_true("TRUE")]
#[case::on("On")]
fn test_mutation_required_truthy(#[case] value: &str) {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, value)]);
    assert!(mutation_required(TEST_NAMESPACE, TEST_POD_NAME, &annos));
}

#[rstest]
#[case::no("no")]
#[case::off("off")]
#[case::one("1")]
#[case::empty("")]
fn test_mutation_required_falsy(#[case] value: &str) {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, value)]);
    assert!(!mutation_required(TEST_NAMESPACE, TEST_POD_NAME, &annos));
}

#[rstest]
fn test_mutation_required_no_annotation() {
    assert!(!mutation_required(TEST_NAMESPACE, TEST_POD_NAME, &BTreeMap::new()));
}

#[rstest]
#[case::lower("injected")]
#[case::mixed("Injected")]
fn test_mutation_required_already_injected(#[case] status: &str) {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, "true"), (STATUS_ANNOTATION_KEY, status)]);
    assert!(!mutation_required(TEST_NAMESPACE, TEST_POD_NAME, &annos));
}

#[rstest]
fn test_mutation_required_other_status() {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, "true"), (STATUS_ANNOTATION_KEY, "pending")]);
    assert!(mutation_required(TEST_NAMESPACE, TEST_POD_NAME, &annos));
}

#[rstest]
#[case::system("kube-system")]
#[case::public("kube-public")]
fn test_mutation_required_ignored_namespace(#[case] namespace: &str) {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, "true")]);
    assert!(!mutation_required(namespace, TEST_POD_NAME, &annos));
}

#[rstest]
#[traced_test]
fn test_mutation_required_ignored_namespace_logged() {
    let annos = annotations(&[(INJECT_ANNOTATION_KEY, "true")]);
    assert!(!mutation_required("kube-system", TEST_POD_NAME, &annos));
    assert!(logs_contain("special namespace: kube-system"));
}
