use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use time::{Duration, OffsetDateTime};

use super::*;
use crate::ca::*;

#[rstest]
#[tokio::test]
async fn test_generate_cert(local_ca: Arc<LocalCa>) {
    let bundle = local_ca.generate_cert("orders.shop").await.unwrap();

    assert!(bundle.certificate.starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(bundle.private_key.contains("PRIVATE KEY"));
    assert_eq!(bundle.issuing_ca, local_ca.ca_cert_pem());
    assert_eq!(bundle.bundled, format!("{}{}", bundle.certificate, local_ca.ca_cert_pem()));
    assert_eq!(bundle.fingerprint.len(), 64);
}

fn assert_valid_now(pem: &str, years: i64) {
    let params = CertificateParams::from_ca_cert_pem(pem).unwrap();
    let now = OffsetDateTime::now_utc();

    assert!(params.not_before <= now + Duration::minutes(1));
    assert!(params.not_after > now);
    assert!(params.not_after > now + Duration::days(years * 365 - 2));
}

#[rstest]
#[tokio::test]
async fn test_generate_cert_validity_from_now(local_ca: Arc<LocalCa>) {
    let bundle = local_ca.generate_cert("orders.shop").await.unwrap();

    assert_valid_now(&bundle.certificate, CERT_VALIDITY_YEARS);
    assert_valid_now(local_ca.ca_cert_pem(), CA_VALIDITY_YEARS);
}

#[rstest]
#[tokio::test]
async fn test_generate_cert_unique(local_ca: Arc<LocalCa>) {
    let first = local_ca.generate_cert("mesh").await.unwrap();
    let second = local_ca.generate_cert("mesh").await.unwrap();
    assert_ne!(first.fingerprint, second.fingerprint);
    assert_ne!(first.private_key, second.private_key);
}

#[rstest]
#[tokio::test]
async fn test_store_cert(local_ca: Arc<LocalCa>) {
    let mut bundle = local_ca.generate_cert("orders.shop").await.unwrap();
    bundle.fingerprint = "gateway-cert-id".into();

    let reference = local_ca.store_cert(&bundle).await.unwrap();
    assert_eq!(reference, "gateway-cert-id");
    assert_eq!(local_ca.stored(&reference), Some(bundle));
}

#[rstest]
#[tokio::test]
async fn test_store_cert_no_fingerprint(local_ca: Arc<LocalCa>) {
    let err = local_ca.store_cert(&CertBundle::default()).await.unwrap_err();
    assert!(matches!(err, CaError::Store(_)));
}

#[rstest]
#[tokio::test]
async fn test_from_pem() {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    let ca = LocalCa::from_pem(&cert.pem(), &key.serialize_pem()).unwrap();
    let bundle = ca.generate_cert("orders.shop").await.unwrap();
    assert_eq!(bundle.issuing_ca, cert.pem());
}

#[rstest]
fn test_from_pem_invalid() {
    let key = KeyPair::generate().unwrap();
    let err = LocalCa::from_pem("not a certificate", &key.serialize_pem()).err().unwrap();
    assert!(matches!(err, CaError::InvalidCa(_)));

    let err = LocalCa::from_pem("not a certificate", "not a key").err().unwrap();
    assert!(matches!(err, CaError::InvalidCa(_)));
}
