use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::*;
use url::Url;

use super::{ApiDefinition, EnsuredService, Gateway, GatewayError};

#[derive(Deserialize)]
struct ApiList {
    #[serde(default)]
    apis: Vec<ApiEnvelope>,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    api_definition: ApiDefinition,
}

#[derive(Serialize)]
struct ApiEnvelopeRef<'a> {
    api_definition: &'a ApiDefinition,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DashboardStatus {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    meta: Value,
}

#[derive(Deserialize)]
struct CertificateCreated {
    id: String,
}

/// Client for the Tyk dashboard REST API.
///
/// The dashboard has no create-if-absent call, so `ensure_service` is a lookup followed by a
/// create; two admission calls racing on the same slug can still both create a definition.
#[derive(Clone, Debug)]
pub struct DashboardGateway {
    client: Client,
    base: Url,
    secret: String,
    org_id: String,
}

impl DashboardGateway {
    pub fn new(base: &str, secret: &str, org_id: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        // request paths are joined relative to the base, so it must end in a slash to keep any prefix
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            secret: secret.into(),
            org_id: org_id.into(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        let url = self.base.join(path)?;
        Ok(self.client.request(method, url).header(header::AUTHORIZATION, &self.secret))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<ApiDefinition>, GatewayError> {
        let resp = self.request(reqwest::Method::GET, "api/apis")?.query(&[("p", "-1")]).send().await?;
        let list: ApiList = check(resp).await?.json().await?;
        Ok(list.apis.into_iter().map(|e| e.api_definition).find(|d| d.slug == slug))
    }

    pub async fn create_service(&self, definition: &ApiDefinition) -> Result<String, GatewayError> {
        let mut definition = definition.clone();
        if !self.org_id.is_empty() {
            definition.extra.insert("org_id".into(), Value::String(self.org_id.clone()));
        }

        let resp = self
            .request(reqwest::Method::POST, "api/apis")?
            .json(&ApiEnvelopeRef { api_definition: &definition })
            .send()
            .await?;
        let status: DashboardStatus = check(resp).await?.json().await?;
        if !status.status.eq_ignore_ascii_case("ok") {
            return Err(GatewayError::Rejected(status.message));
        }

        match status.meta {
            Value::String(id) if !id.is_empty() => Ok(id),
            _ => Err(GatewayError::Rejected(format!("no API ID returned for {}", definition.slug))),
        }
    }
}

#[async_trait]
impl Gateway for DashboardGateway {
    async fn ensure_service(&self, definition: &ApiDefinition) -> Result<EnsuredService, GatewayError> {
        // a failed lookup is treated the same as a missing definition
        match self.get_by_slug(&definition.slug).await {
            Ok(Some(existing)) => return Ok(EnsuredService { id: existing.id, created: false }),
            Ok(None) => (),
            Err(err) => warn!("lookup of slug {} failed, creating it: {err}", definition.slug),
        }

        let id = self.create_service(definition).await?;
        Ok(EnsuredService { id, created: true })
    }

    async fn get_by_object_id(&self, id: &str) -> Result<ApiDefinition, GatewayError> {
        let resp = self.request(reqwest::Method::GET, &format!("api/apis/{id}"))?.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(id.into()));
        }

        let envelope: ApiEnvelope = check(resp).await?.json().await?;
        Ok(envelope.api_definition)
    }

    async fn update_api(&self, definition: &ApiDefinition) -> Result<(), GatewayError> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("api/apis/{}", definition.id))?
            .json(&ApiEnvelopeRef { api_definition: definition })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn create_certificate(&self, bundle: &str, key: &str) -> Result<String, GatewayError> {
        let resp = self
            .request(reqwest::Method::POST, "api/certs")?
            .header(header::CONTENT_TYPE, "text/plain")
            .body(format!("{bundle}\n{key}"))
            .send()
            .await?;
        let created: CertificateCreated = check(resp).await?.json().await?;
        Ok(created.id)
    }
}

async fn check(resp: Response) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::Status { status: status.as_u16(), body })
}
