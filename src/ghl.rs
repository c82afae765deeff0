//! HTTP client for the GoHighLevel REST API.
//!
//! Every call carries `Authorization: Bearer <token>` and the pinned
//! `Version: 2021-07-28` header. Vendor status codes are mapped into the
//! crate's error taxonomy here, at the transport boundary, so the layers
//! above only ever see typed errors.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::AppError;
use crate::models::crm::{Opportunity, Pipeline, Task};
use crate::models::token::VendorTokenResponse;

pub const API_VERSION: &str = "2021-07-28";

#[derive(Clone)]
pub struct VendorClient {
    client: reqwest::Client,
    api_base_url: String,
    token_url: String,
}

#[derive(Deserialize)]
struct PipelinesResponse {
    #[serde(default)]
    pipelines: Vec<Pipeline>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    opportunities: Vec<Opportunity>,
}

#[derive(Deserialize)]
struct ContactTasksResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

impl VendorClient {
    pub fn new(api_base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_base_url: api_base_url.into(),
            token_url: token_url.into(),
        }
    }

    /// Form-encoded POST to the vendor token endpoint. Both grant types go
    /// through here; the caller decides how a rejection is classified
    /// (single-use code vs. dead refresh token).
    pub async fn token_request(
        &self,
        form: &[(&str, &str)],
    ) -> Result<VendorTokenResponse, TokenEndpointRejection> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| TokenEndpointRejection::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TokenEndpointRejection::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<VendorTokenResponse>()
            .await
            .map_err(|e| TokenEndpointRejection::Transport(format!("malformed token body: {e}")))
    }

    pub async fn get_pipelines(
        &self,
        access_token: &str,
        location_id: &str,
    ) -> Result<Vec<Pipeline>, AppError> {
        let url = format!("{}/opportunities/pipelines", self.api_base_url);
        let resp = self
            .api_get(&url, access_token)
            .query(&[("locationId", location_id)])
            .send()
            .await
            .map_err(AppError::transport)?;

        let resp = check(resp).await?;
        let body: PipelinesResponse = resp.json().await.map_err(AppError::transport)?;
        Ok(body.pipelines)
    }

    pub async fn search_opportunities(
        &self,
        access_token: &str,
        location_id: &str,
        pipeline_id: &str,
        status: &str,
        include_tasks: bool,
        limit: u32,
    ) -> Result<Vec<Opportunity>, AppError> {
        let url = format!("{}/opportunities/search", self.api_base_url);
        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("location_id", location_id),
            ("pipeline_id", pipeline_id),
            ("status", status),
            ("limit", &limit),
        ];
        if include_tasks {
            query.push(("getTasks", "true"));
        }

        let resp = self
            .api_get(&url, access_token)
            .query(&query)
            .send()
            .await
            .map_err(AppError::transport)?;

        let resp = check(resp).await?;
        let body: SearchResponse = resp.json().await.map_err(AppError::transport)?;
        Ok(body.opportunities)
    }

    /// Fallback tier: one request per contact, used when the nested-task
    /// search is unavailable.
    pub async fn contact_tasks(
        &self,
        access_token: &str,
        contact_id: &str,
    ) -> Result<Vec<Task>, AppError> {
        let url = format!("{}/contacts/{}/tasks", self.api_base_url, contact_id);
        let resp = self
            .api_get(&url, access_token)
            .send()
            .await
            .map_err(AppError::transport)?;

        let resp = check(resp).await?;
        let body: ContactTasksResponse = resp.json().await.map_err(AppError::transport)?;
        Ok(body.tasks)
    }

    fn api_get(&self, url: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(access_token)
            .header("Version", API_VERSION)
            .header("Accept", "application/json")
    }
}

/// A rejection from the token endpoint, before the caller classifies it.
#[derive(Debug)]
pub enum TokenEndpointRejection {
    Vendor { status: u16, body: String },
    Transport(String),
}

impl TokenEndpointRejection {
    pub fn describe(&self) -> String {
        match self {
            TokenEndpointRejection::Vendor { status, body } => {
                format!("vendor returned {status}: {body}")
            }
            TokenEndpointRejection::Transport(msg) => msg.clone(),
        }
    }
}

/// Map a non-success vendor status into the error taxonomy.
pub fn map_status(status: u16, body: String) -> AppError {
    match status {
        401 => AppError::AuthenticationExpired,
        400 | 422 => AppError::InvalidQuery(body),
        429 => AppError::RateLimited,
        s if s >= 500 => AppError::VendorUnavailable(format!("{s}: {body}")),
        s => AppError::InvalidQuery(format!("{s}: {body}")),
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "vendor call failed: {}", body);
    Err(map_status(status.as_u16(), body))
}
