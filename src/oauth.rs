//! OAuth session manager: authorization-code exchange, refresh, status.
//!
//! The vendor's authorization codes are single-use; a second redemption
//! fails at the vendor and surfaces as `AuthExchange` — never retried.
//! Refresh failures are likewise not retried: the caller restarts the
//! authorization flow.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use url::Url;

use crate::errors::AppError;
use crate::ghl::{TokenEndpointRejection, VendorClient};
use crate::models::token::TokenRecord;
use crate::store::TokenStore;

/// Scopes requested from the marketplace authorization page.
/// contacts.readonly backs the contact-walk fallback tier.
const SCOPES: &[&str] = &[
    "opportunities.readonly",
    "locations/tasks.readonly",
    "users.readonly",
    "locations.readonly",
    "contacts.readonly",
];

/// Pending `state` values expire after this long.
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Serialize)]
pub struct Authorization {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub tenant_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct SessionManager {
    vendor: VendorClient,
    store: Arc<dyn TokenStore>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    default_location_id: Option<String>,
    // CSRF protection: states issued by begin_authorization, verified and
    // consumed on callback.
    pending_states: DashMap<String, DateTime<Utc>>,
}

impl SessionManager {
    pub fn new(
        vendor: VendorClient,
        store: Arc<dyn TokenStore>,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        auth_url: String,
        default_location_id: Option<String>,
    ) -> Self {
        Self {
            vendor,
            store,
            client_id,
            client_secret,
            redirect_uri,
            auth_url,
            default_location_id,
            pending_states: DashMap::new(),
        }
    }

    /// Build the marketplace authorization URL and register a fresh `state`.
    pub fn begin_authorization(&self) -> Result<Authorization, AppError> {
        self.prune_states();

        let state = random_state();
        self.pending_states.insert(state.clone(), Utc::now());

        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad auth url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", &state);

        Ok(Authorization {
            authorization_url: url.into(),
            state,
        })
    }

    /// Exchange the callback `code` for a token record and persist it,
    /// keyed by the locationId the vendor returns.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<TokenRecord, AppError> {
        if code.trim().is_empty() {
            return Err(AppError::MissingCode);
        }
        self.consume_state(state)?;

        let issued_at = Utc::now();
        let resp = self
            .vendor
            .token_request(&[
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
            ])
            .await
            .map_err(|e| AppError::AuthExchange(e.describe()))?;

        let tenant_id = resp
            .location_id
            .clone()
            .or_else(|| self.default_location_id.clone())
            .ok_or_else(|| {
                AppError::AuthExchange("token response carried no locationId".into())
            })?;

        let record = resp.into_record(tenant_id, issued_at);
        self.store.put(record.clone()).await?;
        tracing::info!(tenant_id = %record.tenant_id, "authorization complete");
        Ok(record)
    }

    /// Read-only view of a tenant's session. Never refreshes proactively.
    pub async fn get_status(&self, tenant_id: &str) -> Result<SessionStatus, AppError> {
        let record = self.store.get(tenant_id).await?;
        let now = Utc::now();
        Ok(match record {
            Some(r) => SessionStatus {
                authenticated: r.is_valid_at(now),
                tenant_id: r.tenant_id,
                expires_at: Some(r.expires_at),
            },
            None => SessionStatus {
                authenticated: false,
                tenant_id: tenant_id.to_string(),
                expires_at: None,
            },
        })
    }

    /// Exchange the stored refresh token for a new record, replacing the
    /// old one wholesale. A rejection means the caller must re-run the
    /// full authorization flow.
    pub async fn refresh(&self, tenant_id: &str) -> Result<TokenRecord, AppError> {
        let existing =
            self.store
                .get(tenant_id)
                .await?
                .ok_or_else(|| AppError::NoRefreshToken {
                    tenant_id: tenant_id.to_string(),
                })?;

        let issued_at = Utc::now();
        let resp = self
            .vendor
            .token_request(&[
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
                ("refresh_token", &existing.refresh_token),
            ])
            .await
            .map_err(|e| match e {
                TokenEndpointRejection::Vendor { .. } => AppError::RefreshRejected(e.describe()),
                TokenEndpointRejection::Transport(msg) => AppError::VendorUnavailable(msg),
            })?;

        let record = resp.into_record(tenant_id.to_string(), issued_at);
        self.store.put(record.clone()).await?;
        tracing::info!(tenant_id, "token refreshed");
        Ok(record)
    }

    /// A valid access token for the tenant, or `AuthenticationExpired`.
    pub async fn access_token(&self, tenant_id: &str) -> Result<String, AppError> {
        let record = self
            .store
            .get(tenant_id)
            .await?
            .ok_or(AppError::AuthenticationExpired)?;
        if !record.is_valid_at(Utc::now()) {
            return Err(AppError::AuthenticationExpired);
        }
        Ok(record.access_token)
    }

    fn consume_state(&self, state: Option<&str>) -> Result<(), AppError> {
        let state = state.filter(|s| !s.is_empty()).ok_or(AppError::StateMismatch)?;
        let (_, issued) = self
            .pending_states
            .remove(state)
            .ok_or(AppError::StateMismatch)?;
        if Utc::now() - issued > Duration::minutes(STATE_TTL_MINUTES) {
            return Err(AppError::StateMismatch);
        }
        Ok(())
    }

    fn prune_states(&self) {
        let cutoff = Utc::now() - Duration::minutes(STATE_TTL_MINUTES);
        self.pending_states.retain(|_, issued| *issued > cutoff);
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
