use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One vendor token per tenant (location). Replaced wholesale on refresh,
/// never merged field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// `expires_at == now` counts as expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Shape of the vendor's /oauth/token response (both grant types).
#[derive(Debug, Deserialize)]
pub struct VendorTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(rename = "locationId")]
    pub location_id: Option<String>,
}

impl VendorTokenResponse {
    pub fn into_record(self, tenant_id: String, issued_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            tenant_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: issued_at + chrono::Duration::seconds(self.expires_in),
        }
    }
}
