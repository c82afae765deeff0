use serde::Deserialize;

/// Which backend the token store uses. Selected via GHL_TOKEN_STORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Postgres,
}

impl StoreBackend {
    /// Unknown values fall back to the in-memory backend.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "file" => StoreBackend::File,
            "postgres" => StoreBackend::Postgres,
            _ => StoreBackend::Memory,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Vendor REST base, e.g. https://services.leadconnectorhq.com
    pub api_base_url: String,
    /// Token endpoint. Lives under api_base_url in production but is
    /// configurable separately so tests can point it at a mock server.
    pub token_url: String,
    /// Marketplace authorization page (chooselocation).
    pub auth_url: String,
    /// Tenant used when a request doesn't name one.
    pub default_location_id: Option<String>,
    /// Pipeline used when a query doesn't name one.
    pub default_pipeline: String,
    pub store_backend: StoreBackend,
    pub token_file: String,
    pub database_url: String,
    /// Upper bound on contact-by-contact task requests in the fallback tier.
    /// Hardcoded backpressure, not a rate limiter.
    pub fallback_contact_cap: usize,
}

const PLACEHOLDER: &str = "CHANGE_ME_CLIENT_ID";

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let client_id = std::env::var("GHL_CLIENT_ID").unwrap_or_else(|_| PLACEHOLDER.into());
    let client_secret = std::env::var("GHL_CLIENT_SECRET").unwrap_or_default();

    if client_id == PLACEHOLDER {
        let env_mode = std::env::var("GHL_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "GHL_CLIENT_ID is not set. Register a marketplace app and set \
                 GHL_CLIENT_ID / GHL_CLIENT_SECRET before running in production."
            );
        }
        eprintln!("⚠️  GHL_CLIENT_ID is not set — OAuth flows will be rejected by the vendor.");
    }

    let store_backend = StoreBackend::parse(
        &std::env::var("GHL_TOKEN_STORE").unwrap_or_else(|_| "memory".into()),
    );

    let api_base_url = std::env::var("GHL_API_BASE_URL")
        .unwrap_or_else(|_| "https://services.leadconnectorhq.com".into());

    Ok(Config {
        port: std::env::var("GHL_BRIDGE_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .unwrap_or(3000),
        client_id,
        client_secret,
        redirect_uri: std::env::var("GHL_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:3000/oauth/callback".into()),
        token_url: std::env::var("GHL_TOKEN_URL")
            .unwrap_or_else(|_| format!("{}/oauth/token", api_base_url)),
        auth_url: std::env::var("GHL_AUTH_URL")
            .unwrap_or_else(|_| "https://marketplace.gohighlevel.com/oauth/chooselocation".into()),
        api_base_url,
        default_location_id: std::env::var("GHL_LOCATION_ID").ok(),
        default_pipeline: std::env::var("GHL_DEFAULT_PIPELINE")
            .unwrap_or_else(|_| "Client Software Development Pipeline".into()),
        store_backend,
        token_file: std::env::var("GHL_TOKEN_FILE").unwrap_or_else(|_| "ghl_tokens.json".into()),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/ghlink".into()),
        fallback_contact_cap: std::env::var("GHL_FALLBACK_CONTACT_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10),
    })
}
