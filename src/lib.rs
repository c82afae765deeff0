//! GHLink — GoHighLevel task bridge.
//!
//! Brokers the vendor OAuth lifecycle, resolves pipeline names, fetches
//! opportunities with nested tasks (falling back to a sequential contact
//! walk), and flattens tasks with their parent opportunity's context for
//! a dashboard or terminal.

pub mod api;
pub mod config;
pub mod console;
pub mod enrich;
pub mod errors;
pub mod fetcher;
pub mod ghl;
pub mod interpret;
pub mod models;
pub mod oauth;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

/// Default RUST_LOG directives. The library target is `bridge`, the
/// binary's is `ghlink`; both must be named or their events are dropped.
pub const DEFAULT_LOG_FILTER: &str = "bridge=debug,ghlink=debug,tower_http=debug";

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: config::Config,
    pub store: Arc<dyn store::TokenStore>,
    pub vendor: ghl::VendorClient,
    pub oauth: oauth::SessionManager,
    pub fetcher: fetcher::Fetcher,
    pub interpreter: Arc<dyn interpret::Interpreter>,
}

impl AppState {
    /// Wire up the state from config: store backend, vendor client,
    /// session manager, fetcher, and the default (null) interpreter.
    pub async fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let store = store::connect(&config).await?;
        let vendor = ghl::VendorClient::new(&config.api_base_url, &config.token_url);
        let oauth = oauth::SessionManager::new(
            vendor.clone(),
            store.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
            config.auth_url.clone(),
            config.default_location_id.clone(),
        );
        let fetcher = fetcher::Fetcher::new(vendor.clone(), config.fallback_contact_cap);

        Ok(Self {
            config,
            store,
            vendor,
            oauth,
            fetcher,
            interpreter: Arc::new(interpret::NullInterpreter),
        })
    }
}
