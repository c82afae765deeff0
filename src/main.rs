use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridge::{api, config, console, pipeline, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| bridge::DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Auth { command }) => {
            let state = AppState::from_config(cfg).await?;
            handle_auth_command(command, &state).await
        }
        Some(cli::Commands::Pipelines { location_id }) => {
            let state = AppState::from_config(cfg).await?;
            handle_pipelines_command(&state, location_id).await
        }
        Some(cli::Commands::Tasks {
            pipeline,
            status,
            limit,
            location_id,
        }) => {
            let state = AppState::from_config(cfg).await?;
            handle_tasks_command(&state, pipeline, status, limit, location_id).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(cfg).await?);

    let app = api::router(state)
        // Dashboard origin only; localhost allowed for dev.
        .layer({
            use axum::http::Method;
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([axum::http::HeaderName::from_static("content-type")])
        })
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("ghlink bridge listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so
/// dashboard errors can be correlated with bridge logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn handle_auth_command(cmd: cli::AuthCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::AuthCommands::Init => {
            let auth = state.oauth.begin_authorization()?;

            println!("--- Step 1: Authorize Application ---");
            println!("Open this URL in your browser, log in, and authorize:");
            println!("\n{}\n", auth.authorization_url);
            println!("You will be redirected to a URL like:");
            println!("  {}?code=...&state=...", state.config.redirect_uri);
            println!("\n--- Step 2: Paste the full redirect URL here ---");

            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;

            let redirect = url::Url::parse(line.trim())?;
            let mut code = None;
            let mut returned_state = None;
            for (k, v) in redirect.query_pairs() {
                match k.as_ref() {
                    "code" => code = Some(v.into_owned()),
                    "state" => returned_state = Some(v.into_owned()),
                    _ => {}
                }
            }
            let code =
                code.ok_or_else(|| anyhow::anyhow!("no 'code=' parameter in the pasted URL"))?;

            println!("\n--- Step 3: Exchanging code for a token... ---");
            let record = state
                .oauth
                .complete_authorization(&code, returned_state.as_deref())
                .await?;

            let remaining = record.expires_at - chrono::Utc::now();
            println!("\nSuccess! Token stored for location '{}'.", record.tenant_id);
            println!("Expires in: {:.1} hours", remaining.num_minutes() as f64 / 60.0);
        }
        cli::AuthCommands::Status { location_id } => {
            let tenant = resolve_tenant(state, location_id)?;
            let status = state.oauth.get_status(&tenant).await?;
            if let (true, Some(expires_at)) = (status.authenticated, status.expires_at) {
                println!(
                    "Authenticated for '{}' until {}",
                    status.tenant_id, expires_at
                );
            } else {
                println!(
                    "Not authenticated for '{}'. Run `ghlink auth init`.",
                    status.tenant_id
                );
            }
        }
        cli::AuthCommands::Refresh { location_id } => {
            let tenant = resolve_tenant(state, location_id)?;
            let record = state.oauth.refresh(&tenant).await?;
            println!(
                "Token refreshed for '{}'; new expiry {}",
                record.tenant_id, record.expires_at
            );
        }
    }
    Ok(())
}

async fn handle_pipelines_command(
    state: &AppState,
    location_id: Option<String>,
) -> anyhow::Result<()> {
    let tenant = resolve_tenant(state, location_id)?;
    let access_token = state.oauth.access_token(&tenant).await?;
    let pipelines = state.vendor.get_pipelines(&access_token, &tenant).await?;

    if pipelines.is_empty() {
        println!("No pipelines found for location '{tenant}'.");
        return Ok(());
    }
    for p in pipelines {
        println!("{}  {} ({} stages)", p.id, p.name, p.stages.len());
    }
    Ok(())
}

async fn handle_tasks_command(
    state: &AppState,
    pipeline_query: Option<String>,
    status: String,
    limit: u32,
    location_id: Option<String>,
) -> anyhow::Result<()> {
    let tenant = resolve_tenant(state, location_id)?;
    let access_token = state.oauth.access_token(&tenant).await?;

    let query = pipeline_query.unwrap_or_else(|| state.config.default_pipeline.clone());
    let pipelines = state.vendor.get_pipelines(&access_token, &tenant).await?;
    let matched = match pipeline::resolve(&query, &pipelines) {
        Ok(p) => p,
        Err(nf) => {
            println!("Could not find a pipeline matching '{}'.", nf.query);
            println!("Available pipelines: {:?}", nf.available);
            return Ok(());
        }
    };
    println!("Found pipeline '{}' ({})", matched.name, matched.id);

    let outcome = state
        .fetcher
        .fetch_tasks_for_pipeline(&access_token, &tenant, &matched.id, &status, limit)
        .await?;

    let incomplete: Vec<_> = outcome
        .tasks
        .into_iter()
        .filter(|t| !t.completed)
        .collect();
    println!("{}", console::render_tasks(&console::dedupe_tasks(incomplete)));
    Ok(())
}

fn resolve_tenant(state: &AppState, requested: Option<String>) -> anyhow::Result<String> {
    requested
        .filter(|s| !s.is_empty())
        .or_else(|| state.config.default_location_id.clone())
        .ok_or_else(|| anyhow::anyhow!("pass --location-id or set GHL_LOCATION_ID"))
}
