use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use pdf_merge_backend::config::AppConfig;
use pdf_merge_backend::infrastructure::{identity, storage};
use pdf_merge_backend::services::session_store::InMemorySessionStore;
use pdf_merge_backend::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration preset applied on top of the environment.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Profile {
    /// Environment variables over built-in defaults
    Env,
    /// Uploads under the system temp dir, no PDF header check
    Development,
    /// Secure cookies; refuses to start without JWT_SECRET
    Production,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port for the HTTP server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Configuration preset
    #[arg(long, value_enum, default_value_t = Profile::Env)]
    profile: Profile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_merge_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting PDF Merge Backend [Profile: {:?}]...", args.profile);

    let config = match args.profile {
        Profile::Env => AppConfig::from_env(),
        Profile::Development => AppConfig::development(),
        Profile::Production => AppConfig::production()?,
    };
    info!(
        "🛡️  Upload Config: Max Size={}MB, Max Files={}, Extensions={:?}, Magic Bytes={}",
        config.max_content_length / 1024 / 1024,
        config.max_files_per_upload,
        config.allowed_extensions,
        config.verify_magic_bytes
    );
    if config.uses_default_secret() {
        warn!("⚠️  JWT_SECRET is not set, sessions are signed with the built-in default");
    }

    let storage_service = storage::setup_storage(&config).await?;
    let identity_provider = identity::setup_identity(&config)?;
    let sessions = Arc::new(InMemorySessionStore::new());

    let state = AppState::new(storage_service, sessions, identity_provider, config);

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri().path(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri().path());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::new(args.host, args.port);
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
