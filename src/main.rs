//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, seeds default categories and
//! serves the API until SIGINT or SIGTERM.

use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use knowledge_base::config::Config;
use knowledge_base::database::{init_db, seed_default_categories, AppState};
use knowledge_base::error::AppError;
use knowledge_base::route::create_app;

/// Application entry point
///
/// # Environment Variables
///
/// See [`Config`] for the full list. `RUST_LOG` overrides the default log
/// filter.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("knowledge_base=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    let db_name = config.database_url.clone();

    let db = init_db(&db_name)?;
    let state = AppState::new(db, config);

    if state.config.seed_default_categories {
        let seeded = seed_default_categories(&state.db)?;
        if seeded > 0 {
            tracing::info!(seeded, "seeded default categories");
        }
    }

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(%addr, database = %db_name, "server listening");

    // Peer addresses feed the search log
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Resolves when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received.
///
/// In-flight requests are allowed to finish, so no write transaction is cut
/// off halfway.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
