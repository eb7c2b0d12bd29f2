use tokio::net::TcpListener;
use tokio::signal;

use rendezvous_server::cleanup;
use rendezvous_server::config::{generate_config_template, Config};
use rendezvous_server::errors::Result;
use rendezvous_server::routes;
use rendezvous_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rendezvous_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rendezvous_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("rendezvous server v{} starting", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(config);

    // Shared sweep tasks: one liveness sweep and one queue sweep per server
    let liveness_sweep = cleanup::spawn_liveness_sweep(state.realm.clone(), &state.config);
    let queue_sweep = cleanup::spawn_queue_sweep(state.realm.clone(), &state.config);

    let app = routes::build_router(state.clone());

    let addr = format!("{}:{}", state.config.bind_address, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        signaling_path = %state.config.effective_ws_path(),
        "listening on {}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    liveness_sweep.abort();
    queue_sweep.abort();
    tracing::info!("rendezvous server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received terminate signal"),
    }
}
