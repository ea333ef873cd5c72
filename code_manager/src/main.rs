//main.rs
use std::net::SocketAddr;
use std::sync::Arc;

use code_manager::api::api::{AppState, routes};
use code_manager::manager::manager::AttemptManager;
use code_runner::{Budgets, Sandbox};
use tokio::net::TcpListener;
use util::config::AppConfig;
use util::logging::init_logging;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    let _log_guard = init_logging(&config);

    let execution_config = match config.execution_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let sandbox = Sandbox::from_config(config.sandbox_backend, &execution_config);
    tracing::info!(
        "Using {} sandbox with {} concurrent attempts",
        sandbox.toolchain_name(),
        config.max_concurrent_attempts
    );

    let manager = AttemptManager::new(Arc::new(sandbox), config.max_concurrent_attempts);
    let app = routes(AppState::new(
        manager,
        Budgets::from(&execution_config.budgets),
    ));

    // Define address to listen on
    let addr: SocketAddr = format!("{}:{}", config.code_manager_host, config.code_manager_port)
        .parse()
        .expect("Invalid address");
    tracing::info!("Listening on {}", addr);

    // Create TCP listener and run server
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
