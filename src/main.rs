use std::sync::Arc;

use tracing::info;
use uppercase_mcp_server::{
    build_app, config::Config, domain::tools::ProgressSchedule, logging, mcp::server::McpServer,
    session::InMemorySessionStore, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;

    let progress = ProgressSchedule {
        interval: config.progress_interval,
        ..ProgressSchedule::default()
    };
    let state = AppState::new(
        Arc::new(McpServer::new(progress)),
        Arc::new(InMemorySessionStore::new()),
        config.max_body_bytes,
    );
    let app = build_app(config.transport, state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        transport = %config.transport,
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
