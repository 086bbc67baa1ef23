use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};

use uno_sync::config::ServerConfig;
use uno_sync::session::RoomRegistry;
use uno_sync::websocket::{router, RelayService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let registry = Arc::new(RoomRegistry::new(config.channel_capacity));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = router(RelayService::new(registry)).layer(cors);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🚀 UNO relay listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
