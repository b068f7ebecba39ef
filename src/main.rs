use std::sync::Arc;

use classroom_server::api;
use classroom_server::classroom::ClassroomGateway;
use classroom_server::config::Config;
use classroom_server::error::Result;
use classroom_server::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.logging);

    let gateway = Arc::new(ClassroomGateway::new());
    let routes = api::routes(gateway, config.websocket.clone());

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(config.bind_address(), shutdown_signal())?;

    tracing::info!(%addr, "Live classroom server listening");
    server.await;
    tracing::info!("Live classroom server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
