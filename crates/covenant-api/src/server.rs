//! HTTP server for the Covenant host
//!
//! The bind interface and port come from the `AppConfig` the host was
//! created with; the router serves the loan and host routes behind
//! permissive CORS and request tracing.

use std::net::{IpAddr, SocketAddr};

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Assemble the router with its middleware stack
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the host on the interface and port its configuration names
pub async fn serve(state: AppState) -> Result<(), std::io::Error> {
    let (api_host, api_port, loan_count) = {
        let host = state.read().await;
        (
            host.config.api_host.clone(),
            host.config.api_port,
            host.loans.len(),
        )
    };

    let interface: IpAddr = api_host.parse().map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("api_host {:?} is not an IP address", api_host),
        )
    })?;
    let addr = SocketAddr::new(interface, api_port);

    let app = build_app(state);

    tracing::info!("Covenant host listening on {} ({} loans)", addr, loan_count);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
