// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local-only by default (bind 0.0.0.0 to accept device
// traffic from the LAN).
//
// Endpoints:
//   POST   /api/telemetry                                (devices; CORS *)
//   GET    /api/v1/health
//   GET    /api/v1/events                                POST to create
//   GET    /api/v1/events/{id}                           PUT to update
//   POST   /api/v1/events/{id}/status
//   GET    /api/v1/events/{id}/telemetry
//   GET    /api/v1/events/{id}/assignments               POST to assign
//   DELETE /api/v1/events/{id}/assignments/{device_id}
//   GET    /api/v1/events/{id}/results
//   GET    /api/v1/devices                               POST to register
//   DELETE /api/v1/devices/{id}
//   GET    /api/v1/profile                               PUT to update
//   GET    /api/v1/users
//   POST   /api/v1/users/{id}/role

pub mod routes;

use anyhow::Result;
use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    // Wearables post from anywhere; preflight gets a wildcard response.
    let telemetry_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        // Ingestion (no auth — see DESIGN.md on the trust boundary)
        .route(
            "/api/telemetry",
            post(routes::telemetry::ingest_sample).layer(telemetry_cors),
        )
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Events
        .route(
            "/api/v1/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/api/v1/events/{id}",
            get(routes::events::get_event).put(routes::events::update_event),
        )
        .route(
            "/api/v1/events/{id}/status",
            post(routes::events::set_status),
        )
        .route(
            "/api/v1/events/{id}/telemetry",
            get(routes::events::event_telemetry),
        )
        .route(
            "/api/v1/events/{id}/assignments",
            get(routes::devices::list_assignments).post(routes::devices::assign_device),
        )
        .route(
            "/api/v1/events/{id}/assignments/{device_id}",
            delete(routes::devices::unassign_device),
        )
        .route("/api/v1/events/{id}/results", get(routes::results::get_results))
        // Devices
        .route(
            "/api/v1/devices",
            get(routes::devices::list_devices).post(routes::devices::register_device),
        )
        .route("/api/v1/devices/{id}", delete(routes::devices::delete_device))
        // Profiles & users
        .route(
            "/api/v1/profile",
            get(routes::profiles::get_profile).put(routes::profiles::update_profile),
        )
        .route("/api/v1/users", get(routes::profiles::list_users))
        .route("/api/v1/users/{id}/role", post(routes::profiles::toggle_role))
        .with_state(ctx)
}
