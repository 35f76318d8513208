//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the governance facade and its notification bus
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and path parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use groupvault_core::GovernanceResult;
use groupvault_vault::GovernancePolicy;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(policy: GovernancePolicy) -> GovernanceResult<Router> {
    let services = Arc::new(services::AppServices::new(policy)?);

    // Everything but the health check needs a caller.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::caller_middleware))
            .layer(Extension(services)),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected))
}
