use axum::{routing::get, Router};

pub mod proposals;
pub mod system;
pub mod vaults;

/// Router for all endpoints that act on behalf of a caller.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/vaults", vaults::router())
        .nest("/proposals", proposals::router())
}
