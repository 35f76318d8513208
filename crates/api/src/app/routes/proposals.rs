use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/votes", post(vote))
        .route("/:id/appeal", post(appeal))
}

pub async fn vote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::VoteRequest>,
) -> axum::response::Response {
    let proposal_id = match dto::parse_proposal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facade.vote(caller.caller(), proposal_id, body.approve) {
        Ok(proposal) => Json(proposal).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn appeal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AppealRequest>,
) -> axum::response::Response {
    let proposal_id = match dto::parse_proposal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facade.appeal(caller.caller(), proposal_id, body.reason) {
        Ok(proposal) => Json(proposal).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}
