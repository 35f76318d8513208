use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use groupvault_governance::InviteOutcome;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_vault).get(list_vaults))
        .route("/:id", get(get_vault))
        .route("/:id/deposits", post(deposit))
        .route("/:id/withdrawals", post(withdraw))
        .route("/:id/members", post(invite_member))
        .route("/:id/members/:user_id/limits", put(set_member_limits))
        .route(
            "/:id/members/:user_id/permissions/:capability",
            get(explain_permission),
        )
        .route("/:id/deactivate", post(deactivate_vault))
        .route("/:id/proposals", get(list_proposals).post(propose_action))
}

pub async fn create_vault(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateVaultRequest>,
) -> axum::response::Response {
    let new = match body.into_new_vault() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.facade.create_vault(caller.caller(), new) {
        Ok(vault_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": vault_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn list_vaults(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match services.facade.list_vaults(caller.caller()) {
        Ok(vaults) => Json(vaults).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn get_vault(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let vault_id = match dto::parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facade.get_vault_details(caller.caller(), vault_id) {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let (vault_id, amount) = match (dto::parse_vault_id(&id), body.amount()) {
        (Ok(v), Ok(a)) => (v, a),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services
        .facade
        .deposit(caller.caller(), vault_id, amount, body.description)
    {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let (vault_id, amount) = match (dto::parse_vault_id(&id), body.amount()) {
        (Ok(v), Ok(a)) => (v, a),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services
        .facade
        .withdraw(caller.caller(), vault_id, amount, body.description)
    {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

/// 201 when the member was added directly, 202 when the invitation went to a vote.
pub async fn invite_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InviteMemberRequest>,
) -> axum::response::Response {
    let (vault_id, user_id, role) = match (
        dto::parse_vault_id(&id),
        dto::parse_user_id(&body.user_id),
        body.role(),
    ) {
        (Ok(v), Ok(u), Ok(r)) => (v, u, r),
        (Err(resp), _, _) | (_, Err(resp), _) | (_, _, Err(resp)) => return resp,
    };

    match services
        .facade
        .invite_member(caller.caller(), vault_id, user_id, role)
    {
        Ok(outcome @ InviteOutcome::Added { .. }) => {
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Ok(outcome @ InviteOutcome::Proposed { .. }) => {
            (StatusCode::ACCEPTED, Json(outcome)).into_response()
        }
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn set_member_limits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, user_id)): Path<(String, String)>,
    Json(body): Json<dto::MemberLimitsRequest>,
) -> axum::response::Response {
    let (vault_id, user_id) = match (dto::parse_vault_id(&id), dto::parse_user_id(&user_id)) {
        (Ok(v), Ok(u)) => (v, u),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services.facade.set_member_limits(
        caller.caller(),
        vault_id,
        user_id,
        body.contribution_limit,
        body.withdrawal_limit,
    ) {
        Ok(member) => Json(member).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn explain_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, user_id, capability)): Path<(String, String, String)>,
) -> axum::response::Response {
    let (vault_id, user_id, capability) = match (
        dto::parse_vault_id(&id),
        dto::parse_user_id(&user_id),
        dto::parse_capability(&capability),
    ) {
        (Ok(v), Ok(u), Ok(c)) => (v, u, c),
        (Err(resp), _, _) | (_, Err(resp), _) | (_, _, Err(resp)) => return resp,
    };

    match services
        .facade
        .explain_permission(caller.caller(), vault_id, user_id, capability)
    {
        Ok(explanation) => Json(explanation).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn deactivate_vault(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let vault_id = match dto::parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facade.deactivate_vault(caller.caller(), vault_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn list_proposals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let vault_id = match dto::parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facade.get_proposals(caller.caller(), vault_id) {
        Ok(proposals) => Json(proposals).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}

pub async fn propose_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProposeActionRequest>,
) -> axum::response::Response {
    let (vault_id, action_type) = match (dto::parse_vault_id(&id), body.action_type()) {
        (Ok(v), Ok(t)) => (v, t),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    let action = match body.request.into_action(action_type) {
        Ok(a) => a,
        Err(e) => return errors::governance_error_to_response(e),
    };

    match services.facade.propose_action(caller.caller(), vault_id, action) {
        Ok(proposal) => (StatusCode::CREATED, Json(proposal)).into_response(),
        Err(e) => errors::governance_error_to_response(e),
    }
}
