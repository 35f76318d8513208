use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use groupvault_core::GovernanceError;

pub fn governance_error_to_response(err: GovernanceError) -> axum::response::Response {
    let status = match &err {
        GovernanceError::PermissionDenied(_) | GovernanceError::NotAMember => StatusCode::FORBIDDEN,
        GovernanceError::NotFound(_) => StatusCode::NOT_FOUND,
        GovernanceError::AlreadyVoted
        | GovernanceError::ProposalClosed
        | GovernanceError::LastOwnerProtected => StatusCode::CONFLICT,
        GovernanceError::ProposalExpired | GovernanceError::AppealWindowClosed => StatusCode::GONE,
        GovernanceError::InsufficientFunds { .. }
        | GovernanceError::LimitExceeded { .. }
        | GovernanceError::VaultInactive => StatusCode::UNPROCESSABLE_ENTITY,
        GovernanceError::Validation(_) => StatusCode::BAD_REQUEST,
        GovernanceError::StateUnavailable(_) => {
            tracing::error!(error = %err, "vault state unavailable");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
