use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use groupvault_auth::{Capability, Role};
use groupvault_core::{Amount, ProposalId, UserId, VaultId};
use groupvault_vault::{ActionRequest, ActionType, NewVault, VaultType};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateVaultRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub vault_type: String,
    pub currency: Option<String>,
    pub target_amount: Option<Decimal>,
    #[serde(default)]
    pub is_public: bool,
    pub rules: Option<String>,
}

impl CreateVaultRequest {
    pub fn into_new_vault(self) -> Result<NewVault, axum::response::Response> {
        let vault_type = VaultType::parse(&self.vault_type).ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_vault_type",
                format!("unknown vault type '{}'", self.vault_type),
            )
        })?;
        Ok(NewVault {
            name: self.name,
            description: self.description,
            vault_type,
            currency: self.currency.unwrap_or_else(|| "USD".to_string()),
            target_amount: self.target_amount,
            is_public: self.is_public,
            rules: self.rules,
        })
    }
}

/// Body of a deposit or direct withdrawal.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
    pub description: Option<String>,
}

impl AmountRequest {
    pub fn amount(&self) -> Result<Amount, axum::response::Response> {
        Amount::new(self.amount).map_err(errors::governance_error_to_response)
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub user_id: String,
    pub role: Option<String>,
}

impl InviteMemberRequest {
    pub fn role(&self) -> Result<Role, axum::response::Response> {
        match &self.role {
            None => Ok(Role::Member),
            Some(r) => parse_role(r),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProposeActionRequest {
    pub action_type: String,
    #[serde(flatten)]
    pub request: ActionRequest,
}

impl ProposeActionRequest {
    pub fn action_type(&self) -> Result<ActionType, axum::response::Response> {
        ActionType::parse(&self.action_type).ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_action_type",
                format!("unknown action type '{}'", self.action_type),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppealRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct MemberLimitsRequest {
    pub contribution_limit: Option<Decimal>,
    pub withdrawal_limit: Option<Decimal>,
}

// -------------------------
// Path parsing
// -------------------------

pub fn parse_vault_id(s: &str) -> Result<VaultId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vault id"))
}

pub fn parse_proposal_id(s: &str) -> Result<ProposalId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid proposal id"))
}

pub fn parse_user_id(s: &str) -> Result<UserId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

pub fn parse_role(s: &str) -> Result<Role, axum::response::Response> {
    Role::parse(s).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_role",
            "role must be one of: owner, admin, member",
        )
    })
}

pub fn parse_capability(s: &str) -> Result<Capability, axum::response::Response> {
    Capability::parse(s).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_capability",
            format!("unknown capability '{s}'"),
        )
    })
}
