//! Environment-driven configuration.
//!
//! Every variable has a default; a variable that is set but malformed is an
//! error rather than silently falling back.

use std::net::SocketAddr;

use chrono::Duration;
use rust_decimal::Decimal;

use groupvault_core::GovernanceError;
use groupvault_observability::LogFormat;
use groupvault_vault::{AppealEligibility, GovernancePolicy};

pub const BIND_ADDR: &str = "GROUPVAULT_BIND_ADDR";
pub const QUORUM_FRACTION: &str = "GROUPVAULT_QUORUM_FRACTION";
pub const PROPOSAL_TTL_HOURS: &str = "GROUPVAULT_PROPOSAL_TTL_HOURS";
pub const APPEAL_WINDOW_HOURS: &str = "GROUPVAULT_APPEAL_WINDOW_HOURS";
pub const APPEAL_TTL_HOURS: &str = "GROUPVAULT_APPEAL_TTL_HOURS";
pub const UNILATERAL_INVITES: &str = "GROUPVAULT_UNILATERAL_INVITES";
pub const APPEAL_ELIGIBILITY: &str = "GROUPVAULT_APPEAL_ELIGIBILITY";
pub const LOG_FORMAT: &str = "GROUPVAULT_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("inconsistent governance policy: {0}")]
    Policy(GovernanceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub policy: GovernancePolicy,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            policy: GovernancePolicy::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = match get(BIND_ADDR) {
            Some(v) => parse(BIND_ADDR, &v, |s| s.parse::<SocketAddr>().map_err(|e| e.to_string()))?,
            None => defaults.bind_addr,
        };

        let mut policy = defaults.policy;
        if let Some(v) = get(QUORUM_FRACTION) {
            policy.quorum_fraction =
                parse(QUORUM_FRACTION, &v, |s| s.parse::<Decimal>().map_err(|e| e.to_string()))?;
        }
        if let Some(v) = get(PROPOSAL_TTL_HOURS) {
            policy.proposal_ttl = hours(PROPOSAL_TTL_HOURS, &v)?;
        }
        if let Some(v) = get(APPEAL_WINDOW_HOURS) {
            policy.appeal_window = hours(APPEAL_WINDOW_HOURS, &v)?;
        }
        if let Some(v) = get(APPEAL_TTL_HOURS) {
            policy.appeal_ttl = hours(APPEAL_TTL_HOURS, &v)?;
        }
        if let Some(v) = get(UNILATERAL_INVITES) {
            policy.unilateral_invites = parse(UNILATERAL_INVITES, &v, |s| {
                match s.to_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(true),
                    "false" | "0" | "no" => Ok(false),
                    _ => Err("expected true or false".to_string()),
                }
            })?;
        }
        if let Some(v) = get(APPEAL_ELIGIBILITY) {
            policy.appeal_eligibility = parse(APPEAL_ELIGIBILITY, &v, |s| {
                AppealEligibility::parse(s)
                    .ok_or_else(|| "expected 'dissenters' or 'any_member'".to_string())
            })?;
        }
        policy.validate().map_err(ConfigError::Policy)?;

        let log_format = match get(LOG_FORMAT) {
            Some(v) => parse(LOG_FORMAT, &v, |s| s.parse::<LogFormat>().map_err(|e| e.to_string()))?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind_addr,
            policy,
            log_format,
        })
    }
}

fn parse<T>(
    var: &'static str,
    value: &str,
    f: impl FnOnce(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    f(value.trim()).map_err(|reason| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    })
}

fn hours(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse(var, value, |s| match s.parse::<i64>() {
        Ok(h) if h > 0 => Ok(Duration::hours(h)),
        Ok(_) => Err("must be a positive number of hours".to_string()),
        Err(e) => Err(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(from_map(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = from_map(&[
            (BIND_ADDR, "127.0.0.1:9000"),
            (QUORUM_FRACTION, "0.75"),
            (APPEAL_TTL_HOURS, "12"),
            (UNILATERAL_INVITES, "false"),
            (APPEAL_ELIGIBILITY, "any_member"),
            (LOG_FORMAT, "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.policy.quorum_fraction, dec!(0.75));
        assert_eq!(cfg.policy.appeal_ttl, Duration::hours(12));
        assert!(!cfg.policy.unilateral_invites);
        assert_eq!(cfg.policy.appeal_eligibility, AppealEligibility::AnyMember);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_are_errors_not_defaults() {
        let err = from_map(&[(PROPOSAL_TTL_HOURS, "a week")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: PROPOSAL_TTL_HOURS, .. }));

        assert!(from_map(&[(QUORUM_FRACTION, "1.5")]).is_err());
        assert!(from_map(&[(APPEAL_TTL_HOURS, "0")]).is_err());
    }

    #[test]
    fn appeal_ttl_must_stay_below_proposal_ttl() {
        let err = from_map(&[(PROPOSAL_TTL_HOURS, "24"), (APPEAL_TTL_HOURS, "48")]).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
    }
}
