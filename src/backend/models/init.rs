// src/backend/models/init.rs
use candid::{CandidType, Principal};
use serde::Deserialize;
use validator::{Validate, ValidationError};

#[derive(CandidType, Deserialize, Debug, Clone, Validate)]
#[validate(schema(function = "validate_refresh_interval"))]
pub struct InitArgs {
    pub admin_principal: Principal,
    #[validate(range(min = 30, max = 3600))]
    pub token_ttl_secs: Option<u64>,
    #[validate(range(min = 5, max = 600))]
    pub token_refresh_secs: Option<u64>,
    #[validate(range(min = 60))]
    pub maintenance_interval_secs: Option<u64>,
    #[validate(range(min = 3600))]
    pub invitation_retention_secs: Option<u64>,
}

fn validate_refresh_interval(args: &InitArgs) -> Result<(), ValidationError> {
    let ttl = args.token_ttl_secs.unwrap_or(crate::storage::config::DEFAULT_TOKEN_TTL_SECS);
    let refresh = args
        .token_refresh_secs
        .unwrap_or(crate::storage::config::DEFAULT_TOKEN_REFRESH_SECS);
    if refresh >= ttl {
        return Err(ValidationError::new("token_refresh_must_be_shorter_than_ttl"));
    }
    Ok(())
}
