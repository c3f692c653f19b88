use crate::models::domain::SearchPreferences;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to start searching for a connection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartSearchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub preferences: Option<SearchPreferences>,
}

/// Request to cancel an ongoing search
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelSearchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}

/// Request to accept or pass on the caller's active proposal
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecideRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    /// "accept" or "pass"
    #[validate(length(min = 1))]
    pub decision: String,
}

/// Query parameters for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusQuery {
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}
