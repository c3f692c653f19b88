use crate::models::domain::{MatchRecord, Proposal, ProposalKind, UserState, UserStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The caller-facing view of a proposal
///
/// Only the caller's side of the accept state is exposed; the counterpart's
/// pending decision stays private until it resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: String,
    #[serde(rename = "partnerId")]
    pub partner_id: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    #[serde(rename = "youAccepted")]
    pub you_accepted: bool,
    #[serde(default)]
    pub kind: Option<ProposalKind>,
}

impl ProposalView {
    pub fn for_user(proposal: &Proposal, user_id: &str) -> Self {
        Self {
            id: proposal.id.clone(),
            partner_id: proposal
                .counterpart(user_id)
                .unwrap_or_default()
                .to_string(),
            expires_at: proposal.expires_at,
            you_accepted: proposal.accepted_by(user_id),
            kind: proposal.kind,
        }
    }
}

/// Response for the status and decide endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: UserState,
    pub proposal: Option<ProposalView>,
    #[serde(rename = "match")]
    pub match_record: Option<MatchRecord>,
}

impl StatusResponse {
    pub fn from_status(status: UserStatus, user_id: &str) -> Self {
        Self {
            state: status.state,
            proposal: status
                .proposal
                .as_ref()
                .map(|p| ProposalView::for_user(p, user_id)),
            match_record: status.match_record,
        }
    }
}

/// Response for the start-search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSearchResponse {
    pub searching: bool,
}

/// Response for the cancel-search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSearchResponse {
    pub cancelled: bool,
}

/// Response for the metrics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub counters: BTreeMap<String, i64>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
