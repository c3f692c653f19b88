// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CachedProfile, Decision, MatchRecord, Profile, Proposal, ProposalKind, SearchEntry,
    SearchPreferences, UserState, UserStatus,
};
pub use requests::{CancelSearchRequest, DecideRequest, StartSearchRequest, StatusQuery};
pub use responses::{
    CancelSearchResponse, ErrorResponse, HealthResponse, MetricsResponse, ProposalView,
    StartSearchResponse, StatusResponse,
};
