// Core matchmaking exports
pub mod cooldown;
pub mod distance;
pub mod limiter;
pub mod matcher;
pub mod proposals;
pub mod queue;
pub mod scoring;
pub mod tables;

pub use cooldown::CooldownLedger;
pub use distance::{distance_between, haversine_distance};
pub use limiter::{Metrics, RateLimiter};
pub use matcher::{EngineConfig, EngineError, MatchCandidate, MatchEngine};
pub use proposals::ProposalStore;
pub use queue::SearchQueue;
pub use scoring::compatibility_score;
