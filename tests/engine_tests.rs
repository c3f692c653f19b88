// End-to-end engine tests over the in-memory store

use spark_match::core::cooldown::CooldownLedger;
use spark_match::core::{EngineConfig, EngineError, MatchEngine};
use spark_match::models::{Decision, Profile, UserState};
use spark_match::services::{
    MemoryProfiles, MemoryStore, NullHistory, NullNotifier, ProfileCache, ProfileRepository,
    StateStore,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: MatchEngine,
    store: Arc<MemoryStore>,
    profiles: Arc<MemoryProfiles>,
}

fn harness(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let profiles = Arc::new(MemoryProfiles::new());

    let cache = ProfileCache::new(
        profiles.clone() as Arc<dyn ProfileRepository>,
        store.clone() as Arc<dyn StateStore>,
        100,
        Duration::from_secs(300),
    );

    let engine = MatchEngine::new(
        store.clone() as Arc<dyn StateStore>,
        cache,
        Arc::new(NullNotifier),
        Arc::new(NullHistory),
        config,
    );

    Harness {
        engine,
        store,
        profiles,
    }
}

fn default_harness() -> Harness {
    harness(EngineConfig::default())
}

fn profile(id: &str, age: u8, gender: &str, needs: &[&str], location: Option<(f64, f64)>) -> Profile {
    Profile {
        user_id: id.to_string(),
        display_name: Some(format!("User {}", id)),
        age: Some(age),
        gender: Some(gender.to_string()),
        interests: vec!["hiking".to_string(), "coffee".to_string()],
        needs: needs.iter().map(|s| s.to_string()).collect(),
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lon)| lon),
        location_preference: None,
        avatar_file_id: None,
    }
}

const NYC: (f64, f64) = (40.7128, -74.0060);
const NYC_NEARBY: (f64, f64) = (40.7200, -74.0100);

#[tokio::test]
async fn test_two_compatible_users_get_paired() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    assert!(h.engine.start_search("alice", None).await.unwrap());
    assert_eq!(
        h.engine.get_status("alice").await.state,
        UserState::Searching
    );

    // Bob's search pairs them immediately
    assert!(h.engine.start_search("bob", None).await.unwrap());

    let alice_status = h.engine.get_status("alice").await;
    let bob_status = h.engine.get_status("bob").await;
    assert_eq!(alice_status.state, UserState::Proposal);
    assert_eq!(bob_status.state, UserState::Proposal);
    assert_eq!(
        alice_status.proposal.unwrap().id,
        bob_status.proposal.unwrap().id
    );
}

#[tokio::test]
async fn test_user_never_holds_two_active_proposals() {
    let h = default_harness();
    for (id, age) in [("alice", 25), ("bob", 26), ("carol", 25)] {
        let gender = if id == "bob" { "male" } else { "female" };
        h.profiles
            .insert(profile(id, age, gender, &["Friendship"], Some(NYC)))
            .await;
    }

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    // Alice and Bob are now locked into one proposal; Carol finds nobody
    h.engine.start_search("carol", None).await.unwrap();
    assert_eq!(
        h.engine.get_status("carol").await.state,
        UserState::Searching
    );

    // A heartbeat sweep must not double-book the paired users either
    h.engine.heartbeat().await;
    assert_eq!(
        h.engine.get_status("carol").await.state,
        UserState::Searching
    );

    let alice = h.engine.get_status("alice").await;
    let bob = h.engine.get_status("bob").await;
    assert_eq!(
        alice.proposal.unwrap().id,
        bob.proposal.unwrap().id
    );
}

#[tokio::test]
async fn test_both_accept_creates_match_with_shared_chat() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    let after_alice = h.engine.decide("alice", Decision::Accept).await.unwrap();
    assert_eq!(after_alice.state, UserState::Proposal);

    let after_bob = h.engine.decide("bob", Decision::Accept).await.unwrap();
    assert_eq!(after_bob.state, UserState::Matched);

    let alice = h.engine.get_status("alice").await;
    let bob = h.engine.get_status("bob").await;
    assert_eq!(alice.state, UserState::Matched);
    assert_eq!(bob.state, UserState::Matched);

    let alice_match = alice.match_record.unwrap();
    let bob_match = bob.match_record.unwrap();
    assert_eq!(alice_match.chat_id, bob_match.chat_id);
    assert_eq!(alice_match.partner_id, "bob");
    assert_eq!(bob_match.partner_id, "alice");

    let metrics = h.engine.metrics_snapshot().await;
    assert_eq!(metrics["matches_created"], 1);
    assert_eq!(metrics["active_proposals"], 0);
}

#[tokio::test]
async fn test_pass_sets_cooldown_and_requeues_both() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    let after = h.engine.decide("alice", Decision::Pass).await.unwrap();

    // The cooldown blocks immediate re-pairing, so both sit in the queue
    assert_eq!(after.state, UserState::Searching);
    assert_eq!(h.engine.get_status("bob").await.state, UserState::Searching);

    let cooldowns = CooldownLedger::new(h.store.clone() as Arc<dyn StateStore>);
    assert!(cooldowns.is_active("alice", "bob").await.unwrap());
    assert!(cooldowns.is_active("bob", "alice").await.unwrap());

    // Candidate discovery excludes the cooled-down pair
    assert!(h.engine.find_best_match("alice").await.is_none());
    assert!(h.engine.find_best_match("bob").await.is_none());

    // Even a full heartbeat cannot re-pair them
    h.engine.heartbeat().await;
    assert_eq!(
        h.engine.get_status("alice").await.state,
        UserState::Searching
    );
}

#[tokio::test]
async fn test_pair_again_after_cooldown_expires() {
    let config = EngineConfig {
        cooldown: Duration::from_millis(100),
        ..EngineConfig::default()
    };
    let h = harness(config);
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();
    h.engine.decide("alice", Decision::Pass).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let paired = h.engine.try_pair_user("alice").await.unwrap();
    assert!(paired.is_some());
    assert_eq!(h.engine.get_status("bob").await.state, UserState::Proposal);
}

#[tokio::test]
async fn test_expired_proposal_swept_and_parties_requeued() {
    let config = EngineConfig {
        proposal_ttl: Duration::from_millis(200),
        ..EngineConfig::default()
    };
    let h = harness(config);
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    let first = h.engine.get_status("alice").await.proposal.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    h.engine.heartbeat().await;

    let metrics = h.engine.metrics_snapshot().await;
    assert_eq!(metrics["proposals_expired"], 1);

    // The heartbeat requeued both and then re-paired them fresh
    let alice = h.engine.get_status("alice").await;
    assert_eq!(alice.state, UserState::Proposal);
    assert_ne!(alice.proposal.unwrap().id, first.id);
}

#[tokio::test]
async fn test_overdue_proposal_gone_before_any_sweep() {
    let config = EngineConfig {
        proposal_ttl: Duration::from_millis(100),
        ..EngineConfig::default()
    };
    let h = harness(config);
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Expiry is detected on read, independent of the heartbeat
    let result = h.engine.decide("alice", Decision::Accept).await;
    assert!(matches!(result, Err(EngineError::NoActiveProposal(_))));
    assert_eq!(h.engine.get_status("bob").await.state, UserState::Idle);
}

#[tokio::test]
async fn test_no_location_falls_back_to_full_pool() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Friendship"], None))
        .await;
    h.profiles
        .insert(profile("bob", 26, "female", &["Friendship"], None))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();

    assert_eq!(h.engine.get_status("alice").await.state, UserState::Proposal);
    assert_eq!(h.engine.get_status("bob").await.state, UserState::Proposal);
}

#[tokio::test]
async fn test_incompatible_pair_is_never_proposed() {
    let h = default_harness();
    // Both male, both only seeking a boyfriend: the gate rejects this pair
    h.profiles
        .insert(profile("alice", 25, "male", &["Boyfriend"], Some(NYC)))
        .await;
    h.profiles
        .insert(profile("bob", 26, "male", &["Boyfriend"], Some(NYC_NEARBY)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("bob", None).await.unwrap();
    h.engine.heartbeat().await;

    assert_eq!(h.engine.get_status("alice").await.state, UserState::Searching);
    assert_eq!(h.engine.get_status("bob").await.state, UserState::Searching);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_searches() {
    let config = EngineConfig {
        rate_limit_max: 2,
        ..EngineConfig::default()
    };
    let h = harness(config);
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.start_search("alice", None).await.unwrap();

    let third = h.engine.start_search("alice", None).await;
    assert!(matches!(third, Err(EngineError::RateLimited(_))));
}

#[tokio::test]
async fn test_start_search_requires_profile() {
    let h = default_harness();
    let result = h.engine.start_search("ghost", None).await;
    assert!(matches!(result, Err(EngineError::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_decide_without_proposal_is_typed_error() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;

    let result = h.engine.decide("alice", Decision::Accept).await;
    assert!(matches!(result, Err(EngineError::NoActiveProposal(_))));
}

#[tokio::test]
async fn test_cancel_search_returns_to_idle() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    assert_eq!(h.engine.get_status("alice").await.state, UserState::Searching);

    h.engine.cancel_search("alice").await.unwrap();
    assert_eq!(h.engine.get_status("alice").await.state, UserState::Idle);

    // Cancelling again is a harmless no-op
    h.engine.cancel_search("alice").await.unwrap();
}

#[tokio::test]
async fn test_best_scoring_candidate_wins() {
    let h = default_harness();
    h.profiles
        .insert(profile("seeker", 25, "female", &["Dating"], Some(NYC)))
        .await;
    // Same distance, but "peer" is much closer in age
    h.profiles
        .insert(profile("peer", 26, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;
    h.profiles
        .insert(profile("elder", 45, "male", &["Dating"], Some(NYC_NEARBY)))
        .await;

    // Enqueue candidates without triggering their own pairing runs: elder
    // first so FIFO cannot explain the outcome
    h.engine.start_search("elder", None).await.unwrap();
    h.engine.start_search("peer", None).await.unwrap();

    h.engine.start_search("seeker", None).await.unwrap();

    let status = h.engine.get_status("seeker").await;
    assert_eq!(status.state, UserState::Proposal);
    assert_eq!(status.proposal.unwrap().counterpart("seeker"), Some("peer"));
}

#[tokio::test]
async fn test_metrics_track_search_volume() {
    let h = default_harness();
    h.profiles
        .insert(profile("alice", 25, "female", &["Dating"], Some(NYC)))
        .await;

    h.engine.start_search("alice", None).await.unwrap();
    h.engine.heartbeat().await;

    let metrics = h.engine.metrics_snapshot().await;
    assert_eq!(metrics["searches_started"], 1);
    assert_eq!(metrics["heartbeats"], 1);
    assert_eq!(metrics["current_searching"], 1);
    assert_eq!(metrics["matches_created"], 0);
}
