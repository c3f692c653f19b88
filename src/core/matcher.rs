use crate::core::cooldown::CooldownLedger;
use crate::core::distance::distance_between;
use crate::core::limiter::{Metrics, RateLimiter};
use crate::core::proposals::ProposalStore;
use crate::core::queue::SearchQueue;
use crate::core::scoring::compatibility_score;
use crate::core::tables;
use crate::models::{
    Decision, MatchRecord, Profile, Proposal, ProposalKind, SearchEntry, SearchPreferences,
    UserState, UserStatus,
};
use crate::services::cache::ProfileCache;
use crate::services::notify::Notifier;
use crate::services::postgres::HistoryStore;
use crate::services::store::{StateStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Validation failures surfaced to callers as typed results
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Rate limit exceeded for user {0}")]
    RateLimited(String),

    #[error("No profile found for user {0}")]
    ProfileNotFound(String),

    #[error("No active proposal for user {0}")]
    NoActiveProposal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Tuning knobs for the engine, wired from Settings in production
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub proposal_ttl: Duration,
    pub cooldown: Duration,
    pub queue_entry_ttl: Duration,
    pub match_record_ttl: Duration,
    pub rate_limit_max: i64,
    pub rate_limit_window: Duration,
    pub candidate_batch: usize,
    pub heartbeat_scan_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proposal_ttl: Duration::from_secs(120),
            cooldown: Duration::from_secs(3600),
            queue_entry_ttl: Duration::from_secs(1800),
            match_record_ttl: Duration::from_secs(600),
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
            candidate_batch: 25,
            heartbeat_scan_limit: 200,
        }
    }
}

/// The winning candidate out of a `find_best_match` pass
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub user_id: String,
    pub score: f64,
    pub distance_km: Option<f64>,
}

fn match_key(user_id: &str) -> String {
    format!("mm:match:{}", user_id)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Radius ladder and early-stop candidate target for a search intent
fn radius_ladder(friendship: bool, international: bool) -> (&'static [f64], usize) {
    if international {
        (
            tables::INTERNATIONAL_RADII_KM,
            tables::RELATIONSHIP_CANDIDATE_TARGET,
        )
    } else if friendship {
        (
            tables::FRIENDSHIP_RADII_KM,
            tables::FRIENDSHIP_CANDIDATE_TARGET,
        )
    } else {
        (
            tables::RELATIONSHIP_RADII_KM,
            tables::RELATIONSHIP_CANDIDATE_TARGET,
        )
    }
}

/// The matchmaking orchestrator
///
/// Everything flows through the shared store: multiple instances run the
/// same engine against the same keys, and consistency is best-effort -
/// every state-mutating step re-validates first, and a losing racer simply
/// observes "no proposal" and falls back to searching. Store outages
/// degrade lookups to safe defaults instead of failing requests.
pub struct MatchEngine {
    store: Arc<dyn StateStore>,
    profiles: ProfileCache,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn HistoryStore>,
    queue: SearchQueue,
    cooldowns: CooldownLedger,
    proposals: ProposalStore,
    limiter: RateLimiter,
    metrics: Metrics,
    config: EngineConfig,
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        profiles: ProfileCache,
        notifier: Arc<dyn Notifier>,
        history: Arc<dyn HistoryStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            queue: SearchQueue::new(store.clone(), config.queue_entry_ttl),
            cooldowns: CooldownLedger::new(store.clone()),
            proposals: ProposalStore::new(store.clone()),
            limiter: RateLimiter::new(store.clone(), config.rate_limit_max, config.rate_limit_window),
            metrics: Metrics::new(store.clone()),
            store,
            profiles,
            notifier,
            history,
            config,
        }
    }

    /// Enqueue a user and immediately attempt to pair them
    ///
    /// Returns `false` without enqueueing when the user already sits in an
    /// active proposal; their status endpoint will show it.
    pub async fn start_search(
        &self,
        user_id: &str,
        preferences: Option<SearchPreferences>,
    ) -> Result<bool, EngineError> {
        if !self.limiter.check(user_id).await {
            return Err(EngineError::RateLimited(user_id.to_string()));
        }

        if self.active_proposal(user_id).await.is_some() {
            return Ok(false);
        }

        let profile = self
            .profiles
            .get(user_id)
            .await
            .ok_or_else(|| EngineError::ProfileNotFound(user_id.to_string()))?;

        let entry = SearchEntry {
            user_id: user_id.to_string(),
            enqueued_at: now_ms(),
            latitude: profile.latitude,
            longitude: profile.longitude,
            preferences: preferences.unwrap_or_default(),
        };
        self.queue.enqueue(&entry).await?;
        self.metrics.incr("searches_started").await;

        if let Err(e) = self.try_pair_user(user_id).await {
            tracing::warn!("Immediate pairing attempt failed for {}: {}", user_id, e);
        }

        Ok(true)
    }

    /// Remove a user from the queue; idempotent
    pub async fn cancel_search(&self, user_id: &str) -> Result<(), EngineError> {
        self.queue.dequeue(user_id).await?;
        Ok(())
    }

    /// Current lifecycle state for a user
    ///
    /// Store failures degrade towards `idle` rather than erroring.
    pub async fn get_status(&self, user_id: &str) -> UserStatus {
        match self.store.kv_get(&match_key(user_id)).await {
            Ok(Some(json)) => {
                if let Ok(record) = serde_json::from_str::<MatchRecord>(&json) {
                    return UserStatus {
                        state: UserState::Matched,
                        proposal: None,
                        match_record: Some(record),
                    };
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Status lookup failed for {}: {}", user_id, e),
        }

        if let Some(proposal) = self.active_proposal(user_id).await {
            return UserStatus {
                state: UserState::Proposal,
                proposal: Some(proposal),
                match_record: None,
            };
        }

        if self.queue.contains(user_id).await.unwrap_or(false) {
            return UserStatus {
                state: UserState::Searching,
                proposal: None,
                match_record: None,
            };
        }

        UserStatus::idle()
    }

    /// Score every eligible nearby candidate and return the best one
    pub async fn find_best_match(&self, user_id: &str) -> Option<MatchCandidate> {
        if self.active_proposal(user_id).await.is_some() {
            return None;
        }

        let profile = self.profiles.get(user_id).await?;
        let entry = self.queue.get_entry(user_id).await.unwrap_or_else(|e| {
            tracing::warn!("Queue entry lookup failed for {}: {}", user_id, e);
            None
        });
        let preferences = entry
            .as_ref()
            .map(|e| e.preferences.clone())
            .unwrap_or_default();

        let friendship = tables::seeks_friendship(&profile.needs);
        let international = profile.prefers_international()
            || preferences
                .location_preference
                .as_deref()
                .map(|p| p.eq_ignore_ascii_case("international"))
                .unwrap_or(false);

        let candidates = self
            .discover_candidates(user_id, &profile, entry.as_ref(), friendship, international)
            .await;

        let age_tolerance = tables::age_band_tolerance(
            preferences.age_flexibility.as_deref().unwrap_or("moderate"),
        );

        let mut best: Option<(MatchCandidate, i64)> = None;
        for (candidate_id, geo_distance) in candidates.into_iter().take(self.config.candidate_batch)
        {
            if self
                .cooldowns
                .is_active(user_id, &candidate_id)
                .await
                .unwrap_or(false)
            {
                continue;
            }
            if self.active_proposal(&candidate_id).await.is_some() {
                continue;
            }
            // A vanished queue entry means the candidate stopped searching
            let Some(candidate_entry) =
                self.queue.get_entry(&candidate_id).await.ok().flatten()
            else {
                continue;
            };
            let Some(candidate_profile) = self.profiles.get(&candidate_id).await else {
                continue;
            };

            if let (Some(tolerance), Some(age_a), Some(age_b)) =
                (age_tolerance, profile.age, candidate_profile.age)
            {
                if age_a.abs_diff(age_b) > tolerance {
                    continue;
                }
            }

            let distance = distance_between(
                profile.latitude,
                profile.longitude,
                candidate_profile.latitude,
                candidate_profile.longitude,
            )
            .or(geo_distance);

            let score = compatibility_score(&profile, &candidate_profile, distance);
            if score <= 0.0 {
                continue;
            }

            let replace = match &best {
                None => true,
                Some((current, current_enqueued)) => {
                    score > current.score
                        || (score == current.score
                            && candidate_entry.enqueued_at < *current_enqueued)
                }
            };
            if replace {
                best = Some((
                    MatchCandidate {
                        user_id: candidate_id,
                        score,
                        distance_km: distance,
                    },
                    candidate_entry.enqueued_at,
                ));
            }
        }

        best.map(|(candidate, _)| candidate)
    }

    /// Expanding-circle discovery, falling back to the full queue when the
    /// seeker has no usable location
    async fn discover_candidates(
        &self,
        user_id: &str,
        profile: &Profile,
        entry: Option<&SearchEntry>,
        friendship: bool,
        international: bool,
    ) -> Vec<(String, Option<f64>)> {
        let coordinates = entry
            .and_then(|e| e.latitude.zip(e.longitude))
            .or_else(|| profile.latitude.zip(profile.longitude));

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        if let Some((latitude, longitude)) = coordinates {
            let (ladder, target) = radius_ladder(friendship, international);
            for radius_km in ladder {
                let hits = self
                    .queue
                    .nearby(
                        user_id,
                        latitude,
                        longitude,
                        *radius_km,
                        self.config.candidate_batch,
                    )
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!("Geo search failed for {}: {}", user_id, e);
                        Vec::new()
                    });

                for (id, distance) in hits {
                    if seen.insert(id.clone()) {
                        candidates.push((id, Some(distance)));
                    }
                }
                if candidates.len() >= target {
                    break;
                }
            }
        }

        if candidates.is_empty() {
            // No location or nothing nearby: consider the whole population
            let listed = self
                .queue
                .list_searching(self.config.candidate_batch)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Queue listing failed for {}: {}", user_id, e);
                    Vec::new()
                });
            for queued in listed {
                if queued.user_id != user_id && seen.insert(queued.user_id.clone()) {
                    candidates.push((queued.user_id, None));
                }
            }
        }

        candidates
    }

    /// Attempt to move a searching user into a proposal
    ///
    /// Re-validates both parties immediately before creating the proposal;
    /// the check-then-create pair is not atomic, so a tight interleave can
    /// still slip through and is healed by the next read.
    pub async fn try_pair_user(&self, user_id: &str) -> Result<Option<Proposal>, StoreError> {
        if self.proposals.find_by_user(user_id).await?.is_some() {
            return Ok(None);
        }

        let Some(best) = self.find_best_match(user_id).await else {
            return Ok(None);
        };

        // Race guard: both parties must still be proposal-free
        if self.proposals.find_by_user(user_id).await?.is_some() {
            return Ok(None);
        }
        if self.proposals.find_by_user(&best.user_id).await?.is_some() {
            return Ok(None);
        }

        let Some(seeker) = self.profiles.get(user_id).await else {
            return Ok(None);
        };
        let Some(candidate) = self.profiles.get(&best.user_id).await else {
            return Ok(None);
        };

        let kind = if tables::seeks_friendship(&seeker.needs)
            || tables::seeks_friendship(&candidate.needs)
        {
            ProposalKind::Friendship
        } else {
            ProposalKind::Relationship
        };

        let proposal = self
            .proposals
            .create(user_id, &best.user_id, self.config.proposal_ttl, Some(kind))
            .await?;

        self.queue.dequeue(user_id).await?;
        self.queue.dequeue(&best.user_id).await?;
        self.metrics.incr("proposals_created").await;

        tracing::info!(
            "Created proposal {} between {} and {} (score {:.1})",
            proposal.id,
            user_id,
            best.user_id,
            best.score
        );

        self.notify_proposal(&proposal, &seeker, &candidate, best.distance_km);

        Ok(Some(proposal))
    }

    /// Apply a user's accept/pass decision to their active proposal
    pub async fn decide(
        &self,
        user_id: &str,
        decision: Decision,
    ) -> Result<UserStatus, EngineError> {
        let Some(proposal) = self.proposals.find_by_user(user_id).await? else {
            return Err(EngineError::NoActiveProposal(user_id.to_string()));
        };

        match decision {
            Decision::Accept => {
                let Some(updated) = self.proposals.accept(&proposal.id, user_id).await? else {
                    // Expired or declined between the read and the write
                    return Err(EngineError::NoActiveProposal(user_id.to_string()));
                };

                if updated.is_complete() {
                    self.complete_match(&updated).await;
                } else if let Some(counterpart) = updated.counterpart(user_id) {
                    self.notifier.emit_to_user(
                        counterpart,
                        "proposal_update",
                        serde_json::json!({
                            "proposalId": updated.id,
                            "partnerAccepted": true,
                        }),
                    );
                }
            }
            Decision::Pass => {
                self.proposals.decline(&proposal).await?;
                self.metrics.incr("proposals_declined").await;

                let other = proposal
                    .counterpart(user_id)
                    .unwrap_or_default()
                    .to_string();
                if let Err(e) = self
                    .cooldowns
                    .set(user_id, &other, self.config.cooldown)
                    .await
                {
                    tracing::warn!(
                        "Failed to set cooldown for ({}, {}): {}",
                        user_id,
                        other,
                        e
                    );
                }

                self.notifier.emit_to_user(
                    &other,
                    "proposal_declined",
                    serde_json::json!({ "proposalId": proposal.id }),
                );

                self.requeue(user_id).await;
                self.requeue(&other).await;

                // Retry right away so the decliner doesn't stall until the
                // next heartbeat
                for user in [user_id, other.as_str()] {
                    if let Err(e) = self.try_pair_user(user).await {
                        tracing::warn!("Re-pairing attempt failed for {}: {}", user, e);
                    }
                }
            }
        }

        Ok(self.get_status(user_id).await)
    }

    /// Periodic reconciliation: expire stale proposals, then nudge every
    /// queued-but-unpaired user through the pairing path
    ///
    /// Pairing attempts run sequentially so one sweep cannot hand the same
    /// candidate to two seekers.
    pub async fn heartbeat(&self) {
        match self
            .proposals
            .sweep_expired(self.config.heartbeat_scan_limit)
            .await
        {
            Ok(expired) => {
                for proposal in expired {
                    self.metrics.incr("proposals_expired").await;
                    tracing::info!(
                        "Expired proposal {} between {} and {}",
                        proposal.id,
                        proposal.user_a,
                        proposal.user_b
                    );
                    for user in [&proposal.user_a, &proposal.user_b] {
                        self.requeue(user).await;
                        self.notifier.emit_to_user(
                            user,
                            "proposal_expired",
                            serde_json::json!({ "proposalId": proposal.id }),
                        );
                    }
                }
            }
            Err(e) => tracing::warn!("Proposal sweep failed: {}", e),
        }

        let entries = self
            .queue
            .list_searching(self.config.heartbeat_scan_limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Heartbeat queue listing failed: {}", e);
                Vec::new()
            });

        for entry in entries {
            match self.proposals.find_by_user(&entry.user_id).await {
                Ok(None) => {
                    if let Err(e) = self.try_pair_user(&entry.user_id).await {
                        tracing::warn!("Heartbeat pairing failed for {}: {}", entry.user_id, e);
                    }
                }
                Ok(Some(_)) => {}
                Err(e) => tracing::warn!("Proposal lookup failed for {}: {}", entry.user_id, e),
            }
        }

        self.metrics.incr("heartbeats").await;
    }

    /// Aggregate counters plus point-in-time gauges
    pub async fn metrics_snapshot(&self) -> std::collections::BTreeMap<String, i64> {
        let mut counters = self.metrics.snapshot().await.unwrap_or_else(|e| {
            tracing::warn!("Metrics snapshot failed: {}", e);
            Default::default()
        });

        counters.insert(
            "current_searching".to_string(),
            self.queue.len().await.unwrap_or(0) as i64,
        );
        counters.insert(
            "active_proposals".to_string(),
            self.proposals.active_count().await.unwrap_or(0) as i64,
        );

        counters
    }

    /// Store connectivity probe for the health endpoint
    pub async fn store_healthy(&self) -> bool {
        self.store.kv_exists("mm:health").await.is_ok()
    }

    /// Terminal success: both parties accepted
    ///
    /// Side effects are each best-effort; losing an audit row or a
    /// notification never rolls back the match itself.
    async fn complete_match(&self, proposal: &Proposal) {
        let chat_id = Uuid::new_v4().to_string();
        let matched_at = now_ms();

        if let Err(e) = self
            .history
            .record_match(&proposal.user_a, &proposal.user_b, &chat_id)
            .await
        {
            tracing::warn!("Failed to persist match record for {}: {}", proposal.id, e);
        }
        if proposal.kind == Some(ProposalKind::Friendship) {
            if let Err(e) = self
                .history
                .record_friendship(&proposal.user_a, &proposal.user_b)
                .await
            {
                tracing::warn!("Failed to persist friendship for {}: {}", proposal.id, e);
            }
        }

        for (user, other) in [
            (&proposal.user_a, &proposal.user_b),
            (&proposal.user_b, &proposal.user_a),
        ] {
            if let Err(e) = self
                .history
                .record_activity(user, "match_accepted", 10, Some(other.as_str()))
                .await
            {
                tracing::warn!("Failed to record activity for {}: {}", user, e);
            }

            let record = MatchRecord {
                chat_id: chat_id.clone(),
                partner_id: other.to_string(),
                matched_at,
            };
            match serde_json::to_string(&record) {
                Ok(json) => {
                    if let Err(e) = self
                        .store
                        .kv_set_ex(&match_key(user), &json, self.config.match_record_ttl)
                        .await
                    {
                        tracing::warn!("Failed to write match record for {}: {}", user, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to serialize match record: {}", e),
            }

            self.notifier.emit_to_user(
                user,
                "match_confirmed",
                serde_json::json!({
                    "chatId": chat_id,
                    "partnerId": other,
                }),
            );
        }

        if let Err(e) = self.proposals.remove(proposal).await {
            tracing::warn!("Failed to delete completed proposal {}: {}", proposal.id, e);
        }
        self.metrics.incr("matches_created").await;

        tracing::info!(
            "Matched {} and {} into chat {}",
            proposal.user_a,
            proposal.user_b,
            chat_id
        );
    }

    /// Put a user back into the queue with a fresh enqueue time
    async fn requeue(&self, user_id: &str) {
        let profile = self.profiles.get(user_id).await;
        let entry = SearchEntry {
            user_id: user_id.to_string(),
            enqueued_at: now_ms(),
            latitude: profile.as_ref().and_then(|p| p.latitude),
            longitude: profile.as_ref().and_then(|p| p.longitude),
            preferences: SearchPreferences::default(),
        };
        if let Err(e) = self.queue.enqueue(&entry).await {
            tracing::warn!("Failed to requeue {}: {}", user_id, e);
        }
    }

    /// Active proposal for a user, degrading store failures to `None`
    async fn active_proposal(&self, user_id: &str) -> Option<Proposal> {
        match self.proposals.find_by_user(user_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Proposal lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }

    fn notify_proposal(
        &self,
        proposal: &Proposal,
        seeker: &Profile,
        candidate: &Profile,
        distance_km: Option<f64>,
    ) {
        let base = serde_json::json!({
            "proposalId": proposal.id,
            "expiresAt": proposal.expires_at,
            "kind": proposal.kind,
            "distanceKm": distance_km,
        });

        let mut to_seeker = base.clone();
        to_seeker["partner"] = candidate.public_fields();
        self.notifier
            .emit_to_user(&seeker.user_id, "match_proposal", to_seeker);

        let mut to_candidate = base;
        to_candidate["partner"] = seeker.public_fields();
        self.notifier
            .emit_to_user(&candidate.user_id, "match_proposal", to_candidate);
    }
}
