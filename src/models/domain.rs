use serde::{Deserialize, Serialize};

/// User profile attributes needed for matchmaking
///
/// This is a read-through snapshot of the durable profile record, which is
/// owned by the profile service. Only the fields the scorer and the
/// orchestrator need are carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "locationPreference", default)]
    pub location_preference: Option<String>,
    #[serde(rename = "avatarFileId", default)]
    pub avatar_file_id: Option<String>,
}

impl Profile {
    /// True if both coordinates are present
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// True if the user declared the "international" location preference
    pub fn prefers_international(&self) -> bool {
        self.location_preference
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case("international"))
            .unwrap_or(false)
    }

    /// The public subset of profile fields included in proposal notifications
    pub fn public_fields(&self) -> serde_json::Value {
        serde_json::json!({
            "userId": self.user_id,
            "displayName": self.display_name,
            "age": self.age,
            "interests": self.interests,
            "avatarFileId": self.avatar_file_id,
        })
    }
}

/// Snapshot of a profile held in the read-through cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedProfile {
    pub profile: Profile,
    #[serde(rename = "cachedAt")]
    pub cached_at: i64,
}

/// Per-search options supplied by the user on `startSearch`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPreferences {
    /// Named age-band level: strict | moderate | open | any
    #[serde(rename = "ageFlexibility", default)]
    pub age_flexibility: Option<String>,
    #[serde(rename = "locationPreference", default)]
    pub location_preference: Option<String>,
}

/// A user currently in the search queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Epoch milliseconds, used as the queue ordering score
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: i64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub preferences: SearchPreferences,
}

/// Flavor of a proposal, derived from the seeker's needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Friendship,
    Relationship,
}

/// A pending two-party match offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(rename = "userA")]
    pub user_a: String,
    #[serde(rename = "userB")]
    pub user_b: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    #[serde(rename = "acceptedA")]
    pub accepted_a: bool,
    #[serde(rename = "acceptedB")]
    pub accepted_b: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub kind: Option<ProposalKind>,
}

impl Proposal {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The other party, or `None` if `user_id` is not a participant
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }

    pub fn accepted_by(&self, user_id: &str) -> bool {
        (self.user_a == user_id && self.accepted_a) || (self.user_b == user_id && self.accepted_b)
    }

    /// Both parties accepted - terminal success condition
    pub fn is_complete(&self) -> bool {
        self.accepted_a && self.accepted_b
    }
}

/// Outcome of a completed match, kept briefly so both parties can read it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "partnerId")]
    pub partner_id: String,
    #[serde(rename = "matchedAt")]
    pub matched_at: i64,
}

/// Where a user currently sits in the matchmaking lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Idle,
    Searching,
    Proposal,
    Matched,
}

/// Full status snapshot for a user, as returned by `getStatus` and `decide`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatus {
    pub state: UserState,
    #[serde(default)]
    pub proposal: Option<Proposal>,
    #[serde(rename = "match", default)]
    pub match_record: Option<MatchRecord>,
}

impl UserStatus {
    pub fn idle() -> Self {
        Self {
            state: UserState::Idle,
            proposal: None,
            match_record: None,
        }
    }
}

/// A user's decision on their active proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Pass,
}

impl Decision {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "accept" => Some(Decision::Accept),
            "pass" => Some(Decision::Pass),
            _ => None,
        }
    }
}
