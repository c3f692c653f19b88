use crate::models::Profile;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when talking to the profile service
#[derive(Debug, Error)]
pub enum ProfileApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Source of durable profile records
///
/// The profile store is owned by another service; the engine only ever
/// reads it. A missing user is a soft `None`, not an error.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Profile>, ProfileApiError>;
}

/// HTTP client for the profile document API
pub struct ProfileApiClient {
    base_url: String,
    api_key: String,
    project_id: String,
    client: Client,
}

impl ProfileApiClient {
    pub fn new(base_url: String, api_key: String, project_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            project_id,
            client,
        }
    }
}

#[async_trait]
impl ProfileRepository for ProfileApiClient {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Profile>, ProfileApiError> {
        let query_json = format!(r#"["userId={}"]"#, user_id);
        let encoded_query = urlencoding::encode(&query_json);

        let url = format!(
            "{}/profiles/documents?query={}",
            self.base_url.trim_end_matches('/'),
            encoded_query
        );

        tracing::debug!("Fetching profile for user: {}", user_id);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .header("X-Project", &self.project_id)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(ProfileApiError::ApiError(format!(
                "Failed to fetch profile: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProfileApiError::InvalidResponse("Missing documents array".into()))?;

        let Some(doc) = documents.first() else {
            return Ok(None);
        };

        let data = doc.get("data").unwrap_or(doc);

        serde_json::from_value(data.clone())
            .map(Some)
            .map_err(|e| ProfileApiError::InvalidResponse(format!("Failed to parse profile: {}", e)))
    }
}

/// In-memory repository for tests and local development
#[derive(Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfiles {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Profile>, ProfileApiError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}
