use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Outbound event dispatch to users' live connections
///
/// Delivery is fire-and-forget: matching must never wait on a socket, so
/// implementations return immediately and do the I/O in the background.
/// Failures are logged and dropped.
pub trait Notifier: Send + Sync {
    fn emit_to_user(&self, user_id: &str, event: &str, payload: Value);
}

/// Production dispatcher posting to the realtime gateway's internal emit
/// endpoint
pub struct SocketGateway {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SocketGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            client,
        }
    }
}

impl Notifier for SocketGateway {
    fn emit_to_user(&self, user_id: &str, event: &str, payload: Value) {
        let url = format!("{}/internal/emit", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "userId": user_id,
            "event": event,
            "payload": payload,
        });
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let user_id = user_id.to_string();
        let event = event.to_string();

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .header("X-Api-Key", &api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::trace!("Emitted {} to {}", event, user_id);
                }
                Ok(response) => {
                    tracing::warn!(
                        "Gateway rejected {} for {}: {}",
                        event,
                        user_id,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to emit {} to {}: {}", event, user_id, e);
                }
            }
        });
    }
}

/// No-op dispatcher for tests and headless runs
#[derive(Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn emit_to_user(&self, user_id: &str, event: &str, _payload: Value) {
        tracing::trace!("Dropping {} for {}", event, user_id);
    }
}
