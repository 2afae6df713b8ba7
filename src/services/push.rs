use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::PushSettings;

/// Errors that can occur when delivering push notifications
#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Push gateway returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid push API key")]
    Unauthorized,
}

/// Body posted to the push gateway
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// Client for the external push gateway
///
/// When push is disabled in configuration every send is a no-op.
pub struct PushClient {
    endpoint: String,
    api_key: String,
    enabled: bool,
    client: Client,
}

impl PushClient {
    pub fn new(settings: &PushSettings) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(5)))
            .build()?;

        let enabled = settings.enabled && !settings.endpoint.is_empty();
        if settings.enabled && !enabled {
            tracing::warn!("Push is enabled but no endpoint is configured; notifications are disabled");
        }

        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            enabled,
            client,
        })
    }

    /// Client that never sends anything
    pub fn disabled() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            enabled: false,
            client: Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns false when push is disabled and nothing was sent
    pub async fn send(&self, notification: &PushNotification) -> Result<bool, PushError> {
        if !self.enabled {
            tracing::trace!("Push disabled, skipping notification for {}", notification.user_id);
            return Ok(false);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(notification)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!("Push sent to {}", notification.user_id);
                Ok(true)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PushError::Unauthorized),
            status => Err(PushError::ApiError(format!("Failed to send push: {}", status))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_client_is_noop() {
        let client = PushClient::disabled();
        let sent = client
            .send(&PushNotification {
                user_id: "u1".to_string(),
                title: "Hi".to_string(),
                body: "There".to_string(),
                data: Value::Null,
            })
            .await
            .unwrap();
        assert!(!sent);
    }

    #[test]
    fn test_enabled_without_endpoint_stays_disabled() {
        let settings = PushSettings {
            enabled: true,
            endpoint: String::new(),
            api_key: "k".to_string(),
            timeout_secs: None,
        };
        assert!(!PushClient::new(&settings).unwrap().is_enabled());
    }

    #[test]
    fn test_notification_shape() {
        let n = PushNotification {
            user_id: "u1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            data: serde_json::json!({"matchId": "m"}),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["data"]["matchId"], "m");
    }
}
