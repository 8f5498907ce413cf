//! Email-draft notification over a configured HTTP endpoint

use super::{DeliveryError, Notifier};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const NOTIFY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

pub struct EmailDraftNotifier {
    endpoint: String,
    recipient: String,
}

impl EmailDraftNotifier {
    pub fn new(endpoint: String, recipient: String) -> Self {
        Self {
            endpoint,
            recipient,
        }
    }
}

#[async_trait]
impl Notifier for EmailDraftNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        let request = DraftRequest {
            to: &self.recipient,
            subject,
            body,
        };

        let response = client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Http(format!(
                "draft endpoint returned {}",
                response.status()
            )));
        }

        log::info!("✉️  Draft created for {}", self.recipient);
        Ok(())
    }
}
