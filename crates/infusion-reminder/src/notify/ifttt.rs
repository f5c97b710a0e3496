//! IFTTT maker webhook channel.

use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{check_response, mask_secret, Channel, Delivery, DeliveryError, NotificationChannel};

/// Fires the configured IFTTT event once per maker key.
#[derive(Debug, Clone)]
pub struct IftttChannel {
    pub(crate) client: Client,
    pub(crate) base: String,
    pub(crate) event: String,
    pub(crate) makers: Vec<String>,
}

impl IftttChannel {
    fn trigger_url(&self, maker: &str) -> String {
        format!(
            "{}/trigger/{}/with/key/{maker}",
            self.base.trim_end_matches('/'),
            self.event
        )
    }

    async fn trigger(&self, maker: &str, message: &str) -> Result<(), DeliveryError> {
        debug!("Triggering IFTTT event {} for {}", self.event, mask_secret(maker));
        let response = self
            .client
            .post(self.trigger_url(maker))
            .json(&json!({ "value1": message }))
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        check_response(response).await
    }
}

#[async_trait::async_trait]
impl NotificationChannel for IftttChannel {
    fn channel(&self) -> Channel {
        Channel::Ifttt
    }

    async fn deliver(&self, message: &str) -> Vec<Delivery> {
        if self.makers.is_empty() {
            return vec![Delivery::failed(
                Channel::Ifttt,
                "-",
                DeliveryError::NotConfigured("no IFTTT makers".to_string()),
            )];
        }

        let mut deliveries = Vec::with_capacity(self.makers.len());
        for maker in &self.makers {
            let outcome = self.trigger(maker, message).await;
            deliveries.push(Delivery {
                channel: Channel::Ifttt,
                recipient: mask_secret(maker),
                outcome,
            });
        }
        deliveries
    }
}
