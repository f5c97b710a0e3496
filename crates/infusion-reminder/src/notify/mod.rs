//! Notification dispatch.
//!
//! A composed message is handed to every enabled [`NotificationChannel`].
//! Each channel reports one [`Delivery`] per recipient, and the notifier
//! collects them into a [`DispatchReport`]. Nothing is retried and no failure
//! is dropped: callers decide how to surface the report.

mod ifttt;
mod sms;

pub use ifttt::IftttChannel;
pub use sms::SmsChannel;

use std::fmt;

use reqwest::{Client, Response};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServicesConfig;
use crate::variables::{NumberedList, Settings, Variable};

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY: usize = 200;

/// Where a delivery was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Twilio SMS.
    Sms,
    /// IFTTT maker webhook.
    Ifttt,
    /// ATrigger next-run scheduling.
    Schedule,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Sms => "sms",
            Self::Ifttt => "ifttt",
            Self::Schedule => "schedule",
        })
    }
}

/// Why a delivery did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Credentials or recipients are missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The request could not be sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },
}

/// The result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Channel used.
    pub channel: Channel,
    /// Recipient as shown to the user (keys are masked).
    pub recipient: String,
    /// Whether the attempt succeeded.
    #[serde(rename = "error", serialize_with = "serialize_outcome")]
    pub outcome: Result<(), DeliveryError>,
}

fn serialize_outcome<S: Serializer>(
    outcome: &Result<(), DeliveryError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match outcome {
        Ok(()) => s.serialize_none(),
        Err(e) => s.serialize_some(&e.to_string()),
    }
}

impl Delivery {
    /// A successful delivery.
    #[must_use]
    pub fn sent(channel: Channel, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            outcome: Ok(()),
        }
    }

    /// A failed delivery.
    #[must_use]
    pub fn failed(channel: Channel, recipient: impl Into<String>, error: DeliveryError) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            outcome: Err(error),
        }
    }

    /// Whether the delivery succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Log the delivery at the matching level.
    pub(crate) fn log(&self) {
        match &self.outcome {
            Ok(()) => info!("{} delivery to {} succeeded", self.channel, self.recipient),
            Err(e) => warn!("{} delivery to {} failed: {}", self.channel, self.recipient, e),
        }
    }
}

/// Every delivery attempted for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Deliveries in the order they were attempted.
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    /// Add a delivery.
    pub fn push(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }

    /// Whether every delivery succeeded (true when nothing was attempted).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.deliveries.iter().all(Delivery::is_ok)
    }

    /// The failed deliveries.
    pub fn failures(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| !d.is_ok())
    }

    /// Whether nothing was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

/// A way of delivering a message to its recipients.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Which channel this is.
    fn channel(&self) -> Channel;

    /// Send the message to every recipient, one [`Delivery`] each.
    ///
    /// A channel that cannot send at all returns a single failed delivery.
    async fn deliver(&self, message: &str) -> Vec<Delivery>;
}

/// Sends a message through every enabled channel.
#[derive(Debug, Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    /// Create a notifier with explicit channels.
    #[must_use]
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Build the channels enabled by `SEND_SMS` and `TRIGGER_IFTTT`.
    #[must_use]
    pub fn from_settings(settings: &Settings, services: &ServicesConfig, client: &Client) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if settings.send_sms() {
            channels.push(Box::new(SmsChannel {
                client: client.clone(),
                api_base: services.twilio_api_base.clone(),
                account_sid: settings.get(Variable::TwilioAccountSid).map(str::to_string),
                auth_token: settings.get(Variable::TwilioAuthToken).map(str::to_string),
                from: settings.get(Variable::FromNumber).map(str::to_string),
                recipients: settings.list_values(NumberedList::DestinationNumbers),
            }));
        }

        if settings.trigger_ifttt() {
            channels.push(Box::new(IftttChannel {
                client: client.clone(),
                base: services.ifttt_base.clone(),
                event: services.ifttt_event.clone(),
                makers: settings.list_values(NumberedList::IftttMakers),
            }));
        }

        Self { channels }
    }

    /// Channels that will be used.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    /// Send the message through every channel.
    pub async fn dispatch(&self, message: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        for channel in &self.channels {
            for delivery in channel.deliver(message).await {
                delivery.log();
                report.push(delivery);
            }
        }
        report
    }
}

/// Turn a service response into a delivery outcome.
pub(crate) async fn check_response(response: Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Rejected {
        status: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY),
    })
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Hide all but the first few characters of a secret.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
