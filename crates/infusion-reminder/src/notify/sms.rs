//! Twilio SMS channel.

use reqwest::Client;
use tracing::debug;

use super::{check_response, Channel, Delivery, DeliveryError, NotificationChannel};

/// Sends the message as an SMS to every destination number.
#[derive(Debug, Clone)]
pub struct SmsChannel {
    pub(crate) client: Client,
    pub(crate) api_base: String,
    pub(crate) account_sid: Option<String>,
    pub(crate) auth_token: Option<String>,
    pub(crate) from: Option<String>,
    pub(crate) recipients: Vec<String>,
}

impl SmsChannel {
    fn messages_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{account_sid}/Messages.json",
            self.api_base.trim_end_matches('/')
        )
    }

    async fn send_one(
        &self,
        url: &str,
        account_sid: &str,
        auth_token: &str,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        debug!("Sending SMS to {}", to);
        let response = self
            .client
            .post(url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        check_response(response).await
    }
}

#[async_trait::async_trait]
impl NotificationChannel for SmsChannel {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn deliver(&self, message: &str) -> Vec<Delivery> {
        let (Some(sid), Some(token), Some(from)) = (
            self.account_sid.as_deref(),
            self.auth_token.as_deref(),
            self.from.as_deref(),
        ) else {
            return vec![Delivery::failed(
                Channel::Sms,
                "-",
                DeliveryError::NotConfigured(
                    "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and FROM_NUMBER are required".to_string(),
                ),
            )];
        };

        if self.recipients.is_empty() {
            return vec![Delivery::failed(
                Channel::Sms,
                "-",
                DeliveryError::NotConfigured("no destination numbers".to_string()),
            )];
        }

        let url = self.messages_url(sid);
        let mut deliveries = Vec::with_capacity(self.recipients.len());
        for to in &self.recipients {
            let outcome = self.send_one(&url, sid, token, from, to, message).await;
            deliveries.push(Delivery {
                channel: Channel::Sms,
                recipient: to.clone(),
                outcome,
            });
        }
        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> SmsChannel {
        SmsChannel {
            client: Client::new(),
            api_base: "https://api.twilio.com/".to_string(),
            account_sid: Some("AC123".to_string()),
            auth_token: Some("secret".to_string()),
            from: Some("+48100000000".to_string()),
            recipients: vec!["+48200000000".to_string()],
        }
    }

    #[test]
    fn test_messages_url() {
        assert_eq!(
            channel().messages_url("AC123"),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut sms = channel();
        sms.auth_token = None;
        let deliveries = sms.deliver("hi").await;
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(
            deliveries[0].outcome,
            Err(DeliveryError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let mut sms = channel();
        sms.recipients.clear();
        let deliveries = sms.deliver("hi").await;
        assert_eq!(deliveries.len(), 1);
        assert!(!deliveries[0].is_ok());
    }
}
