//! ATrigger next-run scheduling.
//!
//! After a notifying run the panel books a one-shot ATrigger task that calls
//! `/remind/` again at the next occurrence of `TRIGGER_TIME` (UTC).

use chrono::{DateTime, Duration, NaiveTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::notify::{check_response, Channel, Delivery, DeliveryError};
use crate::variables::{Settings, Variable};

/// Timestamp format ATrigger expects for `first`.
const FIRST_RUN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Tag attached to every task created by the panel.
const TAG_TYPE: &str = "reminder";

/// The next instant strictly after `now` whose time of day is `at`.
#[must_use]
pub fn next_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Books the next reminder run with ATrigger.
#[derive(Debug, Clone)]
pub struct Scheduler {
    client: Client,
    api_base: String,
    callback_url: Result<String, DeliveryError>,
}

impl Scheduler {
    /// Create a scheduler that asks ATrigger to call `callback_url`.
    #[must_use]
    pub fn new(client: Client, api_base: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            callback_url: Ok(callback_url.into()),
        }
    }

    /// A scheduler whose callback URL could not be built; every booking
    /// attempt reports `reason` as a failed delivery.
    #[must_use]
    pub fn without_callback(client: Client, api_base: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            callback_url: Err(DeliveryError::NotConfigured(reason.into())),
        }
    }

    /// Create the next one-shot task.
    ///
    /// Returns `None` when `ATRIGGER_KEY` or `ATRIGGER_SECRET` is unset, so
    /// scheduling is opt-in.
    pub async fn schedule_next(&self, settings: &Settings, now: DateTime<Utc>) -> Option<Delivery> {
        let key = settings.get(Variable::AtriggerKey)?;
        let secret = settings.get(Variable::AtriggerSecret)?;
        let first = next_run(now, settings.trigger_time());

        let outcome = match &self.callback_url {
            Ok(callback_url) => self.create_task(key, secret, callback_url, first).await,
            Err(e) => Err(e.clone()),
        };
        let delivery = Delivery {
            channel: Channel::Schedule,
            recipient: first.format(FIRST_RUN_FORMAT).to_string(),
            outcome,
        };
        delivery.log();
        Some(delivery)
    }

    async fn create_task(
        &self,
        key: &str,
        secret: &str,
        callback_url: &str,
        first: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/v1/tasks/create", self.api_base.trim_end_matches('/'));
        let first = first.format(FIRST_RUN_FORMAT).to_string();
        debug!("Scheduling next run at {} via {}", first, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", key),
                ("secret", secret),
                ("timeSlice", "1day"),
                ("count", "1"),
                ("url", callback_url),
                ("first", first.as_str()),
                ("tag_type", TAG_TYPE),
            ])
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        check_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 6, 30, 0).unwrap();
        assert_eq!(
            next_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        assert_eq!(
            next_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2024, 5, 11, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_exactly_now_goes_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap();
        assert_eq!(
            next_run(now, at(8, 0)),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_schedule_without_credentials_is_skipped() {
        let scheduler = Scheduler::new(Client::new(), "https://api.atrigger.com", "http://x/remind/");
        let settings = Settings::default();
        assert!(scheduler.schedule_next(&settings, Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_callback_is_a_failed_booking() {
        let scheduler = Scheduler::without_callback(
            Client::new(),
            "https://api.atrigger.com",
            "server.public_url: relative URL without a base",
        );
        let settings = Settings::from_values(
            [("ATRIGGER_KEY", "k1"), ("ATRIGGER_SECRET", "s1")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );

        let delivery = scheduler.schedule_next(&settings, Utc::now()).await.unwrap();
        assert_eq!(delivery.channel, Channel::Schedule);
        assert!(matches!(
            delivery.outcome,
            Err(DeliveryError::NotConfigured(ref reason)) if reason.contains("public_url")
        ));
    }
}
