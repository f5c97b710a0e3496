//! Nightscout treatments client.
//!
//! One GET to `<link>/api/v1/treatments` returns the recent treatment log as
//! a JSON array. The newest `Site Change` entry dates the infusion set and the
//! newest `Sensor Change` / `Sensor Start` entry dates the CGM sensor.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::threshold::Resource;

/// Path of the treatments endpoint, relative to the Nightscout link.
const TREATMENTS_PATH: &str = "/api/v1/treatments";

/// Event types that mark an infusion set change.
const INFUSION_SET_EVENTS: &[&str] = &["Site Change"];

/// Event types that mark a sensor change.
const SENSOR_EVENTS: &[&str] = &["Sensor Change", "Sensor Start"];

/// Errors that can occur while reading treatments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// `NIGHTSCOUT_LINK` is not set.
    #[error("Nightscout link is not configured")]
    NotConfigured,

    /// The request could not be sent or the connection failed.
    #[error("request to Nightscout failed: {0}")]
    Request(String),

    /// Nightscout answered with a non-success status.
    #[error("Nightscout returned status {0}")]
    Status(u16),

    /// The response body was not a treatments array.
    #[error("failed to parse Nightscout response: {0}")]
    Parse(String),
}

/// One entry of the treatments log.
///
/// Only the fields needed to date an event are read; everything else is
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Treatment {
    /// Type of the event, e.g. `Site Change`.
    pub event_type: Option<String>,
    /// ISO 8601 timestamp of the event.
    pub created_at: Option<String>,
    /// Milliseconds since the epoch, used when `created_at` is missing.
    pub mills: Option<i64>,
}

impl Treatment {
    /// Read one log entry, tolerating mistyped fields.
    ///
    /// Uploaders disagree on types (`mills` as a float, numeric event types),
    /// so a field of the wrong type reads as absent. Only a non-object entry
    /// yields `None`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
        let mills = entry.get("mills").and_then(|m| {
            m.as_i64()
                .or_else(|| m.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        });
        Some(Self {
            event_type: text("eventType"),
            created_at: text("created_at"),
            mills,
        })
    }

    /// Timestamp of the event, if it can be parsed.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(raw) = self.created_at.as_deref() {
            if let Some(ts) = parse_timestamp(raw) {
                return Some(ts);
            }
            warn!("Ignoring unparseable treatment timestamp: {}", raw);
        }
        self.mills
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    fn is_event_of(&self, resource: Resource) -> bool {
        let kinds = match resource {
            Resource::InfusionSet => INFUSION_SET_EVENTS,
            Resource::Sensor => SENSOR_EVENTS,
        };
        self.event_type
            .as_deref()
            .is_some_and(|t| kinds.iter().any(|k| k.eq_ignore_ascii_case(t.trim())))
    }
}

/// Read every usable entry of a treatments array, skipping the rest.
#[must_use]
pub fn parse_treatments(entries: &[Value]) -> Vec<Treatment> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let treatment = Treatment::from_value(entry);
            if treatment.is_none() {
                warn!("Ignoring treatment #{} that is not an object", index);
            }
            treatment
        })
        .collect()
}

/// Latest change timestamps per resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatestEvents {
    /// Last infusion set change.
    pub infusion_set: Option<DateTime<Utc>>,
    /// Last CGM sensor change.
    pub sensor: Option<DateTime<Utc>>,
}

impl LatestEvents {
    /// Find the newest event of each resource in a treatments log.
    #[must_use]
    pub fn from_treatments(treatments: &[Treatment]) -> Self {
        let newest = |resource: Resource| {
            treatments
                .iter()
                .filter(|t| t.is_event_of(resource))
                .filter_map(Treatment::timestamp)
                .max()
        };
        Self {
            infusion_set: newest(Resource::InfusionSet),
            sensor: newest(Resource::Sensor),
        }
    }

    /// Last change of the given resource.
    #[must_use]
    pub fn get(&self, resource: Resource) -> Option<DateTime<Utc>> {
        match resource {
            Resource::InfusionSet => self.infusion_set,
            Resource::Sensor => self.sensor,
        }
    }
}

/// Parse the timestamp formats Nightscout uploaders produce.
///
/// RFC 3339 with an offset is preferred; timestamps without an offset are
/// taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Client for the Nightscout treatments API.
#[derive(Debug, Clone)]
pub struct NightscoutClient {
    client: Client,
}

impl NightscoutClient {
    /// Create a client sharing the given HTTP connection pool.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the treatments log and extract the latest change events.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is missing, the request fails, or the
    /// response is not a treatments array.
    pub async fn latest_events(&self, link: Option<&str>) -> Result<LatestEvents, TrackerError> {
        let link = link.ok_or(TrackerError::NotConfigured)?;
        let url = format!("{}{TREATMENTS_PATH}", link.trim_end_matches('/'));
        debug!("Fetching treatments from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TrackerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TrackerError::Status(response.status().as_u16()));
        }

        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| TrackerError::Parse(e.to_string()))?;
        let treatments = parse_treatments(&entries);

        let events = LatestEvents::from_treatments(&treatments);
        debug!(
            "Read {} treatments, infusion set: {:?}, sensor: {:?}",
            treatments.len(),
            events.infusion_set,
            events.sensor
        );
        Ok(events)
    }
}
