//! One checkup run: latest events in, per-resource report and message out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::i18n::{Language, Phrase};
use crate::threshold::{Resource, TimeRemaining};
use crate::tracker::{LatestEvents, TrackerError};
use crate::variables::Settings;

/// Result of evaluating one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceOutcome {
    /// The remaining time was computed (possibly `Unknown`).
    Computed {
        /// Time left until the change.
        remaining: TimeRemaining,
    },
    /// Fetching or configuration failed for this resource.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// Report for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    /// The resource this report covers.
    pub resource: Resource,
    /// Last change timestamp, when known.
    pub last_change: Option<DateTime<Utc>>,
    /// What the evaluation produced.
    pub outcome: ResourceOutcome,
}

impl ResourceReport {
    /// Message fragment for this resource, e.g. `Infusion set: change in 1 d 2 h 0 min`.
    #[must_use]
    pub fn fragment(&self, lang: Language) -> String {
        let name = lang.text(self.resource.phrase());
        let detail = match &self.outcome {
            ResourceOutcome::Computed {
                remaining: TimeRemaining::Remaining(d),
            } => format!("{} {}", lang.text(Phrase::ChangeIn), lang.format_duration(*d)),
            ResourceOutcome::Computed {
                remaining: TimeRemaining::Overdue(d),
            } => format!("{} {}", lang.text(Phrase::OverdueBy), lang.format_duration(*d)),
            ResourceOutcome::Computed {
                remaining: TimeRemaining::Unknown,
            } => lang.text(Phrase::ReadingFailed).to_string(),
            ResourceOutcome::Failed { .. } => lang.text(Phrase::ProcessingFailed).to_string(),
        };
        format!("{name}: {detail}")
    }

    /// Whether the resource could not be evaluated at all.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ResourceOutcome::Failed { .. })
    }
}

/// Reports for both resources of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkup {
    /// When the run was evaluated.
    pub checked_at: DateTime<Utc>,
    /// One report per resource, in [`Resource::ALL`] order.
    pub reports: Vec<ResourceReport>,
}

impl Checkup {
    /// Evaluate both resources.
    ///
    /// A fetch error fails both resources; a bad interval fails only the
    /// resource it belongs to.
    #[must_use]
    pub fn evaluate(
        events: &Result<LatestEvents, TrackerError>,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Self {
        let reports = Resource::ALL
            .into_iter()
            .map(|resource| evaluate_resource(resource, events, settings, now))
            .collect();
        Self {
            checked_at: now,
            reports,
        }
    }

    /// Report for a single resource.
    #[must_use]
    pub fn report(&self, resource: Resource) -> Option<&ResourceReport> {
        self.reports.iter().find(|r| r.resource == resource)
    }

    /// The notification text: one fragment per resource separated by a blank line.
    #[must_use]
    pub fn message(&self, lang: Language) -> String {
        self.reports
            .iter()
            .map(|r| r.fragment(lang))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn evaluate_resource(
    resource: Resource,
    events: &Result<LatestEvents, TrackerError>,
    settings: &Settings,
    now: DateTime<Utc>,
) -> ResourceReport {
    let events = match events {
        Ok(events) => events,
        Err(e) => {
            warn!("Cannot evaluate {}: {}", resource, e);
            return ResourceReport {
                resource,
                last_change: None,
                outcome: ResourceOutcome::Failed {
                    reason: e.to_string(),
                },
            };
        }
    };

    let last_change = events.get(resource);
    let outcome = match settings.interval(resource) {
        Ok(interval) => {
            let remaining = TimeRemaining::compute(last_change, interval, now);
            if remaining.is_unknown() {
                warn!("No {} change found in treatments", resource);
            }
            ResourceOutcome::Computed { remaining }
        }
        Err(reason) => {
            warn!("Cannot evaluate {}: {}", resource, reason);
            ResourceOutcome::Failed { reason }
        }
    };

    ResourceReport {
        resource,
        last_change,
        outcome,
    }
}
