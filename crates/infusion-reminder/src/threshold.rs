//! Time remaining until the next infusion set or sensor change.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::i18n::Phrase;
use crate::variables::Variable;

/// A device component with a fixed replacement interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Insulin pump infusion set.
    InfusionSet,
    /// Continuous glucose monitor sensor.
    Sensor,
}

impl Resource {
    /// Both resources, in report order.
    pub const ALL: [Resource; 2] = [Self::InfusionSet, Self::Sensor];

    /// The variable holding this resource's change interval.
    #[must_use]
    pub fn frequency_variable(self) -> Variable {
        match self {
            Self::InfusionSet => Variable::InfusionSetAlertFrequency,
            Self::Sensor => Variable::SensorAlertFrequency,
        }
    }

    /// Translatable display name.
    #[must_use]
    pub fn phrase(self) -> Phrase {
        match self {
            Self::InfusionSet => Phrase::InfusionSet,
            Self::Sensor => Phrase::Sensor,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InfusionSet => write!(f, "infusion_set"),
            Self::Sensor => write!(f, "sensor"),
        }
    }
}

/// Time left until a resource has to be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "seconds", rename_all = "snake_case")]
pub enum TimeRemaining {
    /// The change is due after this much time (zero means "now").
    #[serde(serialize_with = "as_seconds")]
    Remaining(Duration),
    /// The change was due this long ago.
    #[serde(serialize_with = "as_seconds")]
    Overdue(Duration),
    /// No last-change timestamp was available.
    Unknown,
}

fn as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

impl TimeRemaining {
    /// Compute `interval - (now - last)`.
    ///
    /// A missing `last` yields [`TimeRemaining::Unknown`], never a number.
    #[must_use]
    pub fn compute(last: Option<DateTime<Utc>>, interval: Duration, now: DateTime<Utc>) -> Self {
        let Some(last) = last else {
            return Self::Unknown;
        };
        let remaining = interval - (now - last);
        if remaining < Duration::zero() {
            Self::Overdue(-remaining)
        } else {
            Self::Remaining(remaining)
        }
    }

    /// The signed remaining duration (negative when overdue).
    #[must_use]
    pub fn signed(&self) -> Option<Duration> {
        match self {
            Self::Remaining(d) => Some(*d),
            Self::Overdue(d) => Some(-*d),
            Self::Unknown => None,
        }
    }

    /// Whether the change is overdue.
    #[must_use]
    pub fn is_overdue(&self) -> bool {
        matches!(self, Self::Overdue(_))
    }

    /// Whether the remaining time is unknown.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_remaining() {
        let last = now() - Duration::hours(30);
        let result = TimeRemaining::compute(Some(last), Duration::days(3), now());
        assert_eq!(result, TimeRemaining::Remaining(Duration::hours(42)));
        assert_eq!(result.signed(), Some(Duration::hours(42)));
    }

    #[test]
    fn test_overdue() {
        let last = now() - Duration::days(4);
        let result = TimeRemaining::compute(Some(last), Duration::days(3), now());
        assert_eq!(result, TimeRemaining::Overdue(Duration::days(1)));
        assert!(result.is_overdue());
        assert_eq!(result.signed(), Some(-Duration::days(1)));
    }

    #[test]
    fn test_exactly_due_is_zero_remaining() {
        let last = now() - Duration::days(3);
        let result = TimeRemaining::compute(Some(last), Duration::days(3), now());
        assert_eq!(result, TimeRemaining::Remaining(Duration::zero()));
    }

    #[test]
    fn test_missing_timestamp_is_unknown() {
        let result = TimeRemaining::compute(None, Duration::days(3), now());
        assert!(result.is_unknown());
        assert_eq!(result.signed(), None);
    }

    #[test]
    fn test_formula_holds_across_offsets() {
        let interval = Duration::days(10);
        for hours in [0_i64, 1, 47, 240, 241, 500] {
            let last = now() - Duration::hours(hours);
            let result = TimeRemaining::compute(Some(last), interval, now());
            assert_eq!(result.signed(), Some(interval - (now() - last)));
        }
    }

    #[test]
    fn test_event_in_future() {
        let last = now() + Duration::hours(1);
        let result = TimeRemaining::compute(Some(last), Duration::days(1), now());
        assert_eq!(result, TimeRemaining::Remaining(Duration::hours(25)));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&TimeRemaining::Overdue(Duration::minutes(2))).unwrap();
        assert_eq!(json, r#"{"state":"overdue","seconds":120}"#);
        let json = serde_json::to_string(&TimeRemaining::Unknown).unwrap();
        assert_eq!(json, r#"{"state":"unknown"}"#);
    }

    #[test]
    fn test_resource_frequency_variables() {
        assert_eq!(
            Resource::InfusionSet.frequency_variable(),
            Variable::InfusionSetAlertFrequency
        );
        assert_eq!(
            Resource::Sensor.frequency_variable(),
            Variable::SensorAlertFrequency
        );
    }
}
