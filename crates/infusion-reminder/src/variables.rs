//! Configuration variables and their validation.
//!
//! Every setting the panel edits is a named string in the store. This module
//! knows the fixed set of scalar variables, the two numbered lists (phone
//! numbers and IFTTT makers), how each value is validated, and how a snapshot
//! of the store is read back as typed [`Settings`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{Duration, NaiveTime};
use regex::Regex;

use crate::i18n::Language;
use crate::threshold::Resource;

/// Longest accepted alert interval, in days.
const MAX_INTERVAL_DAYS: i64 = 365;

/// Trigger time used when `TRIGGER_TIME` is unset.
const DEFAULT_TRIGGER_TIME: (u32, u32) = (8, 0);

/// A scalar configuration variable with a fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Base URL of the Nightscout site.
    NightscoutLink,
    /// Infusion set change interval in days.
    InfusionSetAlertFrequency,
    /// CGM sensor change interval in days.
    SensorAlertFrequency,
    /// ATrigger API key.
    AtriggerKey,
    /// ATrigger API secret.
    AtriggerSecret,
    /// Twilio account SID.
    TwilioAccountSid,
    /// Twilio auth token.
    TwilioAuthToken,
    /// Number SMS messages are sent from.
    FromNumber,
    /// Whether IFTTT makers are triggered.
    TriggerIfttt,
    /// Whether SMS messages are sent.
    SendSms,
    /// Language of messages and labels.
    LanguageCode,
    /// Time of day (UTC) of the scheduled run.
    TriggerTime,
}

impl Variable {
    /// All scalar variables.
    pub const ALL: [Variable; 12] = [
        Self::NightscoutLink,
        Self::InfusionSetAlertFrequency,
        Self::SensorAlertFrequency,
        Self::AtriggerKey,
        Self::AtriggerSecret,
        Self::TwilioAccountSid,
        Self::TwilioAuthToken,
        Self::FromNumber,
        Self::TriggerIfttt,
        Self::SendSms,
        Self::LanguageCode,
        Self::TriggerTime,
    ];

    /// The storage key of this variable.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NightscoutLink => "NIGHTSCOUT_LINK",
            Self::InfusionSetAlertFrequency => "INFUSION_SET_ALERT_FREQUENCY",
            Self::SensorAlertFrequency => "SENSOR_ALERT_FREQUENCY",
            Self::AtriggerKey => "ATRIGGER_KEY",
            Self::AtriggerSecret => "ATRIGGER_SECRET",
            Self::TwilioAccountSid => "TWILIO_ACCOUNT_SID",
            Self::TwilioAuthToken => "TWILIO_AUTH_TOKEN",
            Self::FromNumber => "FROM_NUMBER",
            Self::TriggerIfttt => "TRIGGER_IFTTT",
            Self::SendSms => "SEND_SMS",
            Self::LanguageCode => "LANGUAGE_CODE",
            Self::TriggerTime => "TRIGGER_TIME",
        }
    }

    /// Look a variable up by its storage key.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// The kind of value this variable holds.
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::NightscoutLink => ValueKind::Url,
            Self::InfusionSetAlertFrequency | Self::SensorAlertFrequency => ValueKind::Days,
            Self::AtriggerKey
            | Self::AtriggerSecret
            | Self::TwilioAccountSid
            | Self::TwilioAuthToken => ValueKind::Token,
            Self::FromNumber => ValueKind::PhoneNumber,
            Self::TriggerIfttt | Self::SendSms => ValueKind::Bool,
            Self::LanguageCode => ValueKind::Language,
            Self::TriggerTime => ValueKind::TimeOfDay,
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A list of values stored as one variable per entry, `<PREFIX><id>`.
///
/// Ids are stable: deleting an entry never renames the others, and a new
/// entry takes the highest id plus one. Display positions (1..N) are derived
/// from id order on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberedList {
    /// SMS destination numbers.
    DestinationNumbers,
    /// IFTTT maker webhook keys.
    IftttMakers,
}

impl NumberedList {
    /// Both lists.
    pub const ALL: [NumberedList; 2] = [Self::DestinationNumbers, Self::IftttMakers];

    /// Key prefix shared by every entry of the list.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::DestinationNumbers => "TO_NUMBER_",
            Self::IftttMakers => "IFTTT_MAKER_",
        }
    }

    /// Storage key of the entry with the given id.
    #[must_use]
    pub fn key(self, id: u32) -> String {
        format!("{}{id}", self.prefix())
    }

    /// Parse a storage key into its list and id.
    ///
    /// Only canonical keys parse: `TO_NUMBER_01` is not `TO_NUMBER_1`.
    #[must_use]
    pub fn parse_key(name: &str) -> Option<(Self, u32)> {
        Self::ALL.into_iter().find_map(|list| {
            let suffix = name.strip_prefix(list.prefix())?;
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let id: u32 = suffix.parse().ok()?;
            (list.key(id) == name).then_some((list, id))
        })
    }

    /// The list whose prefix `name` starts with, canonical or not.
    fn claiming(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|list| name.starts_with(list.prefix()))
    }

    /// The kind of value every entry holds.
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::DestinationNumbers => ValueKind::PhoneNumber,
            Self::IftttMakers => ValueKind::Token,
        }
    }
}

/// One entry of a numbered list as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedEntry {
    /// Stable id embedded in the storage key.
    pub id: u32,
    /// Stored value.
    pub value: String,
}

/// The kinds of values variables can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any non-empty text.
    Text,
    /// An http(s) URL.
    Url,
    /// A whole number of days.
    Days,
    /// A phone number in international format.
    PhoneNumber,
    /// An API key, SID or similar token.
    Token,
    /// `true` or `false`.
    Bool,
    /// A supported language code.
    Language,
    /// `HH:MM`.
    TimeOfDay,
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("valid phone regex"))
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid token regex"))
}

fn variable_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid name regex"))
}

impl ValueKind {
    /// Validate a raw value and return the canonical form to store.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the value is rejected.
    pub fn normalize(self, raw: &str) -> std::result::Result<String, String> {
        let value = raw.trim();
        if value.is_empty() {
            return Err("This field is required.".to_string());
        }

        match self {
            Self::Text => Ok(value.to_string()),
            Self::Url => {
                let url = reqwest::Url::parse(value).map_err(|_| "Enter a valid URL.".to_string())?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err("Enter an http or https URL.".to_string());
                }
                Ok(value.trim_end_matches('/').to_string())
            }
            Self::Days => match value.parse::<i64>() {
                Ok(days) if (1..=MAX_INTERVAL_DAYS).contains(&days) => Ok(days.to_string()),
                _ => Err(format!(
                    "Enter a whole number of days between 1 and {MAX_INTERVAL_DAYS}."
                )),
            },
            Self::PhoneNumber => {
                let compact: String = value
                    .chars()
                    .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
                    .collect();
                if phone_regex().is_match(&compact) {
                    Ok(compact)
                } else {
                    Err("Enter a phone number such as +48123456789.".to_string())
                }
            }
            Self::Token => {
                if token_regex().is_match(value) {
                    Ok(value.to_string())
                } else {
                    Err("Only letters, digits, '-' and '_' are allowed.".to_string())
                }
            }
            Self::Bool => parse_bool(value)
                .map(|b| b.to_string())
                .ok_or_else(|| "Expected true or false.".to_string()),
            Self::Language => Language::from_code(value)
                .map(|lang| lang.code().to_string())
                .ok_or_else(|| format!("Unsupported language: {value}.")),
            Self::TimeOfDay => NaiveTime::parse_from_str(value, "%H:%M")
                .map(|t| t.format("%H:%M").to_string())
                .map_err(|_| "Enter a time as HH:MM.".to_string()),
        }
    }
}

/// Resolve the value kind of any variable name.
///
/// Names outside the known set must still look like variable names and are
/// treated as free text.
///
/// # Errors
///
/// Returns a message when the name is not a valid variable name.
pub fn kind_of(name: &str) -> std::result::Result<ValueKind, String> {
    if let Some(variable) = Variable::from_name(name) {
        return Ok(variable.kind());
    }
    if let Some((list, _)) = NumberedList::parse_key(name) {
        return Ok(list.kind());
    }
    if let Some(list) = NumberedList::claiming(name) {
        return Err(format!(
            "invalid variable name: {name}; entries are named {}<id> without leading zeros",
            list.prefix()
        ));
    }
    if variable_name_regex().is_match(name) {
        Ok(ValueKind::Text)
    } else {
        Err(format!("invalid variable name: {name}"))
    }
}

/// Validate a value for the named variable and return its canonical form.
///
/// # Errors
///
/// Returns a message when the name or the value is rejected.
pub fn normalize(name: &str, raw: &str) -> std::result::Result<String, String> {
    kind_of(name)?.normalize(raw)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A typed snapshot of every stored variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Build a snapshot from raw name/value pairs.
    #[must_use]
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Raw value of a scalar variable, `None` when unset or blank.
    #[must_use]
    pub fn get(&self, variable: Variable) -> Option<&str> {
        self.values
            .get(variable.name())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Entries of a numbered list, ordered by id.
    #[must_use]
    pub fn list(&self, list: NumberedList) -> Vec<NumberedEntry> {
        let mut entries: Vec<NumberedEntry> = self
            .values
            .iter()
            .filter_map(|(name, value)| match NumberedList::parse_key(name) {
                Some((found, id)) if found == list => Some(NumberedEntry {
                    id,
                    value: value.clone(),
                }),
                _ => None,
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// Values of a numbered list in display order.
    #[must_use]
    pub fn list_values(&self, list: NumberedList) -> Vec<String> {
        self.list(list).into_iter().map(|e| e.value).collect()
    }

    /// The Nightscout base URL.
    #[must_use]
    pub fn nightscout_link(&self) -> Option<&str> {
        self.get(Variable::NightscoutLink)
    }

    /// The change interval configured for a resource.
    ///
    /// # Errors
    ///
    /// Returns a message when the interval is unset or not a valid number of days.
    pub fn interval(&self, resource: Resource) -> std::result::Result<Duration, String> {
        let variable = resource.frequency_variable();
        let raw = self
            .get(variable)
            .ok_or_else(|| format!("{variable} is not set"))?;
        let days: i64 = ValueKind::Days
            .normalize(raw)
            .map_err(|e| format!("{variable}: {e}"))?
            .parse()
            .map_err(|_| format!("{variable}: not a number"))?;
        Ok(Duration::days(days))
    }

    /// Whether SMS notifications are enabled.
    #[must_use]
    pub fn send_sms(&self) -> bool {
        self.flag(Variable::SendSms)
    }

    /// Whether IFTTT notifications are enabled.
    #[must_use]
    pub fn trigger_ifttt(&self) -> bool {
        self.flag(Variable::TriggerIfttt)
    }

    /// A boolean variable; unset or unparseable reads as `false`.
    #[must_use]
    pub fn flag(&self, variable: Variable) -> bool {
        self.get(variable).and_then(parse_bool).unwrap_or(false)
    }

    /// Language used for messages and labels.
    #[must_use]
    pub fn language(&self) -> Language {
        self.get(Variable::LanguageCode)
            .and_then(Language::from_code)
            .unwrap_or_default()
    }

    /// Time of day (UTC) of the scheduled run.
    #[must_use]
    pub fn trigger_time(&self) -> NaiveTime {
        self.get(Variable::TriggerTime)
            .and_then(|v| NaiveTime::parse_from_str(v, "%H:%M").ok())
            .or_else(|| NaiveTime::from_hms_opt(DEFAULT_TRIGGER_TIME.0, DEFAULT_TRIGGER_TIME.1, 0))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        Settings::from_values(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_variable_name_round_trip() {
        for variable in Variable::ALL {
            assert_eq!(Variable::from_name(variable.name()), Some(variable));
        }
        assert_eq!(Variable::from_name("UNKNOWN"), None);
    }

    #[test]
    fn test_numbered_list_keys() {
        assert_eq!(NumberedList::DestinationNumbers.key(3), "TO_NUMBER_3");
        assert_eq!(
            NumberedList::parse_key("IFTTT_MAKER_12"),
            Some((NumberedList::IftttMakers, 12))
        );
        assert_eq!(NumberedList::parse_key("TO_NUMBER_"), None);
        assert_eq!(NumberedList::parse_key("TO_NUMBER_x1"), None);
        assert_eq!(NumberedList::parse_key("FROM_NUMBER"), None);
    }

    #[test]
    fn test_numbered_keys_must_be_canonical() {
        assert_eq!(NumberedList::parse_key("TO_NUMBER_01"), None);
        assert_eq!(NumberedList::parse_key("IFTTT_MAKER_007"), None);
        assert_eq!(
            NumberedList::parse_key("TO_NUMBER_10"),
            Some((NumberedList::DestinationNumbers, 10))
        );
        assert!(kind_of("TO_NUMBER_01").is_err());
        assert!(kind_of("IFTTT_MAKER_extra").is_err());
        assert!(normalize("TO_NUMBER_01", "+48100000002").is_err());
    }

    #[test]
    fn test_normalize_phone_number() {
        assert_eq!(
            ValueKind::PhoneNumber.normalize(" +48 123-456-789 ").unwrap(),
            "+48123456789"
        );
        assert!(ValueKind::PhoneNumber.normalize("call me").is_err());
        assert!(ValueKind::PhoneNumber.normalize("123").is_err());
    }

    #[test]
    fn test_normalize_days() {
        assert_eq!(ValueKind::Days.normalize("3").unwrap(), "3");
        assert!(ValueKind::Days.normalize("0").is_err());
        assert!(ValueKind::Days.normalize("1.5").is_err());
        assert!(ValueKind::Days.normalize("366").is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            ValueKind::Url.normalize("https://ns.example.com/").unwrap(),
            "https://ns.example.com"
        );
        assert!(ValueKind::Url.normalize("ftp://ns.example.com").is_err());
        assert!(ValueKind::Url.normalize("nightscout").is_err());
    }

    #[test]
    fn test_normalize_bool() {
        assert_eq!(ValueKind::Bool.normalize("on").unwrap(), "true");
        assert_eq!(ValueKind::Bool.normalize("0").unwrap(), "false");
        assert!(ValueKind::Bool.normalize("maybe").is_err());
    }

    #[test]
    fn test_normalize_time_and_language() {
        assert_eq!(ValueKind::TimeOfDay.normalize("7:05").unwrap(), "07:05");
        assert!(ValueKind::TimeOfDay.normalize("25:00").is_err());
        assert_eq!(ValueKind::Language.normalize("PL").unwrap(), "pl");
        assert!(ValueKind::Language.normalize("xx").is_err());
    }

    #[test]
    fn test_normalize_required() {
        assert!(ValueKind::Text.normalize("   ").is_err());
        assert!(ValueKind::Token.normalize("").is_err());
    }

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of("SEND_SMS"), Ok(ValueKind::Bool));
        assert_eq!(kind_of("TO_NUMBER_4"), Ok(ValueKind::PhoneNumber));
        assert_eq!(kind_of("CUSTOM_NOTE"), Ok(ValueKind::Text));
        assert!(kind_of("lower case").is_err());
    }

    #[test]
    fn test_settings_list_ordered_by_id() {
        let s = settings(&[
            ("TO_NUMBER_10", "+48100000000"),
            ("TO_NUMBER_2", "+48200000000"),
            ("IFTTT_MAKER_1", "key"),
        ]);
        let ids: Vec<u32> = s
            .list(NumberedList::DestinationNumbers)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![2, 10]);
        assert_eq!(s.list_values(NumberedList::IftttMakers), vec!["key"]);
    }

    #[test]
    fn test_settings_interval() {
        let s = settings(&[("INFUSION_SET_ALERT_FREQUENCY", "3")]);
        assert_eq!(s.interval(Resource::InfusionSet), Ok(Duration::days(3)));

        let err = s.interval(Resource::Sensor).unwrap_err();
        assert!(err.contains("SENSOR_ALERT_FREQUENCY"));
    }

    #[test]
    fn test_settings_flags_default_off() {
        let s = settings(&[]);
        assert!(!s.send_sms());
        assert!(!s.trigger_ifttt());

        let s = settings(&[("SEND_SMS", "true"), ("TRIGGER_IFTTT", "false")]);
        assert!(s.send_sms());
        assert!(!s.trigger_ifttt());
    }

    #[test]
    fn test_settings_language_and_trigger_time() {
        let s = settings(&[]);
        assert_eq!(s.language(), Language::English);
        assert_eq!(s.trigger_time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        let s = settings(&[("LANGUAGE_CODE", "pl"), ("TRIGGER_TIME", "21:30")]);
        assert_eq!(s.language(), Language::Polish);
        assert_eq!(s.trigger_time(), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }

    #[test]
    fn test_settings_blank_is_unset() {
        let s = settings(&[("NIGHTSCOUT_LINK", "  ")]);
        assert!(s.nightscout_link().is_none());
    }
}
