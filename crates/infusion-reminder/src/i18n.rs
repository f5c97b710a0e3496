//! Message and label translations.

use chrono::Duration;

/// Languages the panel can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// English (`en`).
    #[default]
    English,
    /// Polish (`pl`).
    Polish,
}

/// Translatable phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phrase {
    /// Name of the infusion set resource.
    InfusionSet,
    /// Name of the CGM sensor resource.
    Sensor,
    /// "change in <duration>".
    ChangeIn,
    /// "change overdue by <duration>".
    OverdueBy,
    /// No timestamp could be read.
    ReadingFailed,
    /// The reading could not be processed.
    ProcessingFailed,
    /// Label of a destination number field.
    DestinationNumber,
    /// Label of the sender number field.
    SenderNumber,
    /// Label of an IFTTT maker field.
    IftttMaker,
    /// Submit button of an "add" form.
    Add,
    /// Submit button of a "change" form.
    Change,
    /// Notice after adding an entry.
    Added,
    /// Notice after changing a value.
    Changed,
    /// Notice after deleting an entry.
    Deleted,
    /// Notice after a failed save.
    Failed,
    /// Unit suffix for days.
    Days,
    /// Unit suffix for hours.
    Hours,
    /// Unit suffix for minutes.
    Minutes,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 2] = [Self::English, Self::Polish];

    /// ISO 639-1 code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Polish => "pl",
        }
    }

    /// Name of the language in itself.
    #[must_use]
    pub fn native_name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Polish => "Polski",
        }
    }

    /// Parse a language code, ignoring case and region suffixes (`pl-PL`).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code.split(['-', '_']).next().unwrap_or(code);
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(primary))
    }

    /// Translate a phrase.
    #[must_use]
    pub fn text(self, phrase: Phrase) -> &'static str {
        match self {
            Self::English => english(phrase),
            Self::Polish => polish(phrase),
        }
    }

    /// Format a duration as `2 d 4 h 10 min`, dropping leading zero units.
    ///
    /// Negative durations are formatted by magnitude.
    #[must_use]
    pub fn format_duration(self, duration: Duration) -> String {
        let total_minutes = duration.num_minutes().abs();
        let days = total_minutes / (24 * 60);
        let hours = (total_minutes / 60) % 24;
        let minutes = total_minutes % 60;

        let mut parts = Vec::with_capacity(3);
        if days > 0 {
            parts.push(format!("{days} {}", self.text(Phrase::Days)));
        }
        if days > 0 || hours > 0 {
            parts.push(format!("{hours} {}", self.text(Phrase::Hours)));
        }
        parts.push(format!("{minutes} {}", self.text(Phrase::Minutes)));
        parts.join(" ")
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

fn english(phrase: Phrase) -> &'static str {
    match phrase {
        Phrase::InfusionSet => "Infusion set",
        Phrase::Sensor => "CGM sensor",
        Phrase::ChangeIn => "change in",
        Phrase::OverdueBy => "change overdue by",
        Phrase::ReadingFailed => "unsuccessful data reading",
        Phrase::ProcessingFailed => "unsuccessful data processing",
        Phrase::DestinationNumber => "DESTINATION NUMBER",
        Phrase::SenderNumber => "NUMBER OF SENDER",
        Phrase::IftttMaker => "IFTTT MAKER",
        Phrase::Add => "ADD",
        Phrase::Change => "CHANGE",
        Phrase::Added => "ADDED",
        Phrase::Changed => "CHANGED",
        Phrase::Deleted => "DELETED",
        Phrase::Failed => "NOT SAVED",
        Phrase::Days => "d",
        Phrase::Hours => "h",
        Phrase::Minutes => "min",
    }
}

fn polish(phrase: Phrase) -> &'static str {
    match phrase {
        Phrase::InfusionSet => "Zestaw infuzyjny",
        Phrase::Sensor => "Sensor CGM",
        Phrase::ChangeIn => "wymiana za",
        Phrase::OverdueBy => "wymiana spóźniona o",
        Phrase::ReadingFailed => "nieudany odczyt danych",
        Phrase::ProcessingFailed => "nieudane przetwarzanie danych",
        Phrase::DestinationNumber => "NUMER ODBIORCY",
        Phrase::SenderNumber => "NUMER NADAWCY",
        Phrase::IftttMaker => "IFTTT MAKER",
        Phrase::Add => "DODAJ",
        Phrase::Change => "ZMIEŃ",
        Phrase::Added => "DODANO",
        Phrase::Changed => "ZMIENIONO",
        Phrase::Deleted => "USUNIĘTO",
        Phrase::Failed => "NIE ZAPISANO",
        Phrase::Days => "d",
        Phrase::Hours => "godz.",
        Phrase::Minutes => "min",
    }
}
