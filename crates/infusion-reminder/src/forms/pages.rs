//! Form layouts of the admin pages.

use crate::i18n::{Language, Phrase};
use crate::variables::{NumberedList, Settings, Variable};

use super::{list_label, FieldForm, FormPage, FormTarget, InputKind};

/// Scalar variables edited on the menu page, in page order.
const MENU_TEXT_VARIABLES: [Variable; 7] = [
    Variable::NightscoutLink,
    Variable::InfusionSetAlertFrequency,
    Variable::SensorAlertFrequency,
    Variable::AtriggerKey,
    Variable::AtriggerSecret,
    Variable::TwilioAccountSid,
    Variable::TwilioAuthToken,
];

/// The admin pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Service settings, language and trigger time.
    Menu,
    /// Sender and destination phone numbers.
    PhoneNumbers,
    /// IFTTT maker keys.
    IftttMakers,
    /// SMS and IFTTT switches.
    Notifications,
}

impl PageKind {
    /// Page heading.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Menu => "Menu",
            Self::PhoneNumbers => "Phone numbers",
            Self::IftttMakers => "IFTTT makers",
            Self::Notifications => "Notifications",
        }
    }

    /// URL path of the page.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Menu => "/menu/",
            Self::PhoneNumbers => "/phonenumbers/",
            Self::IftttMakers => "/iftttmakers/",
            Self::Notifications => "/notifications/",
        }
    }

    /// The numbered list managed on this page, if any.
    #[must_use]
    pub fn list(self) -> Option<NumberedList> {
        match self {
            Self::PhoneNumbers => Some(NumberedList::DestinationNumbers),
            Self::IftttMakers => Some(NumberedList::IftttMakers),
            Self::Menu | Self::Notifications => None,
        }
    }

    /// Build the page's forms from a settings snapshot.
    #[must_use]
    pub fn build(self, settings: &Settings, lang: Language) -> FormPage {
        let forms = match self {
            Self::Menu => menu_forms(settings),
            Self::PhoneNumbers => {
                let mut forms = vec![scalar(
                    settings,
                    Variable::FromNumber,
                    lang.text(Phrase::SenderNumber).to_string(),
                    InputKind::Text,
                )];
                forms.extend(list_forms(settings, NumberedList::DestinationNumbers, lang));
                forms
            }
            Self::IftttMakers => list_forms(settings, NumberedList::IftttMakers, lang),
            Self::Notifications => [Variable::SendSms, Variable::TriggerIfttt]
                .into_iter()
                .map(|variable| {
                    let mut form = scalar(
                        settings,
                        variable,
                        variable.name().to_string(),
                        InputKind::Checkbox,
                    );
                    form.value = settings.flag(variable).to_string();
                    form
                })
                .collect(),
        };
        FormPage { kind: self, forms }
    }
}

fn menu_forms(settings: &Settings) -> Vec<FieldForm> {
    let mut forms: Vec<FieldForm> = MENU_TEXT_VARIABLES
        .into_iter()
        .map(|variable| scalar(settings, variable, variable.name().to_string(), InputKind::Text))
        .collect();

    let languages = Language::ALL
        .into_iter()
        .map(|l| (l.code().to_string(), l.native_name().to_string()))
        .collect();
    let mut language = scalar(
        settings,
        Variable::LanguageCode,
        Variable::LanguageCode.name().to_string(),
        InputKind::Select(languages),
    );
    language.value = settings.language().code().to_string();
    forms.push(language);

    let mut time = scalar(
        settings,
        Variable::TriggerTime,
        Variable::TriggerTime.name().to_string(),
        InputKind::Time,
    );
    time.value = settings.trigger_time().format("%H:%M").to_string();
    forms.push(time);

    forms
}

fn scalar(settings: &Settings, variable: Variable, label: String, input: InputKind) -> FieldForm {
    let value = settings.get(variable).unwrap_or_default().to_string();
    FieldForm::new(FormTarget::Scalar(variable), label, value, input)
}

/// N change forms followed by one add form; labels count 1..N.
fn list_forms(settings: &Settings, list: NumberedList, lang: Language) -> Vec<FieldForm> {
    let prefix = list_label(list, lang);
    let entries = settings.list(list);
    let next_position = entries.len() + 1;

    let mut forms: Vec<FieldForm> = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            FieldForm::new(
                FormTarget::ListItem { list, id: entry.id },
                format!("{prefix} {}", index + 1),
                entry.value,
                InputKind::Text,
            )
        })
        .collect();
    forms.push(FieldForm::new(
        FormTarget::ListAdd { list },
        format!("{prefix} {next_position}"),
        String::new(),
        InputKind::Text,
    ));
    forms
}
