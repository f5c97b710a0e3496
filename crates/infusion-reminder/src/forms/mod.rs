//! Admin form sets.
//!
//! Each admin page is a list of single-field forms. A form names the variable
//! it edits, carries its own submit button, and posts one field. Only the
//! first form (in page order) whose button is present in a submission is
//! processed.

mod pages;

pub use pages::PageKind;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::Result;
use crate::i18n::{Language, Phrase};
use crate::storage::Storage;
use crate::variables::{NumberedList, ValueKind, Variable};

/// Submitted form fields, name to value.
pub type Submission = HashMap<String, String>;

/// What a form edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTarget {
    /// A scalar variable.
    Scalar(Variable),
    /// An existing entry of a numbered list.
    ListItem {
        /// The list.
        list: NumberedList,
        /// Stable id of the entry.
        id: u32,
    },
    /// The trailing "add new" entry of a numbered list.
    ListAdd {
        /// The list.
        list: NumberedList,
    },
}

impl FormTarget {
    fn kind(self) -> ValueKind {
        match self {
            Self::Scalar(variable) => variable.kind(),
            Self::ListItem { list, .. } | Self::ListAdd { list } => list.kind(),
        }
    }

    /// Name of the posted field and prefix of the button name.
    fn field_name(self) -> String {
        match self {
            Self::Scalar(variable) => variable.name().to_string(),
            Self::ListItem { list, id } => list.key(id),
            Self::ListAdd { list } => format!("{}new", list.prefix()),
        }
    }
}

/// How a field is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Single-line text input.
    Text,
    /// `HH:MM` time input.
    Time,
    /// Drop-down of `(value, label)` options.
    Select(Vec<(String, String)>),
    /// On/off switch; an absent field means off.
    Checkbox,
}

/// Whether a form changes an existing value or adds a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    /// Change an existing value.
    Change,
    /// Append a new list entry.
    Add,
}

/// One single-field form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldForm {
    /// What the form edits.
    pub target: FormTarget,
    /// Name of the submit button.
    pub button_name: String,
    /// Name of the posted field.
    pub field_name: String,
    /// Field label.
    pub label: String,
    /// Current (or rejected) value.
    pub value: String,
    /// Change or add.
    pub action: FormAction,
    /// How the field is rendered.
    pub input: InputKind,
    /// Id for the delete link, for list entries.
    pub delete_id: Option<u32>,
    /// Validation error from the last submission.
    pub error: Option<String>,
}

impl FieldForm {
    fn new(target: FormTarget, label: String, value: String, input: InputKind) -> Self {
        let field_name = target.field_name();
        let (action, delete_id) = match target {
            FormTarget::ListAdd { .. } => (FormAction::Add, None),
            FormTarget::ListItem { id, .. } => (FormAction::Change, Some(id)),
            FormTarget::Scalar(_) => (FormAction::Change, None),
        };
        Self {
            target,
            button_name: format!("{field_name}_button"),
            field_name,
            label,
            value,
            action,
            input,
            delete_id,
            error: None,
        }
    }

    /// Submit button caption.
    #[must_use]
    pub fn button_text(&self, lang: Language) -> &'static str {
        match self.action {
            FormAction::Change => lang.text(Phrase::Change),
            FormAction::Add => lang.text(Phrase::Add),
        }
    }

    /// HTML `type` of a plain input.
    #[must_use]
    pub fn input_type(&self) -> &'static str {
        match self.input {
            InputKind::Time => "time",
            _ => "text",
        }
    }

    /// Whether the field renders as a checkbox.
    #[must_use]
    pub fn is_checkbox(&self) -> bool {
        self.input == InputKind::Checkbox
    }

    /// Whether the field renders as a drop-down.
    #[must_use]
    pub fn is_select(&self) -> bool {
        matches!(self.input, InputKind::Select(_))
    }

    /// Drop-down options, empty for other inputs.
    #[must_use]
    pub fn options(&self) -> &[(String, String)] {
        match &self.input {
            InputKind::Select(options) => options,
            _ => &[],
        }
    }

    /// Whether a drop-down option is the current value.
    #[must_use]
    pub fn is_selected(&self, option: &str) -> bool {
        self.value == option
    }

    /// Whether a checkbox is on.
    #[must_use]
    pub fn checked(&self) -> bool {
        self.value == "true"
    }

    /// The raw value posted for this form.
    fn submitted_value(&self, submission: &Submission) -> String {
        if self.is_checkbox() {
            // Browsers omit unchecked boxes.
            let on = submission
                .get(&self.field_name)
                .is_some_and(|v| !v.is_empty() && v != "false");
            return on.to_string();
        }
        submission
            .get(&self.field_name)
            .cloned()
            .unwrap_or_default()
    }
}

/// What happened to a submission, shown above the forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A value was changed.
    Changed(String),
    /// A list entry was added.
    Added(String),
    /// A list entry was deleted.
    Deleted(String),
    /// The submission was not saved.
    Failed(String),
    /// The verification file was uploaded.
    Uploaded,
}

impl Notice {
    /// Text shown to the user.
    #[must_use]
    pub fn text(&self, lang: Language) -> String {
        match self {
            Self::Changed(subject) => format!("{}: {subject}", lang.text(Phrase::Changed)),
            Self::Added(subject) => format!("{}: {subject}", lang.text(Phrase::Added)),
            Self::Deleted(subject) => format!("{}: {subject}", lang.text(Phrase::Deleted)),
            Self::Failed(subject) => format!("{}: {subject}", lang.text(Phrase::Failed)),
            Self::Uploaded => format!("{}: ATriggerVerify.txt", lang.text(Phrase::Added)),
        }
    }

    /// Whether the notice reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// All forms of one admin page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    /// Which page this is.
    pub kind: PageKind,
    /// Forms in page order.
    pub forms: Vec<FieldForm>,
}

impl FormPage {
    /// Build the page from the current store contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(kind: PageKind, storage: &Storage, lang: Language) -> Result<Self> {
        Ok(kind.build(&storage.settings()?, lang))
    }

    /// Process a submission.
    ///
    /// Returns `None` when no form's button is present; the page is then
    /// unchanged. Otherwise exactly one form is processed: on success the
    /// page is rebuilt from the store, on a validation error the form keeps
    /// the submitted value and its error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn process(
        &mut self,
        storage: &Storage,
        submission: &Submission,
        lang: Language,
    ) -> Result<Option<Notice>> {
        let Some(index) = self
            .forms
            .iter()
            .position(|form| submission.contains_key(&form.button_name))
        else {
            debug!("No recognised button in submission for {:?}", self.kind);
            return Ok(None);
        };

        let form = &mut self.forms[index];
        let raw = form.submitted_value(submission);
        let value = match form.target.kind().normalize(&raw) {
            Ok(value) => value,
            Err(message) => {
                debug!("Rejected {}: {}", form.field_name, message);
                form.value = raw;
                form.error = Some(message);
                return Ok(Some(Notice::Failed(form.label.clone())));
            }
        };

        let notice = match form.target {
            FormTarget::Scalar(variable) => {
                storage.set(variable.name(), &value)?;
                info!("Changed {}", variable);
                Notice::Changed(form.label.clone())
            }
            FormTarget::ListItem { list, id } => {
                let key = list.key(id);
                if storage.get(&key)?.is_none() {
                    form.value = raw;
                    form.error = Some("This entry no longer exists.".to_string());
                    return Ok(Some(Notice::Failed(form.label.clone())));
                }
                storage.set(&key, &value)?;
                info!("Changed {}", key);
                Notice::Changed(form.label.clone())
            }
            FormTarget::ListAdd { list } => {
                let id = storage.add_numbered(list, &value)?;
                info!("Added {}", list.key(id));
                let position = storage.list_numbered(list)?.len();
                Notice::Added(format!("{} {position}", list_label(list, lang)))
            }
        };

        *self = Self::load(self.kind, storage, lang)?;
        Ok(Some(notice))
    }

    /// Find a form by its button name.
    #[must_use]
    pub fn form(&self, button_name: &str) -> Option<&FieldForm> {
        self.forms.iter().find(|f| f.button_name == button_name)
    }
}

/// Delete one list entry; returns whether it existed.
///
/// # Errors
///
/// Returns an error if the store cannot be written.
pub fn delete_entry(storage: &Storage, list: NumberedList, id: u32) -> Result<bool> {
    storage.remove_numbered(list, id)
}

/// Label prefix of a list's entries.
#[must_use]
pub fn list_label(list: NumberedList, lang: Language) -> &'static str {
    match list {
        NumberedList::DestinationNumbers => lang.text(Phrase::DestinationNumber),
        NumberedList::IftttMakers => lang.text(Phrase::IftttMaker),
    }
}
