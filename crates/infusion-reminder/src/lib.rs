//! `infusion-reminder` - infusion set and CGM sensor change reminders
//!
//! This library reads the last site and sensor changes from a Nightscout
//! site, computes the time left until each must be changed, and notifies the
//! user by SMS and IFTTT. A small web panel edits the reminder settings,
//! which live in an embedded `SQLite` store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod checkup;
pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod i18n;
pub mod logging;
pub mod notify;
pub mod panel;
pub mod schedule;
pub mod storage;
pub mod threshold;
pub mod tracker;
pub mod variables;
pub mod web;

pub use checkup::{Checkup, ResourceReport};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use notify::{DispatchReport, Notifier};
pub use panel::{CheckupOutcome, Panel};
pub use storage::{Storage, StoreStats};
pub use threshold::{Resource, TimeRemaining};
pub use variables::{Settings, Variable};
