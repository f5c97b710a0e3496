//! Shared application state and the checkup pipeline.
//!
//! A [`Panel`] owns the variable store, the bootstrap configuration and one
//! HTTP client. Both the web handlers and the CLI drive checkups through it.

use std::collections::BTreeMap;

use chrono::Utc;
use reqwest::{Client, Url};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::checkup::Checkup;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{DispatchReport, Notifier};
use crate::schedule::Scheduler;
use crate::storage::Storage;
use crate::tracker::NightscoutClient;
use crate::variables::{self, Settings};

/// Everything one checkup run produced.
#[derive(Debug, Clone, Serialize)]
pub struct CheckupOutcome {
    /// Per-resource reports.
    pub checkup: Checkup,
    /// Language code the message was composed in.
    pub language: String,
    /// The composed message.
    pub message: String,
    /// Delivery results; `None` when notifications were not requested.
    pub dispatch: Option<DispatchReport>,
}

impl CheckupOutcome {
    /// Whether every requested delivery succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.dispatch.as_ref().map_or(true, DispatchReport::is_success)
    }
}

/// Shared state of the reminder panel.
#[derive(Debug)]
pub struct Panel {
    config: Config,
    storage: Mutex<Storage>,
    http: Client,
}

impl Panel {
    /// Open the configured store, seed default variables and build the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the client cannot be built.
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        Self::with_storage(config, storage)
    }

    /// Build a panel around an already opened store.
    ///
    /// # Errors
    ///
    /// Returns an error if seeding fails or the client cannot be built.
    pub fn with_storage(config: Config, storage: Storage) -> Result<Self> {
        let seeds: BTreeMap<String, String> = config
            .variables
            .iter()
            .filter_map(|(name, value)| {
                let kind = match variables::kind_of(name) {
                    Ok(kind) => kind,
                    Err(message) => {
                        warn!("Not seeding {}: {}", name, message);
                        return None;
                    }
                };
                let value = kind.normalize(value).unwrap_or_else(|_| value.clone());
                Some((name.clone(), value))
            })
            .collect();
        storage.seed(&seeds)?;
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("infusion-reminder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            storage: Mutex::new(storage),
            http,
        })
    }

    /// Bootstrap configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The variable store. Never hold the guard across an outbound request.
    #[must_use]
    pub fn storage(&self) -> &Mutex<Storage> {
        &self.storage
    }

    /// A snapshot of every variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn settings(&self) -> Result<Settings> {
        self.storage.lock().await.settings()
    }

    /// Compare a presented key with the configured secret.
    #[must_use]
    pub fn secret_matches(&self, candidate: &str) -> bool {
        // blake3::Hash equality is constant-time.
        blake3::hash(candidate.as_bytes()) == blake3::hash(self.config.server.secret_key.as_bytes())
    }

    /// URL ATrigger should call to run the next reminder.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured public URL is not a valid base URL.
    pub fn callback_url(&self) -> Result<String> {
        let mut base = self.config.server.public_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)
            .and_then(|b| b.join("remind/"))
            .map_err(|e| Error::ConfigValidation {
                message: format!("server.public_url: {e}"),
            })?;
        url.query_pairs_mut()
            .append_pair("key", &self.config.server.secret_key);
        Ok(url.to_string())
    }

    /// Fetch events, compute the remaining times and, when `notify` is set,
    /// dispatch the message and book the next run.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store cannot be read. Remote failures
    /// are reported inside the outcome.
    pub async fn run_checkup(&self, notify: bool) -> Result<CheckupOutcome> {
        let settings = self.settings().await?;
        let lang = settings.language();

        let events = NightscoutClient::new(self.http.clone())
            .latest_events(settings.nightscout_link())
            .await;
        let now = Utc::now();
        let checkup = Checkup::evaluate(&events, &settings, now);
        let message = checkup.message(lang);
        info!("Checkup finished: {}", message.replace("\n\n", " | "));

        let dispatch = if notify {
            let atrigger_base = self.config.services.atrigger_base.clone();
            let scheduler = match self.callback_url() {
                Ok(url) => Scheduler::new(self.http.clone(), atrigger_base, url),
                Err(e) => Scheduler::without_callback(self.http.clone(), atrigger_base, e.to_string()),
            };
            let mut report = Notifier::from_settings(&settings, &self.config.services, &self.http)
                .dispatch(&message)
                .await;
            if let Some(delivery) = scheduler.schedule_next(&settings, now).await {
                report.push(delivery);
            }
            if !report.is_success() {
                warn!("{} deliveries failed", report.failures().count());
            }
            Some(report)
        } else {
            None
        };

        Ok(CheckupOutcome {
            checkup,
            language: lang.code().to_string(),
            message,
            dispatch,
        })
    }
}
