//! Checkup status pages.

use axum::extract::{Query, State};
use axum::response::Html;

use crate::checkup::ResourceOutcome;
use crate::error::Result;
use crate::i18n::Language;
use crate::panel::CheckupOutcome;

use super::pages::{nav_links, DeliveryRow, ResourceRow, StatusPage};
use super::{key_query, render, AppState, PageQuery};

/// Checkup, notification and next-run scheduling.
pub(crate) async fn remind(
    State(panel): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let outcome = panel.run_checkup(true).await?;
    render(&status_page("Reminder", &query, &outcome))
}

/// Checkup only; nothing is sent.
pub(crate) async fn checkup(
    State(panel): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let outcome = panel.run_checkup(false).await?;
    render(&status_page("Checkup", &query, &outcome))
}

fn status_page(title: &'static str, query: &PageQuery, outcome: &CheckupOutcome) -> StatusPage {
    let lang = Language::from_code(&outcome.language).unwrap_or_default();

    let rows = outcome
        .checkup
        .reports
        .iter()
        .map(|report| ResourceRow {
            fragment: report.fragment(lang),
            last_change: report
                .last_change
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string()),
            failure: match &report.outcome {
                ResourceOutcome::Failed { reason } => Some(reason.clone()),
                ResourceOutcome::Computed { .. } => None,
            },
        })
        .collect();

    let deliveries = outcome
        .dispatch
        .iter()
        .flat_map(|report| report.deliveries.iter())
        .map(|delivery| DeliveryRow {
            channel: delivery.channel.to_string(),
            recipient: delivery.recipient.clone(),
            result: match &delivery.outcome {
                Ok(()) => "sent".to_string(),
                Err(e) => e.to_string(),
            },
            ok: delivery.is_ok(),
        })
        .collect();

    StatusPage {
        title,
        key_query: key_query(query.key.as_deref().unwrap_or_default()),
        nav: nav_links(),
        checked_at: outcome.checkup.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        message: outcome.message.clone(),
        rows,
        notified: outcome.dispatch.is_some(),
        deliveries,
    }
}
