//! Admin form pages and list entry deletion.

use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::Form;
use tracing::info;

use crate::error::Result;
use crate::forms::{self, list_label, FormPage, Notice, PageKind, Submission};
use crate::i18n::Language;
use crate::variables::NumberedList;

use super::pages::{nav_links, FormsPage};
use super::{key_query, render, AppState, PageQuery};

pub(crate) async fn menu_page(
    state: State<AppState>,
    query: Query<PageQuery>,
) -> Result<Html<String>> {
    show(PageKind::Menu, state, query).await
}

pub(crate) async fn menu_submit(
    state: State<AppState>,
    query: Query<PageQuery>,
    form: Form<Submission>,
) -> Result<Html<String>> {
    submit(PageKind::Menu, state, query, form).await
}

pub(crate) async fn phone_numbers_page(
    state: State<AppState>,
    query: Query<PageQuery>,
) -> Result<Html<String>> {
    show(PageKind::PhoneNumbers, state, query).await
}

pub(crate) async fn phone_numbers_submit(
    state: State<AppState>,
    query: Query<PageQuery>,
    form: Form<Submission>,
) -> Result<Html<String>> {
    submit(PageKind::PhoneNumbers, state, query, form).await
}

pub(crate) async fn ifttt_makers_page(
    state: State<AppState>,
    query: Query<PageQuery>,
) -> Result<Html<String>> {
    show(PageKind::IftttMakers, state, query).await
}

pub(crate) async fn ifttt_makers_submit(
    state: State<AppState>,
    query: Query<PageQuery>,
    form: Form<Submission>,
) -> Result<Html<String>> {
    submit(PageKind::IftttMakers, state, query, form).await
}

pub(crate) async fn notifications_page(
    state: State<AppState>,
    query: Query<PageQuery>,
) -> Result<Html<String>> {
    show(PageKind::Notifications, state, query).await
}

pub(crate) async fn notifications_submit(
    state: State<AppState>,
    query: Query<PageQuery>,
    form: Form<Submission>,
) -> Result<Html<String>> {
    submit(PageKind::Notifications, state, query, form).await
}

pub(crate) async fn delete_phone_number(
    state: State<AppState>,
    id: Path<u32>,
    query: Query<PageQuery>,
) -> Result<Redirect> {
    delete(PageKind::PhoneNumbers, NumberedList::DestinationNumbers, state, id, query).await
}

pub(crate) async fn delete_ifttt_maker(
    state: State<AppState>,
    id: Path<u32>,
    query: Query<PageQuery>,
) -> Result<Redirect> {
    delete(PageKind::IftttMakers, NumberedList::IftttMakers, state, id, query).await
}

async fn show(
    kind: PageKind,
    State(panel): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let (page, lang) = {
        let storage = panel.storage().lock().await;
        let lang = storage.settings()?.language();
        (FormPage::load(kind, &storage, lang)?, lang)
    };
    let notice = query_notice(kind, &query, lang);
    render(&forms_page(&page, &query, lang, notice.as_ref()))
}

async fn submit(
    kind: PageKind,
    State(panel): State<AppState>,
    Query(query): Query<PageQuery>,
    Form(submission): Form<Submission>,
) -> Result<Html<String>> {
    let (page, lang, notice) = {
        let storage = panel.storage().lock().await;
        let lang = storage.settings()?.language();
        let mut page = FormPage::load(kind, &storage, lang)?;
        let notice = page.process(&storage, &submission, lang)?;

        // A language change relabels the page.
        let new_lang = storage.settings()?.language();
        if new_lang != lang && !notice.as_ref().is_some_and(Notice::is_failure) {
            page = FormPage::load(kind, &storage, new_lang)?;
        }
        (page, new_lang, notice)
    };
    render(&forms_page(&page, &query, lang, notice.as_ref()))
}

async fn delete(
    kind: PageKind,
    list: NumberedList,
    State(panel): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<PageQuery>,
) -> Result<Redirect> {
    let removed = {
        let storage = panel.storage().lock().await;
        forms::delete_entry(&storage, list, id)?
    };
    if !removed {
        info!("Delete of missing {} ignored", list.key(id));
    }
    Ok(Redirect::to(&format!(
        "{}?{}&delinfo={}&delid={id}",
        kind.path(),
        key_query(query.key.as_deref().unwrap_or_default()),
        u8::from(removed),
    )))
}

/// Notice carried in the query string by redirects.
fn query_notice(kind: PageKind, query: &PageQuery, lang: Language) -> Option<Notice> {
    if let (Some(list), Some(delinfo)) = (kind.list(), query.delinfo) {
        let subject = match query.delid {
            Some(id) => format!("{} ({})", list_label(list, lang), list.key(id)),
            None => list_label(list, lang).to_string(),
        };
        return Some(if delinfo == 1 {
            Notice::Deleted(subject)
        } else {
            Notice::Failed(subject)
        });
    }
    if kind == PageKind::Menu && query.info == Some(1) {
        return Some(Notice::Uploaded);
    }
    None
}

fn forms_page<'a>(
    page: &'a FormPage,
    query: &PageQuery,
    lang: Language,
    notice: Option<&Notice>,
) -> FormsPage<'a> {
    FormsPage {
        title: page.kind.title(),
        path: page.kind.path(),
        key_query: key_query(query.key.as_deref().unwrap_or_default()),
        nav: nav_links(),
        lang,
        notice: notice.map(|n| n.text(lang)),
        notice_failed: notice.is_some_and(Notice::is_failure),
        forms: &page.forms,
        delete_base: page.kind.list().map(|_| format!("{}delete/", page.kind.path())),
    }
}
