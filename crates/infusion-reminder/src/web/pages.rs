//! Page templates.

use askama::Template;

use crate::forms::{FieldForm, PageKind};
use crate::i18n::Language;

/// Link in the navigation bar.
#[derive(Debug, Clone)]
pub(crate) struct NavLink {
    pub title: &'static str,
    pub path: &'static str,
}

/// Links shown on every authenticated page.
pub(crate) fn nav_links() -> Vec<NavLink> {
    let mut links: Vec<NavLink> = [
        PageKind::Menu,
        PageKind::PhoneNumbers,
        PageKind::IftttMakers,
        PageKind::Notifications,
    ]
    .into_iter()
    .map(|kind| NavLink {
        title: kind.title(),
        path: kind.path(),
    })
    .collect();
    links.push(NavLink {
        title: "Upload",
        path: "/upload/",
    });
    links.push(NavLink {
        title: "Checkup",
        path: "/checkup/",
    });
    links.push(NavLink {
        title: "Remind",
        path: "/remind/",
    });
    links
}

#[derive(Template)]
#[template(path = "login.html")]
pub(crate) struct LoginPage {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "forms.html")]
pub(crate) struct FormsPage<'a> {
    pub title: &'static str,
    pub path: &'static str,
    pub key_query: String,
    pub nav: Vec<NavLink>,
    pub lang: Language,
    pub notice: Option<String>,
    pub notice_failed: bool,
    pub forms: &'a [FieldForm],
    pub delete_base: Option<String>,
}

/// One resource row of the status page.
#[derive(Debug, Clone)]
pub(crate) struct ResourceRow {
    pub fragment: String,
    pub last_change: String,
    pub failure: Option<String>,
}

/// One delivery row of the status page.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryRow {
    pub channel: String,
    pub recipient: String,
    pub result: String,
    pub ok: bool,
}

#[derive(Template)]
#[template(path = "status.html")]
pub(crate) struct StatusPage {
    pub title: &'static str,
    pub key_query: String,
    pub nav: Vec<NavLink>,
    pub checked_at: String,
    pub message: String,
    pub rows: Vec<ResourceRow>,
    pub notified: bool,
    pub deliveries: Vec<DeliveryRow>,
}

#[derive(Template)]
#[template(path = "upload.html")]
pub(crate) struct UploadPage {
    pub key_query: String,
    pub nav: Vec<NavLink>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub(crate) struct ErrorPage {
    pub status: u16,
    pub message: String,
}
