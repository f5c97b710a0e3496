//! End-to-end tests of the web panel against local mock services.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, SecondsFormat, Utc};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tempfile::TempDir;
use tokio::net::TcpListener;

use infusion_reminder::{web, Config, Panel};

const SECRET: &str = "s3cret";

/// Requests seen by the mock services.
#[derive(Debug, Default)]
struct Recorded {
    sms: Vec<HashMap<String, String>>,
    ifttt: Vec<(String, serde_json::Value)>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_mocks(recorded: Shared) -> SocketAddr {
    let now = Utc::now();
    let treatments = serde_json::json!([
        {
            "eventType": "Site Change",
            "created_at": (now - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        {
            "eventType": "Sensor Start",
            "created_at": (now - Duration::days(12)).to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        {
            "eventType": "Meal Bolus",
            "created_at": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    ]);

    let router = Router::new()
        .route(
            "/api/v1/treatments",
            get(move || {
                let treatments = treatments.clone();
                async move { Json(treatments) }
            }),
        )
        .route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(
                |State(recorded): State<Shared>, Form(form): Form<HashMap<String, String>>| async move {
                    recorded.lock().unwrap().sms.push(form);
                    (StatusCode::CREATED, Json(serde_json::json!({"sid": "SM1"})))
                },
            ),
        )
        .route(
            "/trigger/:event/with/key/:key",
            post(
                |State(recorded): State<Shared>,
                 Path((_event, key)): Path<(String, String)>,
                 Json(body): Json<serde_json::Value>| async move {
                    recorded.lock().unwrap().ifttt.push((key, body));
                    "Congratulations!"
                },
            ),
        )
        .with_state(recorded);

    spawn(router).await
}

struct TestPanel {
    base: String,
    client: Client,
    recorded: Shared,
    _dir: TempDir,
}

impl TestPanel {
    async fn start() -> Self {
        let recorded = Shared::default();
        let mocks = spawn_mocks(Arc::clone(&recorded)).await;
        let mock_url = format!("http://{mocks}");

        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.server.secret_key = SECRET.to_string();
        config.storage.database_path = Some(dir.path().join("reminder.db"));
        config.storage.upload_dir = Some(dir.path().join("uploads"));
        config.services.twilio_api_base = mock_url.clone();
        config.services.ifttt_base = mock_url.clone();
        config.services.http_timeout_secs = 5;
        for (name, value) in [
            ("NIGHTSCOUT_LINK", mock_url.as_str()),
            ("INFUSION_SET_ALERT_FREQUENCY", "3"),
            ("SENSOR_ALERT_FREQUENCY", "10"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "token"),
            ("FROM_NUMBER", "+48500000000"),
            ("TO_NUMBER_1", "+48600000001"),
            ("IFTTT_MAKER_1", "maker_key_1"),
            ("SEND_SMS", "true"),
            ("TRIGGER_IFTTT", "true"),
        ] {
            config.variables.insert(name.to_string(), value.to_string());
        }
        config.validate().unwrap();

        let panel = Panel::open(config).unwrap();
        let addr = spawn(web::router(Arc::new(panel))).await;

        Self {
            base: format!("http://{addr}"),
            client: Client::builder().redirect(Policy::none()).build().unwrap(),
            recorded,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        format!("{}{path}{sep}key={SECRET}", self.base)
    }

    async fn get_text(&self, path: &str) -> String {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.text().await.unwrap()
    }

    async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> String {
        let response = self
            .client
            .post(self.url(path))
            .form(fields)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "POST {path}");
        response.text().await.unwrap()
    }
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_protected_pages_redirect_to_login() {
    let panel = TestPanel::start().await;

    for path in ["/menu/", "/checkup/", "/phonenumbers/", "/upload/"] {
        let response = panel
            .client
            .get(format!("{}{path}", panel.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/");
    }

    let response = panel
        .client
        .get(format!("{}/menu/?key=wrong", panel.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login() {
    let panel = TestPanel::start().await;

    let response = panel
        .client
        .post(format!("{}/", panel.base))
        .form(&[("apisecret", SECRET)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/menu/?key={SECRET}"));

    let response = panel
        .client
        .post(format!("{}/", panel.base))
        .form(&[("apisecret", "nope")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Wrong secret key."));
}

#[tokio::test]
async fn test_checkup_sends_nothing() {
    let panel = TestPanel::start().await;

    let html = panel.get_text("/checkup/").await;
    assert!(html.contains("Infusion set: change in 1 d 23 h"), "{html}");
    assert!(html.contains("CGM sensor: change overdue by 2 d"), "{html}");

    let recorded = panel.recorded.lock().unwrap();
    assert!(recorded.sms.is_empty());
    assert!(recorded.ifttt.is_empty());
}

#[tokio::test]
async fn test_remind_notifies_every_recipient() {
    let panel = TestPanel::start().await;

    let html = panel.get_text("/remind/").await;
    assert!(html.contains("+48600000001"));

    let recorded = panel.recorded.lock().unwrap();
    assert_eq!(recorded.sms.len(), 1);
    let sms = &recorded.sms[0];
    assert_eq!(sms["From"], "+48500000000");
    assert_eq!(sms["To"], "+48600000001");
    assert!(sms["Body"].starts_with("Infusion set: change in 1 d"));
    assert!(sms["Body"].contains("\n\nCGM sensor: change overdue by 2 d"));

    assert_eq!(recorded.ifttt.len(), 1);
    let (key, body) = &recorded.ifttt[0];
    assert_eq!(key, "maker_key_1");
    assert_eq!(body["value1"].as_str().unwrap(), sms["Body"]);
}

#[tokio::test]
async fn test_phone_numbers_add_and_delete() {
    let panel = TestPanel::start().await;

    let html = panel
        .post_form(
            "/phonenumbers/",
            &[("TO_NUMBER_new", "+48 600 000 002"), ("TO_NUMBER_new_button", "1")],
        )
        .await;
    assert!(html.contains("ADDED: DESTINATION NUMBER 2"), "{html}");
    assert!(html.contains("value=\"+48600000002\""));

    let html = panel
        .post_form(
            "/phonenumbers/",
            &[("TO_NUMBER_new", "not a number"), ("TO_NUMBER_new_button", "1")],
        )
        .await;
    assert!(html.contains("NOT SAVED"));
    assert!(html.contains("value=\"not a number\""));

    let response = panel
        .client
        .get(panel.url("/phonenumbers/delete/1/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert_eq!(target, format!("/phonenumbers/?key={SECRET}&delinfo=1&delid=1"));

    let html = panel
        .client
        .get(format!("{}{target}", panel.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("DELETED: DESTINATION NUMBER (TO_NUMBER_1)"));
    assert!(!html.contains("+48600000001"));
    // The remaining entry keeps its key but is shown as the first one.
    assert!(html.contains("/phonenumbers/delete/2/"));
    assert!(html.contains("DESTINATION NUMBER 2"));
    assert!(!html.contains("DESTINATION NUMBER 3"));

    let response = panel
        .client
        .get(panel.url("/phonenumbers/delete/1/"))
        .send()
        .await
        .unwrap();
    assert!(location(&response).contains("delinfo=0"));
}

#[tokio::test]
async fn test_notifications_toggle() {
    let panel = TestPanel::start().await;

    // An unchecked box is absent from the submission.
    let html = panel
        .post_form("/notifications/", &[("SEND_SMS_button", "1")])
        .await;
    assert!(html.contains("CHANGED"));

    panel.get_text("/remind/").await;
    {
        let recorded = panel.recorded.lock().unwrap();
        assert!(recorded.sms.is_empty());
        assert_eq!(recorded.ifttt.len(), 1);
    }

    panel
        .post_form("/notifications/", &[("SEND_SMS", "on"), ("SEND_SMS_button", "1")])
        .await;
    panel.get_text("/remind/").await;
    assert_eq!(panel.recorded.lock().unwrap().sms.len(), 1);
}

#[tokio::test]
async fn test_submission_without_button_changes_nothing() {
    let panel = TestPanel::start().await;

    let html = panel
        .post_form("/menu/", &[("INFUSION_SET_ALERT_FREQUENCY", "7")])
        .await;
    assert!(!html.contains("CHANGED"));
    assert!(html.contains("value=\"3\""));
}

#[tokio::test]
async fn test_upload_and_serve_verification_file() {
    let panel = TestPanel::start().await;

    let response = panel
        .client
        .get(format!("{}/{}", panel.base, web::VERIFICATION_FILE_NAME))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let part = reqwest::multipart::Part::bytes(b"verify-me".to_vec()).file_name("ATriggerVerify.txt");
    let response = panel
        .client
        .post(panel.url("/upload/"))
        .multipart(reqwest::multipart::Form::new().part("file", part))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/menu/?key={SECRET}&info=1"));

    let response = panel
        .client
        .get(format!("{}/{}", panel.base, web::VERIFICATION_FILE_NAME))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "verify-me");
}
