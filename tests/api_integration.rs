//! End-to-end tests for the HTTP API.
//!
//! Each test starts the full router on a random port backed by an in-memory
//! database and drives it with reqwest, the way a browser client would.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::time::timeout;

use minna_hiraizumi::store::LibSqlBackend;
use minna_hiraizumi::suggestions::Classifier;
use minna_hiraizumi::{AppConfig, AppState, build_router};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a server on a random port and return its base URL.
async fn start_server() -> String {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let state = AppState::new(db, AppConfig::default(), Classifier::default_rules());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// Register a user and return their bearer token.
async fn register(client: &Client, base: &str, email: &str, role: &str) -> String {
    let resp = client
        .post(format!("{base}/api/register"))
        .json(&json!({
            "name": "平泉 太郎",
            "email": email,
            "password": "password123",
            "password_confirmation": "password123",
            "role": role,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn company_with_profile(client: &Client, base: &str, email: &str) -> String {
    let token = register(client, base, email, "company").await;
    let resp = client
        .put(format!("{base}/api/profile"))
        .bearer_auth(&token)
        .json(&json!({
            "company_name": "平泉農園",
            "representative_name": "平泉 花子",
            "location_id": 1,
            "address": "岩手県西磐井郡平泉町平泉",
            "phone": "0191-46-2111",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    token
}

async fn worker_with_profile(client: &Client, base: &str, email: &str) -> String {
    let token = register(client, base, email, "worker").await;
    let resp = client
        .put(format!("{base}/api/profile"))
        .bearer_auth(&token)
        .json(&json!({"nickname": "たろう", "location_id": 1, "birth_year": 1995}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    token
}

async fn create_job(client: &Client, base: &str, token: &str, title: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/jobs"))
        .bearer_auth(token)
        .json(&json!({
            "title": title,
            "detail": "田んぼの草取りをお願いします。お昼はお弁当を用意します！",
            "purpose": "need_help",
            "location": "平泉町",
            "want_you_ids": [1, 4],
            "can_do_ids": [103],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn apply(client: &Client, base: &str, token: &str, job_id: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/jobs/{job_id}/applications"))
        .bearer_auth(token)
        .json(&json!({"reasons": ["近所に住んでいる"], "motive": "農業に興味があります"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "minna-hiraizumi");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_register_login_and_onboarding() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = Client::new();
        let token = register(&client, &base, "taro@example.jp", "worker").await;

        let me: Value = client
            .get(format!("{base}/api/me"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["user"]["email"], "taro@example.jp");
        assert_eq!(me["user"]["role"], "worker");
        assert_eq!(me["needs_onboarding"], true);
        assert!(me["user"].get("password_hash").is_none());

        let resp = client
            .put(format!("{base}/api/profile"))
            .bearer_auth(&token)
            .json(&json!({"nickname": "たろう", "location_id": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = client
            .post(format!("{base}/api/login"))
            .json(&json!({"email": "taro@example.jp", "password": "password123"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let login: Value = resp.json().await.unwrap();
        let second = login["token"].as_str().unwrap().to_string();
        assert_ne!(second, token);

        let me: Value = client
            .get(format!("{base}/api/me"))
            .bearer_auth(&second)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["needs_onboarding"], false);

        let resp = client
            .post(format!("{base}/api/logout"))
            .bearer_auth(&second)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = client
            .get(format!("{base}/api/me"))
            .bearer_auth(&second)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_auth_and_validation_errors() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = Client::new();

        let resp = client.get(format!("{base}/api/me")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = client
            .post(format!("{base}/api/login"))
            .json(&json!({"email": "nobody@example.jp", "password": "password123"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = client
            .post(format!("{base}/api/register"))
            .json(&json!({
                "name": "",
                "email": "not-an-email",
                "password": "short",
                "password_confirmation": "other",
                "role": "admin",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json().await.unwrap();
        for field in ["name", "email", "password", "role"] {
            assert!(body["errors"].get(field).is_some(), "missing error for {field}");
        }

        register(&client, &base, "dup@example.jp", "worker").await;
        let resp = client
            .post(format!("{base}/api/register"))
            .json(&json!({
                "name": "二人目",
                "email": "dup@example.jp",
                "password": "password123",
                "password_confirmation": "password123",
                "role": "company",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json().await.unwrap();
        assert!(body["errors"].get("email").is_some());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_reference_data() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let codes: Vec<Value> = reqwest::get(format!("{base}/api/codes?type=can_do"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!codes.is_empty());
        assert!(codes.iter().all(|c| c["type"] == "can_do"));

        let locations: Vec<Value> = reqwest::get(format!("{base}/api/locations?prefecture=岩手県"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(locations.iter().any(|l| l["city"] == "平泉町"));

        let resp = reqwest::get(format!("{base}/api/locations/999999")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_job_posting_and_listing() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = Client::new();

        let no_profile = register(&client, &base, "new@example.jp", "company").await;
        let resp = client
            .post(format!("{base}/api/jobs"))
            .bearer_auth(&no_profile)
            .json(&json!({"title": "x", "detail": "x", "purpose": "need_help"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let company = company_with_profile(&client, &base, "farm@example.jp").await;
        let job = create_job(&client, &base, &company, "稲刈りのお手伝い").await;
        assert_eq!(job["company_name"], "平泉農園");
        assert_eq!(job["want_you"].as_array().unwrap().len(), 2);
        create_job(&client, &base, &company, "草取り").await;

        let page: Value = reqwest::get(format!("{base}/api/jobs?keyword=稲刈り"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["id"], job["id"]);

        let page: Value = reqwest::get(format!("{base}/api/jobs?can_do=103&per_page=1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(page["total"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);

        let resp = reqwest::get(format!("{base}/api/jobs?page=4294967295&per_page=100"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let page: Value = resp.json().await.unwrap();
        assert_eq!(page["total"], 2);
        assert!(page["items"].as_array().unwrap().is_empty());

        let other = company_with_profile(&client, &base, "other@example.jp").await;
        let job_id = job["id"].as_str().unwrap();
        let resp = client
            .delete(format!("{base}/api/jobs/{job_id}"))
            .bearer_auth(&other)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = client
            .delete(format!("{base}/api/jobs/{job_id}"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = reqwest::get(format!("{base}/api/jobs/{job_id}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_apply_chat_and_decide() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = Client::new();
        let company = company_with_profile(&client, &base, "farm@example.jp").await;
        let worker = worker_with_profile(&client, &base, "taro@example.jp").await;
        let stranger = worker_with_profile(&client, &base, "jiro@example.jp").await;

        let job = create_job(&client, &base, &company, "稲刈りのお手伝い").await;
        let job_id = job["id"].as_str().unwrap();

        let application = apply(&client, &base, &worker, job_id).await;
        assert_eq!(application["status"], "applied");
        let application_id = application["id"].as_str().unwrap().to_string();
        let room_id = application["chat_room_id"].as_str().unwrap().to_string();

        let resp = client
            .post(format!("{base}/api/jobs/{job_id}/applications"))
            .bearer_auth(&worker)
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let unread: Value = client
            .get(format!("{base}/api/chat/unread-count"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(unread["unread_count"], 1);

        let page: Value = client
            .get(format!("{base}/api/chat/rooms/{room_id}/messages"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let messages = page["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0]["body"].as_str().unwrap().contains("近所に住んでいる"));
        assert_eq!(page["can_send"], true);

        let resp = client
            .post(format!("{base}/api/chat/rooms/{room_id}/messages"))
            .bearer_auth(&company)
            .json(&json!({"body": "ありがとうございます"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = client
            .get(format!("{base}/api/chat/rooms/{room_id}/messages"))
            .bearer_auth(&stranger)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = client
            .get(format!("{base}/api/applications/{application_id}"))
            .bearer_auth(&stranger)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = client
            .post(format!("{base}/api/applications/{application_id}/accept"))
            .bearer_auth(&worker)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = client
            .post(format!("{base}/api/applications/{application_id}/accept"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let decided: Value = resp.json().await.unwrap();
        assert_eq!(decided["status"], "accepted");

        let resp = client
            .post(format!("{base}/api/applications/{application_id}/reject"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = client
            .post(format!("{base}/api/chat/rooms/{room_id}/messages"))
            .bearer_auth(&worker)
            .json(&json!({"body": "よろしくお願いします"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let listed: Vec<Value> = client
            .get(format!("{base}/api/applications?status=accepted"))
            .bearer_auth(&company)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["worker_name"], "たろう");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_suggestions_follow_job_posts() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = Client::new();
        let company = company_with_profile(&client, &base, "farm@example.jp").await;
        let job = create_job(&client, &base, &company, "草取り").await;
        let job_id = job["id"].as_str().unwrap();

        let categories: Vec<String> = reqwest::get(format!("{base}/api/suggestions/categories"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(categories.iter().any(|c| c == "農業"));

        let mined: Vec<Value> = reqwest::get(format!("{base}/api/jobs/{job_id}/suggestions"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(mined.len(), 2);

        let hits: Vec<Value> = reqwest::get(format!("{base}/api/suggestions?q=草取り"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["category"], "農業");
        assert_eq!(hits[0]["count"], 1);
    })
    .await
    .expect("test timed out");
}
