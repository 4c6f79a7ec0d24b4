//! End-to-end daemon lifecycle tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use hostd::lifecycle::{DaemonState, OperatingMode, StateStore};
use hostd::net::ListenerKind;

mod common;

use common::TestDaemon;

#[tokio::test]
async fn bootstrap_init_then_normal() {
    let daemon = TestDaemon::start(false);
    let status = daemon
        .handle
        .wait_for_state(DaemonState::BootstrapServing)
        .await
        .unwrap();
    assert_eq!(status.mode, Some(OperatingMode::Bootstrap));

    let client = common::client();
    let bootstrap = daemon.url(ListenerKind::Plain);
    let creds = json!({"username": "admin", "password": "hunter2"});

    let res = client
        .post(format!("{bootstrap}/api/v1/auth/register"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let res = client
        .post(format!("{bootstrap}/api/v1/auth/login"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let token = res.json::<Value>().await.unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .get(format!("{bootstrap}/api/v1/e/info"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["mode"], "bootstrap");

    let res = client
        .post(format!("{bootstrap}/api/v1/e/init"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);

    let status = tokio::time::timeout(
        Duration::from_secs(10),
        daemon.handle.wait_for_state(DaemonState::NormalServing),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(status.mode, Some(OperatingMode::Normal));
    assert!(daemon.state.exists());

    let plain = daemon.url(ListenerKind::Plain);
    let secure = daemon.url(ListenerKind::Secure);

    let res = client
        .post(format!("{plain}/api/v1/auth/register"))
        .json(&json!({"username": "mallory", "password": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .post(format!("{secure}/api/v1/auth/login"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("{secure}/api/v1/e/info"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["mode"], "normal");

    let summary = daemon.stop().await;
    assert_eq!(summary.mode, OperatingMode::Normal);
}

#[tokio::test]
async fn internal_request_without_token_is_rejected() {
    let daemon = TestDaemon::start(true);
    daemon
        .handle
        .wait_for_state(DaemonState::NormalServing)
        .await
        .unwrap();

    let client = common::client();
    let url = format!("{}/api/v1/i/internal/resource", daemon.url(ListenerKind::Plain));
    let body = json!({"type": "dns", "value": {"host": "www"}});

    let res = client.post(&url).json(&body).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert!(res.json::<Value>().await.unwrap()["error"].is_string());
    assert!(daemon.resources.all_resources().is_empty());

    let token = daemon.identities.register_application("blog");
    let res = client
        .post(&url)
        .header("X-Internal-Token", &token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(daemon.resources.all_resources().len(), 1);

    daemon.stop().await;
}

#[tokio::test]
async fn static_assets_and_redirect() {
    let daemon = TestDaemon::start(true);
    daemon
        .handle
        .wait_for_state(DaemonState::NormalServing)
        .await
        .unwrap();

    let secure = daemon.url(ListenerKind::Secure);
    let client = common::client();

    let res = client
        .get(format!("{secure}/static/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .get(format!("{secure}/static/app.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let no_redirect = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();
    let res = no_redirect.get(format!("{secure}/")).send().await.unwrap();
    assert_eq!(res.status(), 303);
    assert_eq!(res.headers()["location"], "/ui/");

    daemon.stop().await;
}

#[tokio::test]
async fn drain_stops_every_subsystem() {
    let daemon = TestDaemon::start(true);
    daemon
        .handle
        .wait_for_state(DaemonState::NormalServing)
        .await
        .unwrap();
    let handle = daemon.handle.clone();

    let summary = daemon.stop().await;
    let mut completed = summary.drain.completed.clone();
    completed.sort();
    assert_eq!(completed, vec!["webserver".to_string(), "wsmanager".to_string()]);
    assert!(summary.drain.timed_out.is_empty());
    assert_eq!(handle.status().state, DaemonState::Stopped);
}

#[tokio::test]
async fn accounts_survive_restart() {
    let work_dir = tempfile::tempdir().unwrap();
    let config = common::test_config(work_dir.path());
    let client = common::client();
    let creds = json!({"username": "admin", "password": "hunter2"});

    let mut collaborators = hostd::Collaborators::standard(&config);
    collaborators.certificates = Arc::new(common::test_certificate());
    let (handle, run) = common::spawn_daemon(config.clone(), collaborators);
    handle
        .wait_for_state(DaemonState::BootstrapServing)
        .await
        .unwrap();

    let bootstrap = common::listener_url(&handle, ListenerKind::Plain);
    let res = client
        .post(format!("{bootstrap}/api/v1/auth/register"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let token = res.json::<Value>().await.unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();
    let res = client
        .post(format!("{bootstrap}/api/v1/e/init"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    tokio::time::timeout(
        Duration::from_secs(10),
        handle.wait_for_state(DaemonState::NormalServing),
    )
    .await
    .unwrap()
    .unwrap();
    handle.request_shutdown();
    run.await.unwrap().unwrap();

    let mut collaborators = hostd::Collaborators::standard(&config);
    collaborators.certificates = Arc::new(common::test_certificate());
    let (handle, run) = common::spawn_daemon(config, collaborators);
    let status = tokio::time::timeout(
        Duration::from_secs(10),
        handle.wait_for_state(DaemonState::NormalServing),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(status.mode, Some(OperatingMode::Normal));

    let secure = common::listener_url(&handle, ListenerKind::Secure);
    let res = client
        .post(format!("{secure}/api/v1/auth/login"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .post(format!("{secure}/api/v1/auth/login"))
        .json(&json!({"username": "admin", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    handle.request_shutdown();
    run.await.unwrap().unwrap();
}
