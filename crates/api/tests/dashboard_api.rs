use std::sync::Arc;

use jobrunner_core::{AllowList, CANCELED_MESSAGE, JobPatch, JobRecord, NewJobRecord, Target};
use jobrunner_infra::SharedJobStore;
use jobrunner_infra::jobs::{
    InMemoryJobStore, InMemoryRunLog, JobEngine, JobRegistry, JobStore, RecordingLauncher,
    TaskLauncher,
};
use jobrunner_api::app::AppServices;
use reqwest::{StatusCode, header};
use serde_json::json;

const ALLOWED: &str = "Allowed.Job";

struct TestServer {
    base_url: String,
    store: SharedJobStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// In-memory store; retries run as in-process tasks.
    async fn spawn() -> Self {
        let store: SharedJobStore = InMemoryJobStore::arc();
        let mut registry = JobRegistry::new();
        registry.register_fn(ALLOWED, "handle", |_| Ok(()));
        let engine = JobEngine::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(AllowList::new([ALLOWED])),
            Arc::new(InMemoryRunLog::new()),
        );
        let launcher = Arc::new(TaskLauncher::new(Arc::new(engine)));
        Self::spawn_with(AppServices::new(store, launcher)).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        let store = services.store().clone();
        // Same router as prod, but bound to an ephemeral port.
        let app = jobrunner_api::app::router(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    async fn seed(&self, priority: i32) -> JobRecord {
        self.store
            .create(NewJobRecord::running(
                Target::new(ALLOWED, "handle"),
                vec![json!("hi")],
                priority,
            ))
            .await
            .unwrap()
    }

    async fn seed_failed(&self, message: Option<&str>) -> JobRecord {
        let record = self.seed(1).await;
        let patch = match message {
            Some(m) => JobPatch::failed_after(3, m),
            None => JobPatch {
                attempts: Some(3),
                ..JobPatch::failed("")
            },
        };
        self.store.update(record.id, patch).await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Load the dashboard and return the CSRF token from its cookie.
async fn csrf_token(client: &reqwest::Client, base_url: &str) -> String {
    let res = client.get(format!("{}/", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .expect("dashboard issues a csrf cookie")
        .to_str()
        .unwrap()
        .to_string();
    let token = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("jobrunner_csrf="))
        .unwrap()
        .to_string();

    let body = res.text().await.unwrap();
    assert!(body.contains("Background Job Dashboard"));
    token
}

async fn post_action(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    token: &str,
) -> reqwest::Response {
    client
        .post(format!("{}{}", base_url, path))
        .header(header::COOKIE, format!("jobrunner_csrf={token}"))
        .form(&[("_token", token)])
        .send()
        .await
        .unwrap()
}

async fn get_job_eventually(
    client: &reqwest::Client,
    base_url: &str,
    id: i64,
    status: &str,
) -> serde_json::Value {
    // Retries run detached; poll briefly until the record settles.
    for _ in 0..100 {
        let body: serde_json::Value = client
            .get(format!("{}/api/jobs/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["status"] == status {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("job {id} did not reach status {status} within timeout");
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = client()
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn actions_require_matching_csrf_token() {
    let srv = TestServer::spawn().await;
    let job = srv.seed(1).await;
    let client = client();

    // No cookie, no field.
    let res = client
        .post(format!("{}/background-jobs/{}/cancel", srv.base_url, job.id))
        .form(&[("other", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "csrf_mismatch");

    // Cookie and field disagree.
    let res = client
        .post(format!("{}/background-jobs/{}/cancel", srv.base_url, job.id))
        .header(header::COOKIE, "jobrunner_csrf=abc")
        .form(&[("_token", "xyz")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let unchanged = srv.store.get(job.id).await.unwrap().unwrap();
    assert_eq!(unchanged, job);
}

#[tokio::test]
async fn cancel_marks_running_job_failed_and_redirects() {
    let srv = TestServer::spawn().await;
    let job = srv.seed(1).await;
    let client = client();
    let token = csrf_token(&client, &srv.base_url).await;

    let path = format!("/background-jobs/{}/cancel", job.id);
    let res = post_action(&client, &srv.base_url, &path, &token).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/?flash=canceled");

    let body = get_job_eventually(&client, &srv.base_url, job.id.get(), "failed").await;
    assert_eq!(body["error_message"], CANCELED_MESSAGE);
    assert_eq!(body["can_retry"], true);

    // Second cancel is rejected; the record stays as it is.
    let res = post_action(&client, &srv.base_url, &path, &token).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/?flash=cancel_rejected");

    let page = client
        .get(format!("{}/?flash=canceled", srv.base_url))
        .header(header::COOKIE, format!("jobrunner_csrf={token}"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Job canceled successfully"));
    assert!(page.contains(&format!("/background-jobs/{}/retry", job.id)));
}

#[tokio::test]
async fn retry_reruns_failed_job_in_place() {
    let srv = TestServer::spawn().await;
    let job = srv.seed_failed(Some(CANCELED_MESSAGE)).await;
    let client = client();
    let token = csrf_token(&client, &srv.base_url).await;

    let res = post_action(
        &client,
        &srv.base_url,
        &format!("/background-jobs/{}/retry", job.id),
        &token,
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/?flash=retried");

    let body = get_job_eventually(&client, &srv.base_url, job.id.get(), "completed").await;
    assert_eq!(body["attempts"], 1);
    assert!(body["error_message"].is_null());

    let list: serde_json::Value = client
        .get(format!("{}/api/jobs", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn retry_of_running_job_is_rejected() {
    let srv = TestServer::spawn().await;
    let job = srv.seed(1).await;
    let client = client();
    let token = csrf_token(&client, &srv.base_url).await;

    let res = post_action(
        &client,
        &srv.base_url,
        &format!("/background-jobs/{}/retry", job.id),
        &token,
    )
    .await;
    assert_eq!(res.headers()[header::LOCATION], "/?flash=retry_rejected");
    assert_eq!(srv.store.get(job.id).await.unwrap().unwrap(), job);
}

#[tokio::test]
async fn failed_retry_launch_is_reported_and_recorded() {
    let store: SharedJobStore = InMemoryJobStore::arc();
    let srv = TestServer::spawn_with(AppServices::new(
        store,
        Arc::new(RecordingLauncher::failing("offline")),
    ))
    .await;
    let job = srv.seed_failed(None).await;
    let client = client();
    let token = csrf_token(&client, &srv.base_url).await;

    let res = post_action(
        &client,
        &srv.base_url,
        &format!("/background-jobs/{}/retry", job.id),
        &token,
    )
    .await;
    assert_eq!(res.headers()[header::LOCATION], "/?flash=retry_launch_failed");

    let record = srv.store.get(job.id).await.unwrap().unwrap();
    assert_eq!(
        record.error_message.as_deref(),
        Some("Retry could not be launched: launcher unavailable: offline")
    );
}

#[tokio::test]
async fn json_list_filters_orders_and_paginates() {
    let srv = TestServer::spawn().await;
    for i in 0..12 {
        srv.seed(if i < 4 { 3 } else { 1 }).await;
    }
    let failed = srv.seed_failed(Some("boom")).await;
    let client = client();

    let first: serde_json::Value = client
        .get(format!("{}/api/jobs", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["total"], 13);
    assert_eq!(first["per_page"], 10);
    assert_eq!(first["last_page"], 2);
    let items = first["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert!(items[..4].iter().all(|j| j["priority"] == 3));

    let second: serde_json::Value = client
        .get(format!("{}/api/jobs?page=2", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["items"].as_array().unwrap().len(), 3);

    let only_failed: serde_json::Value = client
        .get(format!("{}/api/jobs?status=failed&priority=", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(only_failed["total"], 1);
    assert_eq!(only_failed["items"][0]["id"], failed.id.get());
    assert_eq!(only_failed["items"][0]["error_message"], "boom");

    let res = client
        .get(format!("{}/api/jobs?status=queued", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_detail_and_not_found() {
    let srv = TestServer::spawn().await;
    let job = srv.seed(2).await;
    let client = client();

    let body: serde_json::Value = client
        .get(format!("{}/api/jobs/{}", srv.base_url, job.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["class"], ALLOWED);
    assert_eq!(body["method"], "handle");
    assert_eq!(body["params"], json!(["hi"]));
    assert_eq!(body["status"], "running");
    assert_eq!(body["can_cancel"], true);

    let res = client
        .get(format!("{}/api/jobs/999", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/api/jobs/abc", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
