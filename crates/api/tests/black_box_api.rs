use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use vista_ai::{
    JobInput, ProviderAdapter, ProviderError, ProviderPayload, ProviderRegistry, ProviderRequest,
    SyncProvider,
};
use vista_api::app::services::{Backends, build_services};
use vista_core::{AssetId, JobType, OwnerId, ResourceId};
use vista_infra::CreditPricing;
use vista_infra::external::{InMemoryObjectStorage, ObjectStorage};
use vista_infra::ledger::LedgerConfig;

/// Answers scene analysis synchronously; notes of `"explode"` make it fail.
struct StubVision;

#[async_trait]
impl SyncProvider for StubVision {
    fn name(&self) -> &str {
        "stub-vision"
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderPayload, ProviderError> {
        if let JobInput::SceneAnalysis(input) = &request.input {
            if input.notes.as_deref() == Some("explode") {
                return Err(ProviderError::Failed("model overloaded".into()));
            }
        }
        Ok(ProviderPayload::Structured(json!({"room_type": "kitchen"})))
    }
}

struct TestServer {
    base_url: String,
    storage: Arc<InMemoryObjectStorage>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(ledger: LedgerConfig) -> Self {
        let storage = Arc::new(InMemoryObjectStorage::default());
        let backends = Backends {
            storage: storage.clone(),
            ..Backends::in_memory(ledger)
        };
        let registry = ProviderRegistry::new()
            .with(JobType::SceneAnalysis, ProviderAdapter::sync(StubVision));
        let services = Arc::new(build_services(backends, registry, CreditPricing::default()));

        // Same router as prod, bound to an ephemeral port.
        let app = vista_api::app::build_app(services);
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
            storage,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn source_image(&self) -> AssetId {
        self.storage.upload(vec![0xff, 0xd8, 0xff], "image/jpeg").await.unwrap()
    }

    fn get(&self, owner: OwnerId, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("x-owner-id", owner.to_string())
    }

    fn post(&self, owner: OwnerId, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-owner-id", owner.to_string())
    }

    async fn submit(&self, owner: OwnerId, body: Value) -> reqwest::Response {
        self.post(owner, "/jobs").json(&body).send().await.unwrap()
    }

    /// Poll until the job leaves pending/processing.
    async fn settled(&self, owner: OwnerId, id: &str) -> Value {
        for _ in 0..100 {
            let res = self.get(owner, &format!("/jobs/{id}")).send().await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let job: Value = res.json().await.unwrap();
            if job["status"] == "completed" || job["status"] == "failed" {
                return job;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        panic!("job {id} did not settle within timeout");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn analysis(image: AssetId) -> Value {
    json!({"type": "scene-analysis", "input": {"image_asset_id": image.to_string()}})
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;

    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn owner_header_required_for_job_routes() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;

    let res = srv
        .client
        .get(format!("{}/jobs", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = srv
        .client
        .get(format!("{}/usage", srv.base_url))
        .header("x-owner-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submitted_job_runs_to_completion_and_is_charged() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;
    let owner = OwnerId::new();
    let image = srv.source_image().await;
    let target = ResourceId::new();

    let res = srv
        .submit(
            owner,
            json!({
                "type": "scene-analysis",
                "target_id": target.to_string(),
                "input": {"image_asset_id": image.to_string(), "notes": "open plan"}
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["type"], "scene-analysis");
    assert_eq!(created["provider"], "stub-vision");
    assert_eq!(created["credits_charged"], 1);
    let id = created["id"].as_str().unwrap().to_string();

    let job = srv.settled(owner, &id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["output"]["room_type"], "kitchen");
    assert!(job["error"].is_null());
    assert_eq!(job["target_id"], target.to_string());

    let usage: Value = srv.get(owner, "/usage").send().await.unwrap().json().await.unwrap();
    assert_eq!(usage["used"], 1);
    assert_eq!(usage["limit"], 3);
    assert_eq!(usage["remaining"], 2);
    assert_eq!(usage["unlimited"], false);
}

#[tokio::test]
async fn quota_exhausted_owner_gets_402_and_no_job() {
    let srv = TestServer::spawn(LedgerConfig {
        free_limit: 1,
        ..LedgerConfig::default()
    })
    .await;
    let owner = OwnerId::new();
    let image = srv.source_image().await;

    let res = srv.submit(owner, analysis(image)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    srv.settled(owner, created["id"].as_str().unwrap()).await;

    let res = srv.submit(owner, analysis(image)).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "quota_exceeded");

    let list: Value = srv.get(owner, "/jobs").send().await.unwrap().json().await.unwrap();
    assert_eq!(list["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_and_foreign_jobs_are_not_found() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;
    let owner = OwnerId::new();
    let stranger = OwnerId::new();
    let image = srv.source_image().await;

    let res = srv
        .get(owner, &format!("/jobs/{}", vista_core::JobId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let created: Value = srv.submit(owner, analysis(image)).await.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let res = srv.get(stranger, &format!("/jobs/{id}")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.post(stranger, &format!("/jobs/{id}/retry")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.get(owner, "/jobs/not-a-uuid").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn retry_only_accepts_failed_jobs() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;
    let owner = OwnerId::new();
    let image = srv.source_image().await;

    let ok: Value = srv.submit(owner, analysis(image)).await.json().await.unwrap();
    let ok_id = ok["id"].as_str().unwrap().to_string();
    srv.settled(owner, &ok_id).await;

    let res = srv.post(owner, &format!("/jobs/{ok_id}/retry")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state");

    let bad: Value = srv
        .submit(
            owner,
            json!({
                "type": "scene-analysis",
                "input": {"image_asset_id": image.to_string(), "notes": "explode"}
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let bad_id = bad["id"].as_str().unwrap().to_string();
    let failed = srv.settled(owner, &bad_id).await;
    assert_eq!(failed["status"], "failed");
    assert!(failed["error"].as_str().unwrap().contains("model overloaded"));
    assert!(failed["output"].is_null());

    let res = srv.post(owner, &format!("/jobs/{bad_id}/retry")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let again = srv.settled(owner, &bad_id).await;
    assert_eq!(again["status"], "failed");

    // Only the successful job was charged.
    let usage: Value = srv.get(owner, "/usage").send().await.unwrap().json().await.unwrap();
    assert_eq!(usage["used"], 1);
}

#[tokio::test]
async fn invalid_submissions_are_rejected_before_any_job_exists() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;
    let owner = OwnerId::new();

    let res = srv
        .submit(owner, json!({"type": "scene-analysis", "input": {"notes": "no image"}}))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = srv.submit(owner, json!({"type": "teleport", "input": {}})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Registered types only.
    let res = srv.submit(owner, json!({"type": "description", "input": {}})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .submit(
            owner,
            json!({
                "type": "scene-analysis",
                "sub_target_id": ResourceId::new().to_string(),
                "input": {"image_asset_id": AssetId::new().to_string()}
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let list: Value = srv.get(owner, "/jobs").send().await.unwrap().json().await.unwrap();
    assert!(list["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_and_stats_are_owner_scoped() {
    let srv = TestServer::spawn(LedgerConfig::default()).await;
    let owner = OwnerId::new();
    let other = OwnerId::new();
    let image = srv.source_image().await;
    let target = ResourceId::new();

    let first: Value = srv
        .submit(
            owner,
            json!({
                "type": "scene-analysis",
                "target_id": target.to_string(),
                "input": {"image_asset_id": image.to_string()}
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let second: Value = srv
        .submit(
            owner,
            json!({
                "type": "scene-analysis",
                "input": {"image_asset_id": image.to_string(), "notes": "explode"}
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let foreign: Value = srv.submit(other, analysis(image)).await.json().await.unwrap();

    srv.settled(owner, first["id"].as_str().unwrap()).await;
    srv.settled(owner, second["id"].as_str().unwrap()).await;
    srv.settled(other, foreign["id"].as_str().unwrap()).await;

    let all: Value = srv.get(owner, "/jobs").send().await.unwrap().json().await.unwrap();
    let ids: Vec<&str> = all["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&foreign["id"].as_str().unwrap()));

    let failed: Value = srv
        .get(owner, "/jobs?status=failed")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(failed["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(failed["jobs"][0]["id"], second["id"]);

    let by_target: Value = srv
        .get(owner, &format!("/jobs?target_id={target}&limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_target["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(by_target["jobs"][0]["id"], first["id"]);

    let res = srv.get(owner, "/jobs?status=sleeping").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let stats: Value = srv.get(owner, "/jobs/stats").send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["failed"], 1);
    assert_eq!(stats["pending"], 0);
    assert_eq!(stats["total"], 2);
}
