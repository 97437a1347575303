// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use startup_scorer::api::{create_router, AppState};
use startup_scorer::bootstrap::AppRuntime;
use startup_scorer::config::ScoringConfig;
use startup_scorer::oracle::{DynTransport, MockTransport, OracleClient};
use startup_scorer::record::StartupRecord;
use startup_scorer::store::{DynStore, MemoryStore};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn seeded_store() -> DynStore {
    let rec = |name: &str, industry: &str, location: &str, funding: i64, stage: &str| {
        StartupRecord {
            name: Some(name.into()),
            industry: vec![industry.into()],
            location: Some(location.into()),
            score: Some(50.0),
            funding: Some(funding),
            stage: Some(stage.into()),
            ..Default::default()
        }
    };
    Arc::new(MemoryStore::with_records(vec![
        rec("Acme", "space", "Los Angeles", 3_000_000, "seed"),
        rec("Beta", "fintech", "Austin", 500_000, "pre-seed"),
        rec("Gamma", "space", "Austin", 12_000_000, "series-a"),
    ]))
}

fn test_router(store: DynStore) -> Router {
    let transport: DynTransport = Arc::new(MockTransport::new().with_response(
        "startup_evaluation",
        r#"{"score":140,"funding":1000,"stage":"seed"}"#,
    ));
    let runtime = AppRuntime::with_parts(
        ScoringConfig::default(),
        store,
        Arc::new(OracleClient::new(transport)),
    );
    create_router(AppState::new(runtime))
}

async fn body_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(seeded_store());
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn api_startups_lists_everything() {
    let app = test_router(seeded_store());
    let req = Request::get("/api/startups").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 3);
    assert!(arr.iter().all(|r| r["_id"].is_string()), "ids serialized as _id");
}

#[tokio::test]
async fn api_companies_applies_filter() {
    let app = test_router(seeded_store());
    let payload = json!({ "industry": ["space"], "funding": 5_000_000 });
    let req = Request::builder()
        .method("POST")
        .uri("/api/companies")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    let names: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["Name"].as_str())
        .collect();
    assert_eq!(names, vec!["Gamma"]);
}

#[tokio::test]
async fn api_evaluate_runs_one_batch() {
    let store = seeded_store();
    let app = test_router(store.clone());
    let req = Request::post("/api/evaluate").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["total"], 3);
    assert_eq!(v["evaluated"], 3);
    assert_eq!(v["failed"], 0);
    // every raw score clamps to 100 → zero variance under percentile still ranks them
    assert_eq!(v["normalization"]["outcome"], "applied");

    let all = store.find_all().await.unwrap();
    assert!(all.iter().all(|r| r.funding == Some(1000)));
}
