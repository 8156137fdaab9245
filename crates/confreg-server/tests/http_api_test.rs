//! HTTP API integration tests
//!
//! Runs the full route table in-process over the in-memory store.

use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};

use confreg_common::error::{
    PARAMETER_VALIDATE_ERROR, RESOURCE_ALREADY_EXISTS, RESOURCE_CONFLICT, RESOURCE_NOT_FOUND,
};
use confreg_config::ConfigRegistry;
use confreg_persistence::MemoryKvStore;
use confreg_server::{
    api::route,
    middleware::{
        rate_limit::{AdmissionController, RateLimitConfig},
        request_metrics::RequestMetrics,
    },
    model::AppState,
};

fn unlimited() -> Arc<AdmissionController> {
    Arc::new(AdmissionController::new(RateLimitConfig {
        enabled: false,
        ..Default::default()
    }))
}

macro_rules! test_app {
    () => {{
        let state = AppState::new(ConfigRegistry::new(Arc::new(MemoryKvStore::new())), None);
        let controller = unlimited();
        test::init_service(
            App::new()
                .wrap(RequestMetrics)
                .app_data(web::Data::new(state))
                .configure(move |cfg| route::configure(cfg, controller)),
        )
        .await
    }};
}

fn labeled(name: &str, version: u32, labels: Value) -> Value {
    json!({
        "name": name,
        "version": version,
        "parameters": { "host": format!("{}.internal", name) },
        "labels": labels,
    })
}

// ============================================================================
// Configurations
// ============================================================================

#[actix_web::test]
async fn test_create_and_get_plain_configuration() {
    let app = test_app!();
    let body = json!({"name": "db", "version": 1, "parameters": {"host": "a", "port": "5432"}});

    let req = test::TestRequest::post()
        .uri("/configs")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/configs/db/1").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["code"], 0);
    assert_eq!(resp["data"], body);
}

#[actix_web::test]
async fn test_create_twice_is_already_exists() {
    let app = test_app!();
    let body = json!({"name": "db", "version": 1, "parameters": {}});

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let req = test::TestRequest::post()
            .uri("/configs")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);

        if expected == StatusCode::CONFLICT {
            let resp: Value = test::read_body_json(resp).await;
            assert_eq!(resp["code"], RESOURCE_ALREADY_EXISTS.code);
        }
    }
}

#[actix_web::test]
async fn test_tokenized_duplicate_is_conflict() {
    let app = test_app!();
    let body = labeled("db", 1, json!({"env": "prod"}));

    let req = test::TestRequest::post()
        .uri("/configs2")
        .insert_header(("Idempotency-Key", "req-42"))
        .set_json(&body)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );

    let req = test::TestRequest::post()
        .uri("/configs2")
        .insert_header(("Idempotency-Key", "req-42"))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp: Value = test::read_body_json(resp).await;
    assert_eq!(resp["code"], RESOURCE_CONFLICT.code);

    let req = test::TestRequest::get().uri("/configs2/db/1").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"], body);
}

#[actix_web::test]
async fn test_get_missing_is_not_found() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/configs2/db/9").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp: Value = test::read_body_json(resp).await;
    assert_eq!(resp["code"], RESOURCE_NOT_FOUND.code);
}

#[actix_web::test]
async fn test_non_numeric_version_is_bad_request() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/configs/db/latest").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/configs")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"name\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp: Value = test::read_body_json(resp).await;
    assert_eq!(resp["code"], PARAMETER_VALIDATE_ERROR.code);
}

#[actix_web::test]
async fn test_invalid_name_is_bad_request() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/configs")
        .set_json(json!({"name": "db one", "version": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_update_then_delete() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/configs")
        .set_json(json!({"name": "db", "version": 1, "parameters": {"host": "a"}}))
        .to_request();
    test::call_service(&app, req).await;

    let updated = json!({"name": "db", "version": 1, "parameters": {"host": "b"}});
    let req = test::TestRequest::put()
        .uri("/configs/db/1")
        .set_json(&updated)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/configs/db/1").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"], updated);

    let req = test::TestRequest::delete().uri("/configs/db/1").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    let req = test::TestRequest::delete().uri("/configs/db/1").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_update_path_mismatch_is_bad_request() {
    let app = test_app!();

    let req = test::TestRequest::put()
        .uri("/configs2/db/1")
        .set_json(labeled("db", 2, json!({})))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn test_get_all_lists_created() {
    let app = test_app!();

    for version in 1..=3 {
        let req = test::TestRequest::post()
            .uri("/configs2")
            .set_json(labeled("db", version, json!({"env": "prod"})))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get().uri("/configs2").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"].as_array().map(Vec::len), Some(3));
}

// ============================================================================
// Groups
// ============================================================================

/// Group `edge/1` with members a (env=prod), b (env=prod, tier=db), c (env=dev)
fn create_edge_group() -> test::TestRequest {
    test::TestRequest::post().uri("/configGroups").set_json(json!({
        "name": "edge",
        "version": 1,
        "configuration": [
            labeled("a", 1, json!({"env": "prod"})),
            labeled("b", 1, json!({"env": "prod", "tier": "db"})),
            labeled("c", 1, json!({"env": "dev"})),
        ],
    }))
}

#[actix_web::test]
async fn test_group_filter_is_exact_match() {
    let app = test_app!();
    let resp = test::call_service(&app, create_edge_group().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/configGroups/edge/1/configs2/env=prod")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = resp["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a"]);

    let req = test::TestRequest::get()
        .uri("/configGroups/edge/1/configs2/tier=db,env=prod")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"][0]["name"], "b");
}

#[actix_web::test]
async fn test_group_malformed_filter_is_bad_request() {
    let app = test_app!();
    let resp = test::call_service(&app, create_edge_group().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/configGroups/edge/1/configs2/env")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn test_group_membership_edits() {
    let app = test_app!();
    let resp = test::call_service(&app, create_edge_group().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Duplicate member
    let req = test::TestRequest::put()
        .uri("/configGroups/edge/1")
        .set_json(labeled("a", 1, json!({})))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );

    let req = test::TestRequest::put()
        .uri("/configGroups/edge/1")
        .set_json(labeled("d", 1, json!({"env": "prod"})))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri("/configGroups/edge/1/env=prod")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["removed"], 2);

    let req = test::TestRequest::delete()
        .uri("/configGroups/edge/1/c/1")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["name"], "c");

    let req = test::TestRequest::delete()
        .uri("/configGroups/edge/1/c/1")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = test::TestRequest::get().uri("/configGroups/edge/1").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    let members = resp["data"]["configuration"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "b");
}

#[actix_web::test]
async fn test_remove_by_labels_without_match_is_noop() {
    let app = test_app!();
    let resp = test::call_service(&app, create_edge_group().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::delete()
        .uri("/configGroups/edge/1/env=staging")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["removed"], 0);
}

#[actix_web::test]
async fn test_group_delete() {
    let app = test_app!();
    let resp = test::call_service(&app, create_edge_group().to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::delete().uri("/configGroups/edge/1").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    let req = test::TestRequest::get().uri("/configGroups/edge/1").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

// ============================================================================
// System
// ============================================================================

#[actix_web::test]
async fn test_health_reports_storage() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["status"], "UP");
    assert_eq!(resp["data"]["storage"], "memory");
}

#[actix_web::test]
async fn test_metrics_disabled_is_not_found() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/metrics").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}
