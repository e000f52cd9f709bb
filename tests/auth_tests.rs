#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

use hrm_attendance::auth::jwt::{TokenSubject, generate_token};
use hrm_attendance::model::employee::SalaryType;
use hrm_attendance::model::role::Role;
use hrm_attendance::models::TokenType;
use hrm_attendance::store::MemoryStore;

use common::{SECRET, admin, anonymous, get, post, seed_employee, seed_tag, token};

fn subject(role: Role) -> TokenSubject {
    TokenSubject {
        user_id: 5,
        username: "someone".into(),
        role,
        employee_id: None,
    }
}

#[actix_web::test]
async fn missing_forged_and_refresh_tokens_are_401() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let forged = generate_token(&subject(Role::Admin), TokenType::Access, "wrong-secret", 60)
        .unwrap()
        .0;
    let refresh = generate_token(&subject(Role::Admin), TokenType::Refresh, SECRET, 60)
        .unwrap()
        .0;

    let req = anonymous(test::TestRequest::get().uri("/api/tags")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    for bad in [forged, refresh, "garbage".to_string()] {
        let req = get("/api/tags", &bad).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[actix_web::test]
async fn health_is_public() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let req = anonymous(test::TestRequest::get().uri("/health")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn admin_issues_reader_tokens_that_can_scan() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "READ", SalaryType::Fixed).await;
    seed_tag(&store, "9A9A", Some(emp.id)).await;
    let app = test_app!(store);

    let req = post("/api/readers/token", &token(Role::Hr, None))
        .set_json(json!({ "reader_id": "gate-2" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = post("/api/readers/token", &admin())
        .set_json(json!({ "reader_id": "gate-2", "ttl_secs": 3600 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let issued: Value = test::read_body_json(resp).await;
    assert_eq!(issued["reader_id"], "gate-2");
    let reader_token = issued["token"].as_str().unwrap().to_string();

    let req = post("/api/attendance/toggle", &reader_token)
        .set_json(json!({ "tag_uid": "9a9a", "reader_id": "gate-2" }))
        .to_request();
    let outcome: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(outcome["action"], "checkin");

    // Readers scan; they do not administer.
    let req = get("/api/employees", &reader_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn toggle_is_rate_limited_per_peer() {
    let store = Arc::new(MemoryStore::new());
    let mut config = common::config();
    config.rate_toggle_per_min = 2;
    let app = test_app!(store, config);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let req = post("/api/attendance/toggle", &admin())
            .set_json(json!({ "tag_uid": "NOPE" }))
            .to_request();
        // The limiter answers with an error rather than a response.
        let status = match test::try_call_service(&app, req).await {
            Ok(resp) => resp.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        statuses.push(status);
    }
    assert_eq!(
        statuses,
        vec![StatusCode::NOT_FOUND, StatusCode::NOT_FOUND, StatusCode::TOO_MANY_REQUESTS]
    );
}

#[actix_web::test]
async fn reader_token_ttl_out_of_range_is_400() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    for ttl in [json!(0), json!(18446744073709551615u64), json!(315_360_001)] {
        let req = post("/api/readers/token", &admin())
            .set_json(json!({ "reader_id": "gate-2", "ttl_secs": ttl }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{ttl}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
