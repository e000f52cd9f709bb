#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

use chrono::NaiveDate;
use hrm_attendance::model::attendance::ScanOrigin;
use hrm_attendance::model::employee::{EmployeeChanges, EmployeeStatus, SalaryType};
use hrm_attendance::model::role::Role;
use hrm_attendance::model::scan_event::{NewScanEvent, ScanAction};
use hrm_attendance::store::{EmployeeStore, MemoryStore, ScanLog};

use common::{admin, post, seed_employee, seed_tag, token};

#[actix_web::test]
async fn tap_twice_checks_in_then_out_and_third_tap_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E100", SalaryType::Fixed).await;
    seed_tag(&store, "04A224B1", Some(emp.id)).await;
    let app = test_app!(store);
    let reader = token(Role::ApiUser, None);

    let req = post("/api/attendance/toggle", &reader)
        .set_json(json!({ "tag_uid": "04:a2:24:b1", "reader_id": "lobby" }))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["action"], "checkin");
    assert_eq!(first["employee_id"], emp.id);
    assert_eq!(first["record"]["method"], "nfc");
    assert_eq!(first["record"]["reader_id"], "lobby");
    assert!(first["record"]["check_out"].is_null());

    let req = post("/api/attendance/toggle", &reader)
        .set_json(json!({ "tag_uid": "04A224B1" }))
        .to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["action"], "checkout");
    let minutes = second["record"]["duration_minutes"].as_i64().expect("duration");
    assert!(minutes >= 0);
    assert!(!second["record"]["check_out"].is_null());

    let req = post("/api/attendance/toggle", &reader)
        .set_json(json!({ "tag_uid": "04A224B1" }))
        .to_request();
    let third: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(third["action"], "already_completed");
    assert_eq!(third["record"]["check_out"], second["record"]["check_out"]);
}

#[actix_web::test]
async fn unknown_badge_is_404_with_code() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let req = post("/api/attendance/toggle", &admin())
        .set_json(json!({ "tag_uid": "FFFF" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "TAG_NOT_FOUND");
}

#[actix_web::test]
async fn unassigned_badge_and_inactive_employee_are_forbidden() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E101", SalaryType::Fixed).await;
    seed_tag(&store, "AA01", None).await;
    seed_tag(&store, "AA02", Some(emp.id)).await;
    store
        .update_employee(
            emp.id,
            &EmployeeChanges {
                status: Some(EmployeeStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let app = test_app!(store);

    for (uid, code) in [("AA01", "TAG_NOT_ASSIGNED"), ("AA02", "EMPLOYEE_INACTIVE")] {
        let req = post("/api/attendance/toggle", &admin())
            .set_json(json!({ "tag_uid": uid }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], code);
    }
}

#[actix_web::test]
async fn lost_badge_stops_working_immediately() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E102", SalaryType::Fixed).await;
    let tag = seed_tag(&store, "BB01", Some(emp.id)).await;
    let app = test_app!(store);

    // Warm the cache with a successful scan first.
    let req = post("/api/attendance/toggle", &admin())
        .set_json(json!({ "tag_uid": "BB01" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = common::put(&format!("/api/tags/{}", tag.id), &admin())
        .set_json(json!({ "status": "lost" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = post("/api/attendance/toggle", &admin())
        .set_json(json!({ "tag_uid": "BB01" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "TAG_INACTIVE");
}

#[actix_web::test]
async fn idempotency_key_replays_first_outcome() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E103", SalaryType::Hourly).await;
    seed_tag(&store, "CC01", Some(emp.id)).await;
    let app = test_app!(store);
    let reader = token(Role::System, None);

    let send = |key: &'static str| {
        post("/api/attendance/toggle", &reader)
            .insert_header(("Idempotency-Key", key))
            .set_json(json!({ "tag_uid": "CC01" }))
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, send("evt-1")).await;
    let replay: Value = test::call_and_read_body_json(&app, send("evt-1")).await;
    assert_eq!(first["action"], "checkin");
    assert_eq!(replay["action"], "checkin");
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["record"]["id"], first["record"]["id"]);

    let next: Value = test::call_and_read_body_json(&app, send("evt-2")).await;
    assert_eq!(next["action"], "checkout");
}

#[actix_web::test]
async fn stranded_idempotency_key_recovers() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E105", SalaryType::Fixed).await;
    seed_tag(&store, "CC02", Some(emp.id)).await;
    store
        .record_scan(&NewScanEvent {
            idempotency_key: Some("evt-x".into()),
            tag_uid: "CC02".into(),
            employee_id: None,
            action: ScanAction::Pending,
            attendance_id: None,
            origin: ScanOrigin::default(),
            scanned_at: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    let app = test_app!(store);

    let send = || {
        post("/api/attendance/toggle", &admin())
            .insert_header(("Idempotency-Key", "evt-x"))
            .set_json(json!({ "tag_uid": "CC02" }))
            .to_request()
    };

    let resp = test::call_service(&app, send()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["action"], "checkin");
    assert_eq!(first["replayed"], false);

    let again: Value = test::call_and_read_body_json(&app, send()).await;
    assert_eq!(again["action"], "checkin");
    assert_eq!(again["replayed"], true);
}

#[actix_web::test]
async fn idempotency_key_is_bound_to_one_badge() {
    let store = Arc::new(MemoryStore::new());
    let a = seed_employee(&store, "E106", SalaryType::Fixed).await;
    let b = seed_employee(&store, "E107", SalaryType::Fixed).await;
    seed_tag(&store, "DD10", Some(a.id)).await;
    seed_tag(&store, "DD11", Some(b.id)).await;
    let app = test_app!(store);

    let send = |uid: &str| {
        post("/api/attendance/toggle", &admin())
            .insert_header(("Idempotency-Key", "evt-shared"))
            .set_json(json!({ "tag_uid": uid }))
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, send("DD10")).await;
    assert_eq!(first["employee_id"], a.id);

    let resp = test::call_service(&app, send("DD11")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "IDEMPOTENCY_KEY_REUSED");
}

#[actix_web::test]
async fn employees_cannot_scan_badges() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let req = post("/api/attendance/toggle", &token(Role::Employee, Some(1)))
        .set_json(json!({ "tag_uid": "DD01" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn empty_uid_and_half_coordinates_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    for body in [
        json!({ "tag_uid": " :: " }),
        json!({ "tag_uid": "EE01", "latitude": 23.8 }),
    ] {
        let req = post("/api/attendance/toggle", &admin()).set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    let req = post("/api/attendance/toggle", &admin())
        .set_json(json!({ "tag_uid": "EE01", "unexpected": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_JSON");
}

#[actix_web::test]
async fn self_service_check_in_and_out() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "E104", SalaryType::Fixed).await;
    let app = test_app!(store);
    let me = token(Role::Employee, Some(emp.id));

    let req = post("/api/attendance/checkout", &me).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "NO_OPEN_RECORD");

    let req = post("/api/attendance/checkin", &me).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = post("/api/attendance/checkin", &me).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ALREADY_CHECKED_IN");

    let req = common::get("/api/attendance/today", &me).to_request();
    let today: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(today["employee_id"], emp.id);
    assert!(today["check_out"].is_null());

    let req = post("/api/attendance/checkout", &me).to_request();
    let closed: Value = test::call_and_read_body_json(&app, req).await;
    assert!(closed["duration_minutes"].as_i64().unwrap() >= 0);
}
