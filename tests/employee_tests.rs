#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

use hrm_attendance::model::employee::SalaryType;
use hrm_attendance::model::role::Role;
use hrm_attendance::store::MemoryStore;

use common::{admin, anonymous, get, post, put, seed_employee, token};

fn new_employee(code: &str, email: &str) -> Value {
    json!({
        "employee_code": code,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "salary_type": "fixed",
        "monthly_salary": 4200.0,
        "hire_date": "2026-01-05"
    })
}

#[actix_web::test]
async fn create_returns_201_and_duplicate_email_is_409_without_insert() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);
    let hr = token(Role::Hr, None);

    let req = post("/api/employees", &hr)
        .set_json(new_employee("EMP-1", "ada@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "active");
    assert_eq!(created["salary_type"], "fixed");

    let req = post("/api/employees", &hr)
        .set_json(new_employee("EMP-2", "ada@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "DUPLICATE_EMAIL");

    let req = get("/api/employees", &hr).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn invalid_payloads_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let app = test_app!(store);

    let mut missing_rate = new_employee("EMP-3", "x@example.com");
    missing_rate["salary_type"] = json!("hourly");

    for body in [new_employee("EMP-3", "not-an-email"), missing_rate] {
        let req = post("/api/employees", &admin()).set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    let req = post("/api/employees", &admin())
        .set_json(json!({ "first_name": "Only" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_JSON");
}

#[actix_web::test]
async fn list_filters_by_status_department_and_search() {
    let store = Arc::new(MemoryStore::new());
    seed_employee(&store, "ALPHA", SalaryType::Fixed).await;
    seed_employee(&store, "BETA", SalaryType::Hourly).await;
    let app = test_app!(store);

    let req = get("/api/employees?search=beta", &admin()).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"][0]["employee_code"], "BETA");

    let req = get("/api/employees?department=Operations&status=active&per_page=1", &admin()).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list["total"], 2);
    assert_eq!(list["per_page"], 1);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let req = get("/api/employees?status=retired", &admin()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn update_changes_fields_and_reports_missing_ids() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "GAMMA", SalaryType::Fixed).await;
    let app = test_app!(store);

    let req = put(&format!("/api/employees/{}", emp.id), &admin())
        .set_json(json!({ "position": "Lead", "status": "inactive" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["position"], "Lead");
    assert_eq!(updated["status"], "inactive");

    let req = put("/api/employees/9999", &admin())
        .set_json(json!({ "position": "Lead" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = put(&format!("/api/employees/{}", emp.id), &admin())
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn employees_only_read_their_own_profile() {
    let store = Arc::new(MemoryStore::new());
    let me = seed_employee(&store, "SELF", SalaryType::Fixed).await;
    let other = seed_employee(&store, "OTHER", SalaryType::Fixed).await;
    let app = test_app!(store);
    let my_token = token(Role::Employee, Some(me.id));

    let req = get(&format!("/api/employees/{}", me.id), &my_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = get(&format!("/api/employees/{}", other.id), &my_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = get("/api/employees", &my_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = anonymous(test::TestRequest::get().uri("/api/employees")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn switching_to_hourly_requires_a_rate() {
    let store = Arc::new(MemoryStore::new());
    let emp = seed_employee(&store, "DELTA", SalaryType::Fixed).await;
    let app = test_app!(store);
    let uri = format!("/api/employees/{}", emp.id);

    let req = put(&uri, &admin()).set_json(json!({ "salary_type": "hourly" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let req = get(&uri, &admin()).to_request();
    let unchanged: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(unchanged["salary_type"], "fixed");

    let req = put(&uri, &admin())
        .set_json(json!({ "salary_type": "hourly", "hourly_rate": 22.5, "email": "  delta.h@example.com " }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["salary_type"], "hourly");
    assert_eq!(updated["hourly_rate"], 22.5);
    assert_eq!(updated["email"], "delta.h@example.com");
}
