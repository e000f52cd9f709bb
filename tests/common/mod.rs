#![allow(dead_code)]

use actix_web::test::TestRequest;
use chrono::NaiveDate;
use std::net::SocketAddr;

use hrm_attendance::auth::jwt::{TokenSubject, generate_token};
use hrm_attendance::model::employee::{Employee, NewEmployee, SalaryType};
use hrm_attendance::model::nfc_tag::{NewTag, NfcTag};
use hrm_attendance::model::role::Role;
use hrm_attendance::models::TokenType;
use hrm_attendance::store::{EmployeeStore, MemoryStore, TagStore};
use hrm_attendance::Config;

pub const SECRET: &str = "integration-secret";

pub fn config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "STORAGE" => "memory",
            "JWT_SECRET" => SECRET,
            "SERVER_ADDR" => "127.0.0.1:0",
            "RATE_TOGGLE_PER_MIN" => "10000",
            "RATE_PROTECTED_PER_MIN" => "10000",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test config")
}

/// Full route table over the given `Arc<MemoryStore>`. Needs `#[macro_use] mod common;`.
macro_rules! test_app {
    ($store:expr) => {
        test_app!($store, common::config())
    };
    ($store:expr, $config:expr) => {{
        let config: hrm_attendance::Config = $config;
        let limiters = hrm_attendance::routes::RateLimiters::new(&config);
        let store: std::sync::Arc<dyn hrm_attendance::Store> = $store.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::from(store))
                .app_data(actix_web::web::Data::new(
                    hrm_attendance::utils::tag_cache::TagCache::new(std::time::Duration::from_secs(60)),
                ))
                .app_data(actix_web::web::Data::new(config.clone()))
                .configure(|cfg| hrm_attendance::routes::configure(cfg, &config, &limiters)),
        )
        .await
    }};
}

pub fn token(role: Role, employee_id: Option<u64>) -> String {
    let subject = TokenSubject {
        user_id: 99,
        username: format!("{role}-user"),
        role,
        employee_id,
    };
    generate_token(&subject, TokenType::Access, SECRET, 3600)
        .expect("sign token")
        .0
}

pub fn admin() -> String {
    token(Role::Admin, None)
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().expect("socket addr")
}

/// The rate limiter keys on the peer address, which test requests lack by default.
pub fn with_auth(req: TestRequest, token: &str) -> TestRequest {
    req.peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {token}")))
}

pub fn get(uri: &str, token: &str) -> TestRequest {
    with_auth(TestRequest::get().uri(uri), token)
}

pub fn post(uri: &str, token: &str) -> TestRequest {
    with_auth(TestRequest::post().uri(uri), token)
}

pub fn put(uri: &str, token: &str) -> TestRequest {
    with_auth(TestRequest::put().uri(uri), token)
}

pub fn delete(uri: &str, token: &str) -> TestRequest {
    with_auth(TestRequest::delete().uri(uri), token)
}

pub fn anonymous(req: TestRequest) -> TestRequest {
    req.peer_addr(peer())
}

pub async fn seed_employee(store: &MemoryStore, code: &str, salary_type: SalaryType) -> Employee {
    let (monthly_salary, hourly_rate) = match salary_type {
        SalaryType::Fixed => (Some(3000.0), None),
        SalaryType::Hourly => (None, Some(20.0)),
    };
    store
        .create_employee(&NewEmployee {
            employee_code: code.to_string(),
            first_name: "Test".into(),
            last_name: code.to_string(),
            email: format!("{}@example.com", code.to_lowercase()),
            phone: None,
            department: Some("Operations".into()),
            position: None,
            salary_type,
            monthly_salary,
            hourly_rate,
            hire_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
        })
        .await
        .expect("seed employee")
}

pub async fn seed_tag(store: &MemoryStore, uid: &str, employee_id: Option<u64>) -> NfcTag {
    store
        .create_tag(&NewTag {
            tag_uid: uid.to_string(),
            employee_id,
            label: None,
        })
        .await
        .expect("seed tag")
}
