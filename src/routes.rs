use crate::{
    api::{attendance, employee, nfc_tag, payroll, reader},
    auth::middleware::auth_middleware,
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    HttpResponse,
    middleware::from_fn,
    web::{self, JsonConfig, PathConfig, QueryConfig},
};
use serde_json::json;
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("per_ms and burst_size are non-zero");
    Governor::new(&cfg)
}

/// Malformed bodies, queries and ids all answer in the same `{"error","code"}` shape.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(JsonConfig::default().error_handler(|err, _req| ApiError::InvalidJson(err.to_string()).into()))
        .app_data(QueryConfig::default().error_handler(|err, _req| ApiError::validation(err.to_string()).into()))
        .app_data(
            PathConfig::default().error_handler(|err, _req| ApiError::validation(format!("Invalid id: {err}")).into()),
        );
}

/// Built once and cloned into every worker so the quotas are process-wide.
#[derive(Clone)]
pub struct RateLimiters {
    toggle: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl RateLimiters {
    pub fn new(config: &Config) -> Self {
        Self {
            toggle: Arc::new(build_limiter(config.rate_toggle_per_min)),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    let toggle_limiter = limiters.toggle.clone();
    let protected_limiter = limiters.protected.clone();

    extractor_configs(cfg);

    cfg.route("/health", web::get().to(|| async { HttpResponse::Ok().json(json!({ "status": "ok" })) }));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/tags")
                    .service(
                        web::resource("")
                            .route(web::post().to(nfc_tag::create_tag))
                            .route(web::get().to(nfc_tag::list_tags)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(nfc_tag::update_tag))
                            .route(web::get().to(nfc_tag::get_tag))
                            .route(web::delete().to(nfc_tag::delete_tag)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance/toggle has its own, tighter limit
                    .service(
                        web::resource("/toggle")
                            .wrap(toggle_limiter)
                            .route(web::post().to(attendance::toggle)),
                    )
                    .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::create_attendance))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(web::resource("/generate").route(web::post().to(payroll::generate_payroll)))
                    .service(web::resource("").route(web::get().to(payroll::list_payrolls)))
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll))
                            .route(web::delete().to(payroll::delete_payroll)),
                    ),
            )
            .service(web::resource("/readers/token").route(web::post().to(reader::issue_reader_token))),
    );
}
