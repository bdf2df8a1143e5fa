use crate::{
    api::{attendance, employee, muster_request},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use std::sync::Arc;

type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    login: Arc<Limiter>,
    protected: Arc<Limiter>,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

impl RateLimits {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, limits: &RateLimits) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid JSON: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query: {err}")).into()
    }));

    // Public
    cfg.service(
        web::resource("/login")
            .wrap(limits.login.clone())
            .route(web::post().to(handlers::login)),
    );

    // Everything else needs a bearer token
    cfg.service(
        web::scope("")
            .wrap(from_fn(auth_middleware))
            .wrap(limits.protected.clone())
            .service(
                web::resource("/update_profile").route(web::put().to(handlers::update_profile)),
            )
            // employees
            .service(
                web::resource("/register-employee")
                    .route(web::get().to(employee::register_info))
                    .route(web::post().to(employee::register_employee)),
            )
            .service(web::resource("/employees").route(web::get().to(employee::list_employees)))
            .service(
                web::resource("/employees/{employee_id}/update")
                    .route(web::put().to(employee::update_employee))
                    .route(web::patch().to(employee::update_employee)),
            )
            .service(
                web::resource("/employees/{employee_id}/delete")
                    .route(web::delete().to(employee::delete_employee)),
            )
            // attendance
            .service(web::resource("/clock_in").route(web::post().to(attendance::clock_in)))
            .service(web::resource("/clock_out").route(web::post().to(attendance::clock_out)))
            .service(web::resource("/break_in").route(web::post().to(attendance::break_in)))
            .service(web::resource("/break_out").route(web::post().to(attendance::break_out)))
            .service(web::resource("/lunch_in").route(web::post().to(attendance::lunch_in)))
            .service(web::resource("/lunch_out").route(web::post().to(attendance::lunch_out)))
            .service(
                web::resource("/attendance-summary")
                    .route(web::get().to(attendance::attendance_summary)),
            )
            // muster requests
            .service(
                web::scope("/muster-request")
                    .service(
                        web::resource("")
                            .route(web::post().to(muster_request::create_muster_request)),
                    )
                    .service(
                        web::resource("/list")
                            .route(web::get().to(muster_request::list_muster_requests)),
                    )
                    .service(
                        web::resource("/{request_id}/edit")
                            .route(web::put().to(muster_request::edit_muster_request))
                            .route(web::patch().to(muster_request::edit_muster_request)),
                    )
                    .service(
                        web::resource("/{request_id}/approve")
                            .route(web::put().to(muster_request::approve_muster_request)),
                    )
                    .service(
                        web::resource("/{request_id}/reject")
                            .route(web::put().to(muster_request::reject_muster_request)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::jwt::generate_access_token,
        model::{
            employee::{Employee, EmployeeChanges, sample},
            role::Role,
        },
        service::employee as employee_service,
    };
    use actix_web::{App, http::StatusCode, middleware::NormalizePath, test as actix_test};
    use serde_json::{Value, json};
    use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

    /// For requests that are answered before anything touches the database.
    fn lazy_pool() -> MySqlPool {
        MySqlPoolOptions::new()
            .connect_lazy(&Config::for_tests().database_url)
            .unwrap()
    }

    fn bearer(employee: &Employee) -> String {
        let token =
            generate_access_token(employee, &Config::for_tests().jwt_secret, 900).unwrap();
        format!("Bearer {token}")
    }

    async fn login_as(pool: &MySqlPool, employee_id: &str, role: Role) -> String {
        bearer(&employee_service::seed(pool, employee_id, role).await)
    }

    async fn send(
        pool: MySqlPool,
        req: actix_test::TestRequest,
        authorization: Option<String>,
    ) -> (StatusCode, Value) {
        let config = Config::for_tests();
        let limits = RateLimits::new(&config).unwrap();

        let app = actix_test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &limits)),
        )
        .await;

        let mut req = req.peer_addr("127.0.0.1:40000".parse().unwrap());
        if let Some(value) = authorization {
            req = req.insert_header(("Authorization", value));
        }

        let resp = actix_test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body = actix_test::read_body(resp).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[actix_web::test]
    async fn missing_token_is_401() {
        let req = actix_test::TestRequest::get().uri("/employees");
        let (status, body) = send(lazy_pool(), req, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Missing Authorization header"}));
    }

    #[actix_web::test]
    async fn garbage_token_is_401() {
        let req = actix_test::TestRequest::post().uri("/clock_in");
        let (status, body) = send(lazy_pool(), req, Some("Bearer not-a-jwt".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[actix_web::test]
    async fn unknown_paths_are_404_not_401() {
        let req = actix_test::TestRequest::get().uri("/no-such-route");
        let (status, _) = send(lazy_pool(), req, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn login_with_blank_fields_is_400() {
        let req = actix_test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"employee_id": "", "password": ""}));
        let (status, body) = send(lazy_pool(), req, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["employee_id"].is_array());
    }

    #[test]
    fn zero_rate_still_builds() {
        assert!(build_limiter(0).is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn token_of_a_missing_employee_is_401(pool: MySqlPool) {
        // valid signature, but no row with this id
        let req = actix_test::TestRequest::get().uri("/register-employee");
        let (status, body) = send(pool, req, Some(bearer(&sample(Role::Manager)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "User not found");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn demoted_manager_loses_privileges_immediately(pool: MySqlPool) {
        let token = login_as(&pool, "RT-DEMOTE-M", Role::Manager).await;
        employee_service::update_employee(
            &pool,
            "RT-DEMOTE-M",
            EmployeeChanges {
                role: Some(Role::Employee),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let req = actix_test::TestRequest::get().uri("/register-employee");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only admin/hr/manager can add users");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn inactive_account_is_401(pool: MySqlPool) {
        let employee = employee_service::seed(&pool, "RT-INACTIVE", Role::Hr).await;
        sqlx::query("UPDATE employees SET is_active = FALSE WHERE id = ?")
            .bind(employee.id)
            .execute(&pool)
            .await
            .unwrap();

        let req = actix_test::TestRequest::post().uri("/clock_in");
        let (status, body) = send(pool, req, Some(bearer(&employee))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "User is inactive");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn employees_cannot_list_users(pool: MySqlPool) {
        let token = login_as(&pool, "RT-LIST-E", Role::Employee).await;
        let req = actix_test::TestRequest::get().uri("/employees");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "Only admin/hr/manager can view users"}));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn employees_cannot_register_users(pool: MySqlPool) {
        let token = login_as(&pool, "RT-REG-E", Role::Employee).await;
        let req = actix_test::TestRequest::post()
            .uri("/register-employee")
            .set_json(json!({"employee_id": "RT-REG-NEW", "password": "pw"}));
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only admin/hr/manager can add users");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn register_hint_lists_assignable_roles(pool: MySqlPool) {
        let token = login_as(&pool, "RT-HINT-H", Role::Hr).await;
        let req = actix_test::TestRequest::get().uri("/register-employee/");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["roles"], json!(["employee", "hr", "manager"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn registering_an_admin_is_a_field_error(pool: MySqlPool) {
        let token = login_as(&pool, "RT-ADMIN-M", Role::Manager).await;
        let req = actix_test::TestRequest::post()
            .uri("/register-employee")
            .set_json(json!({"employee_id": "RT-ADMIN-NEW", "password": "pw", "role": "admin"}));
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid input");
        assert_eq!(body["fields"]["role"], json!(["Invalid role"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn registered_employee_can_log_in(pool: MySqlPool) {
        let token = login_as(&pool, "RT-LOGIN-H", Role::Hr).await;
        let req = actix_test::TestRequest::post().uri("/register-employee").set_json(json!({
            "employee_id": "RT-LOGIN-NEW",
            "password": "s3cret",
            "first_name": "Ann",
            "role": "Manager"
        }));
        let (status, body) = send(pool.clone(), req, Some(token)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Manager registered successfully");

        let req = actix_test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"employee_id": "RT-LOGIN-NEW", "password": "s3cret"}));
        let (status, body) = send(pool.clone(), req, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "manager");
        assert_eq!(body["is_admin"], true);
        assert!(body["access_token"].is_string());

        let req = actix_test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"employee_id": "RT-LOGIN-NEW", "password": "wrong"}));
        let (status, body) = send(pool, req, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid employee ID or password");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn summary_is_privileged(pool: MySqlPool) {
        let token = login_as(&pool, "RT-SUM-E", Role::Employee).await;
        let req = actix_test::TestRequest::get().uri("/attendance-summary");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only admin/hr/manager can view attendance");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn employees_cannot_review_musters(pool: MySqlPool) {
        let token = login_as(&pool, "RT-REVIEW-E", Role::Employee).await;
        let req = actix_test::TestRequest::put().uri("/muster-request/1/approve");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only admin/hr/manager can review muster requests");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bad_muster_action_is_rejected(pool: MySqlPool) {
        let token = login_as(&pool, "RT-ACTION-E", Role::Employee).await;
        let req = actix_test::TestRequest::post().uri("/muster-request").set_json(json!({
            "action": "lunch",
            "requested_time": "2026-01-05T09:00:00Z",
            "reason": "Forgot"
        }));
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["action"].is_array());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn malformed_json_is_400_with_error_key(pool: MySqlPool) {
        let token = login_as(&pool, "RT-JSON-E", Role::Employee).await;
        let req = actix_test::TestRequest::post()
            .uri("/muster-request")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json");
        let (status, body) = send(pool, req, Some(token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }
}
