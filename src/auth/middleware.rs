use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
};
use serde_json::json;
use sqlx::MySqlPool;

use crate::{
    auth::auth::AuthUser, auth::jwt::verify_token, config::Config, error::AppError,
    service::employee as employee_service,
};

/// Decodes the bearer token and loads the caller's current row into an
/// `AuthUser` for the rest of the request. Role and activity come from the
/// database, so demotion, deactivation and deletion take effect immediately.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    // Unknown paths fall through to the 404 default service.
    if !req.resource_map().has_resource(req.path()) {
        return next.call(req).await;
    }

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => {
                return Ok(reject(req, "Invalid Authorization header encoding"));
            }
        },
        None => return Ok(reject(req, "Missing Authorization header")),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(reject(req, "Authorization header must start with Bearer")),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Ok(reject(req, "Invalid or expired token"));
        }
    };

    let pool = req
        .app_data::<Data<MySqlPool>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Database pool missing"))?;

    let employee = match employee_service::find_by_id(pool.get_ref(), claims.uid)
        .await
        .map_err(AppError::from)?
    {
        Some(e) if e.is_active => e,
        Some(_) => return Ok(reject(req, "User is inactive")),
        None => return Ok(reject(req, "User not found")),
    };

    if employee.role != claims.role {
        tracing::debug!(employee_id = %claims.sub, token_role = %claims.role, role = %employee.role, "Role changed since token was issued");
    }

    req.extensions_mut().insert(AuthUser::from(employee));

    next.call(req).await
}

fn reject(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "error": message }));
    req.into_response(resp.map_into_boxed_body())
}
