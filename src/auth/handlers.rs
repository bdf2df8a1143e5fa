use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::MessageResponse,
    auth::{auth::AuthUser, jwt::generate_access_token},
    config::Config,
    error::AppError,
    model::role::Role,
    service::employee as employee_service,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "E100")]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub employee_id: String,
    #[schema(example = "s3cret-pass", format = Password)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "Login successful")]
    pub message: String,
    pub employee_id: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub access_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdate {
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub last_name: Option<String>,
    /// Ignored when empty.
    #[schema(format = Password)]
    pub password: Option<String>,
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Invalid credentials or inactive account", body = crate::api::ErrorResponse),
        (status = 429, description = "Too many login attempts")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(employee_id = %payload.employee_id)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<impl Responder, AppError> {
    info!("Login request received");
    payload.validate()?;

    let employee =
        employee_service::authenticate(pool.get_ref(), &payload.employee_id, &payload.password)
            .await?;

    debug!(id = employee.id, "Generating access token");
    let access_token =
        generate_access_token(&employee, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))?;

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "Login successful".into(),
        is_admin: employee.is_admin(),
        employee_id: employee.employee_id,
        role: employee.role,
        first_name: employee.first_name,
        last_name: employee.last_name,
        access_token,
    }))
}

/// Update the caller's own names or password
#[utoipa::path(
    put,
    path = "/update_profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = MessageResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let payload = payload.into_inner();
    let changes =
        employee_service::hash_changes(payload.first_name, payload.last_name, None, payload.password)
            .await?;
    employee_service::update_profile(pool.get_ref(), auth.id, changes).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Profile updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_requires_both_fields() {
        let payload: LoginReqDto =
            serde_json::from_value(json!({"employee_id": "", "password": ""})).unwrap();
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("employee_id"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn profile_ignores_role() {
        let payload: ProfileUpdate =
            serde_json::from_value(json!({"first_name": "Ann", "role": "admin"})).unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.first_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn login_response_shape() {
        let body = serde_json::to_value(LoginResponse {
            message: "Login successful".into(),
            employee_id: "E1".into(),
            role: Role::Hr,
            first_name: "A".into(),
            last_name: "B".into(),
            is_admin: true,
            access_token: "t".into(),
        })
        .unwrap();
        assert_eq!(body["role"], "hr");
        assert_eq!(body["is_admin"], true);
    }
}
