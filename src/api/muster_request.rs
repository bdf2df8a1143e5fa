use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::not_blank;
use crate::{
    auth::auth::AuthUser,
    error::{AppError, invalid},
    model::muster_request::{MusterAction, MusterEdit, MusterRequest, MusterStatus},
    service::muster::{self as muster_service, NewMuster},
};

fn validate_action(action: &str) -> Result<(), ValidationError> {
    match action.parse::<MusterAction>() {
        Ok(_) => Ok(()),
        Err(_) => Err(invalid("choice", "Action must be one of: clockin, clockout.")),
    }
}

fn parse_action(raw: &str) -> Result<MusterAction, AppError> {
    raw.parse()
        .map_err(|_| AppError::field("action", "choice", "Action must be one of: clockin, clockout."))
}

/// Any `status` sent by the client is ignored.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMuster {
    #[schema(example = "clockin")]
    #[validate(custom(function = "validate_action"))]
    pub action: String,

    #[schema(example = "2026-01-05T09:00:00Z")]
    pub requested_time: DateTime<Utc>,

    #[schema(example = "Forgot to clock in")]
    #[validate(custom(function = "not_blank"))]
    pub reason: String,
}

impl CreateMuster {
    fn into_new(self) -> Result<NewMuster, AppError> {
        Ok(NewMuster::new(
            parse_action(&self.action)?,
            self.requested_time,
            self.reason,
        ))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditMuster {
    #[schema(example = "clockout")]
    #[validate(custom(function = "validate_action"))]
    pub action: Option<String>,

    pub requested_time: Option<DateTime<Utc>>,

    #[validate(custom(function = "not_blank"))]
    pub reason: Option<String>,
}

impl EditMuster {
    fn into_edit(self) -> Result<MusterEdit, AppError> {
        Ok(MusterEdit {
            action: self.action.as_deref().map(parse_action).transpose()?,
            requested_time: self.requested_time,
            reason: self.reason,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct MusterResponse {
    #[schema(example = "Muster request submitted successfully")]
    pub message: String,
    pub data: MusterRequest,
}

/// Submit a muster request
#[utoipa::path(
    post,
    path = "/muster-request",
    request_body = CreateMuster,
    responses(
        (status = 201, description = "Submitted with status pending", body = MusterResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Muster"
)]
pub async fn create_muster_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateMuster>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let new = payload.into_inner().into_new()?;
    let request = muster_service::create(pool.get_ref(), auth.id, new).await?;

    Ok(HttpResponse::Created().json(MusterResponse {
        message: "Muster request submitted successfully".into(),
        data: request,
    }))
}

/// The caller's muster requests, newest first
#[utoipa::path(
    get,
    path = "/muster-request/list",
    responses(
        (status = 200, description = "Own requests ordered by created_at descending", body = [MusterRequest]),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Muster"
)]
pub async fn list_muster_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, AppError> {
    let requests = muster_service::list_for(pool.get_ref(), auth.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Edit and resubmit a pending or rejected request
#[utoipa::path(
    put,
    path = "/muster-request/{request_id}/edit",
    params(("request_id" = u64, Path, description = "Muster request id")),
    request_body = EditMuster,
    responses(
        (status = 200, description = "Updated and reset to pending", body = MusterResponse),
        (status = 400, description = "Validation failed or request already approved", body = crate::api::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Muster"
)]
pub async fn edit_muster_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EditMuster>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let request_id = path.into_inner();
    let edit = payload.into_inner().into_edit()?;
    let request = muster_service::edit(pool.get_ref(), auth.id, request_id, edit).await?;

    Ok(HttpResponse::Ok().json(MusterResponse {
        message: "Muster request updated successfully".into(),
        data: request,
    }))
}

async fn review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    request_id: u64,
    decision: MusterStatus,
) -> Result<HttpResponse, AppError> {
    auth.require_privileged("review muster requests")?;

    let request = muster_service::decide(pool.get_ref(), request_id, decision).await?;

    Ok(HttpResponse::Ok().json(MusterResponse {
        message: format!("Muster request {decision}"),
        data: request,
    }))
}

/// Approve a pending request
#[utoipa::path(
    put,
    path = "/muster-request/{request_id}/approve",
    params(("request_id" = u64, Path, description = "Muster request id")),
    responses(
        (status = 200, description = "Approved", body = MusterResponse),
        (status = 400, description = "Already processed", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Muster"
)]
pub async fn approve_muster_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    review(auth, pool, path.into_inner(), MusterStatus::Approved).await
}

/// Reject a pending request
#[utoipa::path(
    put,
    path = "/muster-request/{request_id}/reject",
    params(("request_id" = u64, Path, description = "Muster request id")),
    responses(
        (status = 200, description = "Rejected", body = MusterResponse),
        (status = 400, description = "Already processed", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Muster"
)]
pub async fn reject_muster_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    review(auth, pool, path.into_inner(), MusterStatus::Rejected).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submitted_status_is_ignored() {
        let payload: CreateMuster = serde_json::from_value(json!({
            "action": "clockin",
            "requested_time": "2026-01-05T09:00:00+05:30",
            "reason": "Forgot",
            "status": "approved"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let new = payload.into_new().unwrap();
        assert_eq!(new.status, MusterStatus::Pending);
        assert_eq!(new.action, MusterAction::ClockIn);
        assert_eq!(new.requested_time.to_rfc3339(), "2026-01-05T03:30:00+00:00");
    }

    #[test]
    fn unknown_action_and_blank_reason_are_field_errors() {
        let payload: CreateMuster = serde_json::from_value(json!({
            "action": "lunch",
            "requested_time": "2026-01-05T09:00:00Z",
            "reason": "  "
        }))
        .unwrap();
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("action"));
        assert!(fields.contains_key("reason"));
    }

    #[test]
    fn partial_edit_keeps_absent_fields_empty() {
        let payload: EditMuster = serde_json::from_value(json!({"reason": "Badge reader down"})).unwrap();
        assert!(payload.validate().is_ok());
        let edit = payload.into_edit().unwrap();
        assert!(edit.action.is_none());
        assert!(edit.requested_time.is_none());
        assert_eq!(edit.reason.as_deref(), Some("Badge reader down"));
    }

    #[test]
    fn edit_rejects_bad_action() {
        let payload: EditMuster = serde_json::from_value(json!({"action": "ClockIn"})).unwrap();
        assert!(payload.validate().unwrap_err().field_errors().contains_key("action"));
    }
}
