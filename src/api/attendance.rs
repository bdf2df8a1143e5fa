use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::attendance::{AttendanceRecord, StampKind},
    service::attendance as attendance_service,
};

#[derive(Serialize, ToSchema)]
pub struct StampResponse {
    #[schema(example = "Clocked in successfully")]
    pub message: String,
    pub data: AttendanceRecord,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Day to summarize (YYYY-MM-DD); defaults to today
    pub date: Option<NaiveDate>,
}

async fn stamp(auth: AuthUser, pool: web::Data<MySqlPool>, kind: StampKind) -> Result<HttpResponse, AppError> {
    let record = attendance_service::stamp(pool.get_ref(), auth.id, kind).await?;
    info!(employee_id = %auth.employee_id, %kind, "Attendance stamped");

    Ok(HttpResponse::Ok().json(StampResponse {
        message: kind.message().to_string(),
        data: record,
    }))
}

#[utoipa::path(
    post,
    path = "/clock_in",
    responses(
        (status = 200, description = "Clock-in time recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::ClockIn).await
}

#[utoipa::path(
    post,
    path = "/clock_out",
    responses(
        (status = 200, description = "Clock-out time recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::ClockOut).await
}

#[utoipa::path(
    post,
    path = "/break_in",
    responses(
        (status = 200, description = "Break start recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn break_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::BreakIn).await
}

#[utoipa::path(
    post,
    path = "/break_out",
    responses(
        (status = 200, description = "Break end recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn break_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::BreakOut).await
}

#[utoipa::path(
    post,
    path = "/lunch_in",
    responses(
        (status = 200, description = "Lunch start recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn lunch_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::LunchIn).await
}

#[utoipa::path(
    post,
    path = "/lunch_out",
    responses(
        (status = 200, description = "Lunch end recorded", body = StampResponse),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn lunch_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    stamp(auth, pool, StampKind::LunchOut).await
}

/// Today's attendance grouped by event
#[utoipa::path(
    get,
    path = "/attendance-summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Employees per recorded event", body = crate::model::attendance::AttendanceSummary),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_privileged("view attendance")?;

    let date = query.date.unwrap_or_else(attendance_service::today);
    let summary = attendance_service::summary_for(pool.get_ref(), date).await?;

    Ok(HttpResponse::Ok().json(summary))
}
