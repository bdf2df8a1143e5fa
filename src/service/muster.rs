use chrono::{DateTime, Utc};
use sqlx::{Executor, MySql, MySqlPool};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    model::muster_request::{MusterAction, MusterEdit, MusterRequest, MusterStatus},
};

const MUSTER_SELECT: &str = r#"
    SELECT m.id, m.employee_ref, e.employee_id, m.action, m.requested_time, m.reason,
           m.status, m.created_at, m.updated_at
    FROM muster_requests m
    JOIN employees e ON e.id = m.employee_ref
"#;

/// A new request. Status is always pending, whatever the client sent.
#[derive(Debug)]
pub struct NewMuster {
    pub action: MusterAction,
    pub requested_time: DateTime<Utc>,
    pub reason: String,
    pub status: MusterStatus,
}

impl NewMuster {
    pub fn new(action: MusterAction, requested_time: DateTime<Utc>, reason: String) -> Self {
        Self {
            action,
            requested_time,
            reason,
            status: MusterStatus::Pending,
        }
    }
}

async fn find<'e, E>(executor: E, id: u64, owner: Option<u64>) -> Result<Option<MusterRequest>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    match owner {
        Some(employee_ref) => {
            sqlx::query_as::<_, MusterRequest>(&format!(
                "{MUSTER_SELECT} WHERE m.id = ? AND m.employee_ref = ? FOR UPDATE"
            ))
            .bind(id)
            .bind(employee_ref)
            .fetch_optional(executor)
            .await
        }
        None => {
            sqlx::query_as::<_, MusterRequest>(&format!("{MUSTER_SELECT} WHERE m.id = ? FOR UPDATE"))
                .bind(id)
                .fetch_optional(executor)
                .await
        }
    }
}

async fn save<'e, E>(executor: E, request: &MusterRequest) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        UPDATE muster_requests
        SET action = ?, requested_time = ?, reason = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(request.action.as_ref())
    .bind(request.requested_time)
    .bind(&request.reason)
    .bind(request.status.as_ref())
    .bind(request.updated_at)
    .bind(request.id)
    .execute(executor)
    .await?;
    Ok(())
}

#[instrument(name = "create_muster", skip(pool, new), fields(action = %new.action))]
pub async fn create(pool: &MySqlPool, employee_ref: u64, new: NewMuster) -> Result<MusterRequest, AppError> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO muster_requests
            (employee_ref, action, requested_time, reason, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_ref)
    .bind(new.action.as_ref())
    .bind(new.requested_time)
    .bind(&new.reason)
    .bind(new.status.as_ref())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if crate::db::is_integrity_violation(&e) => {
            return Err(AppError::NotFound("User not found".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(id, "Muster request submitted");
    find(pool, id, None)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("muster request {id} vanished after insert")))
}

/// The caller's own requests, newest first.
pub async fn list_for(pool: &MySqlPool, employee_ref: u64) -> Result<Vec<MusterRequest>, AppError> {
    Ok(sqlx::query_as::<_, MusterRequest>(&format!(
        "{MUSTER_SELECT} WHERE m.employee_ref = ? ORDER BY m.created_at DESC, m.id DESC"
    ))
    .bind(employee_ref)
    .fetch_all(pool)
    .await?)
}

#[instrument(name = "edit_muster", skip(pool, edit))]
pub async fn edit(
    pool: &MySqlPool,
    employee_ref: u64,
    id: u64,
    edit: MusterEdit,
) -> Result<MusterRequest, AppError> {
    let mut tx = pool.begin().await?;

    let mut request = find(&mut *tx, id, Some(employee_ref))
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".into()))?;

    request.resubmit(edit, Utc::now())?;
    save(&mut *tx, &request).await?;
    tx.commit().await?;

    info!("Muster request resubmitted");
    Ok(request)
}

/// Approves or rejects a pending request.
#[instrument(name = "decide_muster", skip(pool, decision), fields(decision = %decision))]
pub async fn decide(pool: &MySqlPool, id: u64, decision: MusterStatus) -> Result<MusterRequest, AppError> {
    let mut tx = pool.begin().await?;

    let mut request = find(&mut *tx, id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".into()))?;

    request.decide(decision, Utc::now())?;
    save(&mut *tx, &request).await?;
    tx.commit().await?;

    info!(employee_id = %request.employee_id, "Muster request reviewed");
    Ok(request)
}
