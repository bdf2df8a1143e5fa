use chrono::{Local, NaiveDate, Utc};
use sqlx::MySqlPool;
use tracing::{debug, instrument, warn};

use crate::{
    error::AppError,
    model::attendance::{AttendanceEntry, AttendanceRecord, AttendanceSummary, StampKind},
};

const STAMP_COLUMNS: &str = "clock_in, clock_out, break_in, break_out, lunch_in, lunch_out";

/// The calendar day attendance is recorded against.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// InnoDB deadlock victim; safe to retry the whole transaction.
fn is_deadlock(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("40001"))
}

const STAMP_ATTEMPTS: usize = 3;

/// Sets one timestamp on the caller's record for today, creating the record
/// on the first action of the day. Repeating an action overwrites it.
#[instrument(name = "stamp", skip(pool, kind), fields(kind = %kind))]
pub async fn stamp(pool: &MySqlPool, employee_ref: u64, kind: StampKind) -> Result<AttendanceRecord, AppError> {
    let mut attempt = 1;
    loop {
        match try_stamp(pool, employee_ref, kind).await {
            Err(e) if attempt < STAMP_ATTEMPTS && is_deadlock(&e) => {
                warn!(attempt, "Deadlock while stamping, retrying");
                attempt += 1;
            }
            // The only integrity failure left is the employee foreign key:
            // the account was deleted after the token was checked.
            Err(e) if crate::db::is_integrity_violation(&e) => {
                return Err(AppError::NotFound("User not found".into()));
            }
            Err(e) => return Err(e.into()),
            Ok(record) => return Ok(record),
        }
    }
}

async fn try_stamp(pool: &MySqlPool, employee_ref: u64, kind: StampKind) -> Result<AttendanceRecord, sqlx::Error> {
    let date = today();
    let column = kind.column();

    let mut tx = pool.begin().await?;

    // Only the stamped column is written, so racing stamps of different
    // fields both survive and racing stamps of the same field are last-write-wins.
    sqlx::query(&format!(
        "INSERT INTO attendance (employee_ref, date, {column}) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE {column} = VALUES({column})"
    ))
    .bind(employee_ref)
    .bind(date)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT employee_ref, date, {STAMP_COLUMNS} FROM attendance WHERE employee_ref = ? AND date = ?"
    ))
    .bind(employee_ref)
    .bind(date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    debug!(%date, "Attendance stamped");
    Ok(record)
}

/// Everyone's attendance for `date`, grouped by recorded event.
pub async fn summary_for(pool: &MySqlPool, date: NaiveDate) -> Result<AttendanceSummary, AppError> {
    let entries = sqlx::query_as::<_, AttendanceEntry>(
        r#"
        SELECT e.employee_id, e.first_name, e.last_name,
               a.clock_in, a.clock_out, a.break_in, a.break_out, a.lunch_in, a.lunch_out
        FROM attendance a
        JOIN employees e ON e.id = a.employee_ref
        WHERE a.date = ?
        ORDER BY e.employee_id
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    debug!(%date, rows = entries.len(), "Building attendance summary");
    Ok(AttendanceSummary::group(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::role::Role, service::employee::seed};

    async fn rows_for(pool: &MySqlPool, employee_ref: u64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE employee_ref = ?")
            .bind(employee_ref)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn repeated_clock_in_overwrites_the_same_record(pool: MySqlPool) {
        let employee = seed(&pool, "AT-TWICE-1", Role::Employee).await;

        let first = stamp(&pool, employee.id, StampKind::ClockIn).await.unwrap();
        let second = stamp(&pool, employee.id, StampKind::ClockIn).await.unwrap();

        assert_eq!(rows_for(&pool, employee.id).await, 1);
        assert!(second.stamps.clock_in >= first.stamps.clock_in);
        assert_eq!(second.stamps.clock_out, None);

        let stored: Option<chrono::DateTime<Utc>> =
            sqlx::query_scalar("SELECT clock_in FROM attendance WHERE employee_ref = ?")
                .bind(employee.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, second.stamps.clock_in);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn racing_first_stamps_share_one_record(pool: MySqlPool) {
        let employee = seed(&pool, "AT-RACE-1", Role::Employee).await;

        let (clock_in, break_in) = futures::join!(
            stamp(&pool, employee.id, StampKind::ClockIn),
            stamp(&pool, employee.id, StampKind::BreakIn),
        );
        clock_in.unwrap();
        break_in.unwrap();

        let record = stamp(&pool, employee.id, StampKind::LunchOut).await.unwrap();
        assert_eq!(rows_for(&pool, employee.id).await, 1);
        assert!(record.stamps.clock_in.is_some());
        assert!(record.stamps.break_in.is_some());
        assert!(record.stamps.lunch_out.is_some());
        assert_eq!(record.date, today());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stamping_for_a_deleted_account_is_404(pool: MySqlPool) {
        let err = stamp(&pool, 424_242, StampKind::ClockIn).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "User not found"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn summary_lists_todays_stampers(pool: MySqlPool) {
        let early = seed(&pool, "AT-SUM-1", Role::Employee).await;
        let late = seed(&pool, "AT-SUM-2", Role::Hr).await;
        stamp(&pool, early.id, StampKind::ClockIn).await.unwrap();
        stamp(&pool, early.id, StampKind::ClockOut).await.unwrap();
        stamp(&pool, late.id, StampKind::ClockIn).await.unwrap();

        let summary = summary_for(&pool, today()).await.unwrap();
        let clocked_in: Vec<&str> = summary.clockin.iter().map(|e| e.employee_id.as_str()).collect();
        assert_eq!(clocked_in, vec!["AT-SUM-1", "AT-SUM-2"]);
        assert_eq!(summary.clockout.len(), 1);
        assert!(summary.breakin.is_empty());

        let yesterday = today().pred_opt().unwrap();
        assert!(summary_for(&pool, yesterday).await.unwrap().clockin.is_empty());
    }
}
