use anyhow::Result;
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Employee ids known to be taken. Only positives are stored.
static TAKEN_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

fn key(employee_id: &str) -> String {
    employee_id.trim().to_lowercase()
}

pub async fn mark_taken(employee_id: &str) {
    TAKEN_CACHE.insert(key(employee_id), true).await;
}

pub async fn is_taken(employee_id: &str) -> bool {
    TAKEN_CACHE.get(&key(employee_id)).await.unwrap_or(false)
}

pub async fn forget(employee_id: &str) {
    TAKEN_CACHE.invalidate(&key(employee_id)).await;
}

async fn batch_mark(employee_ids: &[String]) {
    let futures: Vec<_> = employee_ids
        .iter()
        .map(|id| TAKEN_CACHE.insert(key(id), true))
        .collect();

    futures::future::join_all(futures).await;
}

/// Caches the ids of employees who logged in during the last `days` days.
pub async fn warmup(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT employee_id
        FROM employees
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (employee_id,) = row?;
        batch.push(employee_id);
        total += 1;

        if batch.len() >= batch_size {
            batch_mark(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_mark(&batch).await;
    }

    tracing::info!(total, days, "Employee id cache warmup complete");

    Ok(())
}
