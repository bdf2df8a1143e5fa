use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static EMPLOYEE_ID_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// employee_id uniqueness in MySQL is case-insensitive under the default
/// collation, so the filter keys on the lower-cased form.
#[inline]
fn normalize(employee_id: &str) -> String {
    employee_id.trim().to_lowercase()
}

fn read() -> RwLockReadGuard<'static, CuckooFilter<String>> {
    EMPLOYEE_ID_FILTER.read().unwrap_or_else(|e| e.into_inner())
}

fn write() -> RwLockWriteGuard<'static, CuckooFilter<String>> {
    EMPLOYEE_ID_FILTER.write().unwrap_or_else(|e| e.into_inner())
}

/// `false` means the id is certainly free; `true` may be a false positive.
pub fn might_exist(employee_id: &str) -> bool {
    read().contains(&normalize(employee_id))
}

pub fn insert(employee_id: &str) {
    write().add(&normalize(employee_id));
}

pub fn remove(employee_id: &str) {
    write().remove(&normalize(employee_id));
}

/// Loads every employee_id into the filter, streaming in batches.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT employee_id FROM employees").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (employee_id,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&employee_id));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    tracing::info!(total, "Employee id filter warmup complete");
    Ok(())
}

fn insert_batch(employee_ids: &[String]) {
    let mut filter = write();
    for employee_id in employee_ids {
        filter.add(employee_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_ids_are_reported_case_insensitively() {
        insert("FilterTest-A1");
        assert!(might_exist("filtertest-a1"));
        assert!(might_exist(" FILTERTEST-A1 "));
    }

    #[test]
    fn removed_ids_are_no_longer_reported() {
        insert("FilterTest-B2");
        remove("FilterTest-B2");
        assert!(!might_exist("FilterTest-B2"));
    }

    #[test]
    fn unknown_ids_are_free() {
        assert!(!might_exist("FilterTest-never-inserted-9f3c"));
    }
}
