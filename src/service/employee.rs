use sqlx::{Executor, MySql, MySqlPool};
use tracing::{debug, error, info, instrument};

use crate::{
    auth::password::{hash_blocking, verify_blocking},
    config::SuperuserConfig,
    db::is_integrity_violation,
    error::AppError,
    model::{
        employee::{Employee, EmployeeChanges, EmployeeSummary, NewEmployee},
        role::{ASSIGNABLE_ROLES, Role},
    },
    utils::{employee_id_cache, employee_id_filter},
};

const EMPLOYEE_COLUMNS: &str =
    "id, employee_id, password, role, first_name, last_name, is_active, is_staff, is_superuser";

pub const DUPLICATE_EMPLOYEE_ID: &str = "employee user with this employee id already exists.";

/// Validated registration input; the password is still in clear text.
pub struct Registration {
    pub employee_id: String,
    pub role: Role,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct ListFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
}

pub async fn find_by_employee_id(
    pool: &MySqlPool,
    employee_id: &str,
) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE employee_id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Looks up an employee that admin/hr/manager may edit or delete; admins are
/// never returned.
async fn find_manageable<'e, E>(executor: E, employee_id: &str) -> Result<Option<Employee>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let placeholders = vec!["?"; ASSIGNABLE_ROLES.len()].join(", ");
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE employee_id = ? AND role IN ({placeholders}) FOR UPDATE"
    );
    let mut query = sqlx::query_as::<_, Employee>(&sql).bind(employee_id);
    for role in ASSIGNABLE_ROLES {
        query = query.bind(role.to_string());
    }
    query.fetch_optional(executor).await
}

#[instrument(name = "authenticate", skip(pool, password))]
pub async fn authenticate(
    pool: &MySqlPool,
    employee_id: &str,
    password: &str,
) -> Result<Employee, AppError> {
    let employee = match find_by_employee_id(pool, employee_id).await? {
        Some(e) => e,
        None => {
            info!("Invalid credentials: employee not found");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_blocking(password.to_owned(), employee.password.clone()).await? {
        info!("Invalid credentials: password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    if !employee.is_active {
        info!("Login refused: inactive account");
        return Err(AppError::InactiveAccount);
    }

    if let Err(e) = sqlx::query("UPDATE employees SET last_login_at = NOW() WHERE id = ?")
        .bind(employee.id)
        .execute(pool)
        .await
    {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    Ok(employee)
}

/// true  => employee_id AVAILABLE
/// false => employee_id TAKEN
pub async fn is_employee_id_available(pool: &MySqlPool, employee_id: &str) -> Result<bool, AppError> {
    // Cuckoo filter: fast negative
    if !employee_id_filter::might_exist(employee_id) {
        return Ok(true);
    }

    // Cache: fast positive
    if employee_id_cache::is_taken(employee_id).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM employees WHERE employee_id = ? LIMIT 1)",
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;

    if exists {
        employee_id_cache::mark_taken(employee_id).await;
    }
    Ok(!exists)
}

async fn insert(pool: &MySqlPool, new: NewEmployee) -> Result<Employee, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_id, password, role, first_name, last_name, is_active, is_staff, is_superuser)
        VALUES (?, ?, ?, ?, ?, TRUE, ?, ?)
        "#,
    )
    .bind(&new.employee_id)
    .bind(&new.password_hash)
    .bind(new.role.as_ref())
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(new.is_staff)
    .bind(new.is_superuser)
    .execute(pool)
    .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_integrity_violation(&e) => {
            employee_id_filter::insert(&new.employee_id);
            employee_id_cache::mark_taken(&new.employee_id).await;
            return Err(AppError::field("employee_id", "unique", DUPLICATE_EMPLOYEE_ID));
        }
        Err(e) => return Err(e.into()),
    };

    employee_id_filter::insert(&new.employee_id);
    employee_id_cache::mark_taken(&new.employee_id).await;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("employee {id} vanished after insert")))
}

#[instrument(name = "register_employee", skip(pool, registration), fields(employee_id = %registration.employee_id, role = %registration.role))]
pub async fn register(pool: &MySqlPool, registration: Registration) -> Result<Employee, AppError> {
    if !is_employee_id_available(pool, &registration.employee_id).await? {
        return Err(AppError::field("employee_id", "unique", DUPLICATE_EMPLOYEE_ID));
    }

    let hash = hash_blocking(registration.password).await?;
    let employee = insert(
        pool,
        NewEmployee::new(
            registration.employee_id,
            registration.role,
            hash,
            registration.first_name,
            registration.last_name,
        ),
    )
    .await?;

    info!(id = employee.id, "Employee registered");
    Ok(employee)
}

/// Creates the configured superuser unless the employee_id is already taken.
/// Returns `None` when nothing was created.
pub async fn create_superuser(
    pool: &MySqlPool,
    superuser: &SuperuserConfig,
) -> Result<Option<Employee>, AppError> {
    let role = Role::superuser(&superuser.role).ok_or_else(|| {
        AppError::field("role", "role", "Superuser must have role = admin/hr/manager")
    })?;

    if find_by_employee_id(pool, &superuser.employee_id).await?.is_some() {
        debug!(employee_id = %superuser.employee_id, "Superuser already exists");
        return Ok(None);
    }

    let hash = hash_blocking(superuser.password.clone()).await?;
    let new = NewEmployee::new(
        superuser.employee_id.clone(),
        role,
        hash,
        superuser.first_name.clone(),
        superuser.last_name.clone(),
    )
    .superuser();

    let employee = insert(pool, new).await?;
    info!(employee_id = %employee.employee_id, role = %employee.role, "Superuser created");
    Ok(Some(employee))
}

pub async fn list(pool: &MySqlPool, filter: &ListFilter) -> Result<Vec<EmployeeSummary>, AppError> {
    let roles: Vec<Role> = match filter.role {
        Some(role) if ASSIGNABLE_ROLES.contains(&role) => vec![role],
        Some(_) => return Ok(Vec::new()),
        None => ASSIGNABLE_ROLES.to_vec(),
    };

    let placeholders = vec!["?"; roles.len()].join(", ");
    let mut sql = format!(
        "SELECT id, employee_id, first_name, last_name, role, is_staff FROM employees WHERE role IN ({placeholders})"
    );
    let like = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    if like.is_some() {
        sql.push_str(" AND (employee_id LIKE ? OR first_name LIKE ? OR last_name LIKE ?)");
    }
    sql.push_str(" ORDER BY employee_id");
    debug!(sql = %sql, "Listing employees");

    let mut query = sqlx::query_as::<_, EmployeeSummary>(&sql);
    for role in &roles {
        query = query.bind(role.as_ref());
    }
    if let Some(like) = &like {
        query = query.bind(like).bind(like).bind(like);
    }

    Ok(query.fetch_all(pool).await?)
}

async fn save<'e, E>(executor: E, employee: &Employee) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query(
        r#"
        UPDATE employees
        SET role = ?, first_name = ?, last_name = ?, password = ?, is_staff = ?
        WHERE id = ?
        "#,
    )
    .bind(employee.role.as_ref())
    .bind(&employee.first_name)
    .bind(&employee.last_name)
    .bind(&employee.password)
    .bind(employee.is_staff)
    .bind(employee.id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Clear-text password in a change set is hashed before it reaches the row.
pub async fn hash_changes(
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<Role>,
    password: Option<String>,
) -> Result<EmployeeChanges, AppError> {
    let password_hash = match password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_blocking(p).await?),
        None => None,
    };
    Ok(EmployeeChanges {
        first_name,
        last_name,
        role,
        password_hash,
    })
}

#[instrument(name = "update_employee", skip(pool, changes))]
pub async fn update_employee(
    pool: &MySqlPool,
    employee_id: &str,
    changes: EmployeeChanges,
) -> Result<Employee, AppError> {
    let mut tx = pool.begin().await?;

    let mut employee = find_manageable(&mut *tx, employee_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    employee.apply(changes);
    save(&mut *tx, &employee).await?;
    tx.commit().await?;

    info!(role = %employee.role, is_staff = employee.is_staff, "Employee updated");
    Ok(employee)
}

/// Removes the employee together with their attendance and muster rows.
#[instrument(name = "delete_employee", skip(pool))]
pub async fn delete_employee(pool: &MySqlPool, employee_id: &str) -> Result<Role, AppError> {
    let mut tx = pool.begin().await?;

    let employee = find_manageable(&mut *tx, employee_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let musters = sqlx::query("DELETE FROM muster_requests WHERE employee_ref = ?")
        .bind(employee.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let attendance = sqlx::query("DELETE FROM attendance WHERE employee_ref = ?")
        .bind(employee.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    employee_id_filter::remove(&employee.employee_id);
    employee_id_cache::forget(&employee.employee_id).await;

    info!(musters, attendance, "Employee deleted");
    Ok(employee.role)
}

/// Self-service update of the caller's own names and password. The role is
/// never touched, and the row is locked so a concurrent role change by an
/// admin/hr/manager is not reverted.
#[instrument(name = "update_profile", skip(pool, changes))]
pub async fn update_profile(
    pool: &MySqlPool,
    id: u64,
    changes: EmployeeChanges,
) -> Result<Employee, AppError> {
    let mut tx = pool.begin().await?;

    let mut employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    employee.apply(EmployeeChanges {
        role: None,
        ..changes
    });
    save(&mut *tx, &employee).await?;
    tx.commit().await?;

    info!("Profile updated");
    Ok(employee)
}

/// Inserts an employee with a placeholder hash, bypassing registration.
#[cfg(test)]
pub(crate) async fn seed(pool: &MySqlPool, employee_id: &str, role: Role) -> Employee {
    insert(
        pool,
        NewEmployee::new(employee_id.into(), role, "hash".into(), "Jane".into(), "Doe".into()),
    )
    .await
    .unwrap()
}
