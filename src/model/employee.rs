use serde::Serialize;
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub employee_id: String,
    /// argon2 PHC string
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// A row about to be inserted. `is_staff` is always derived from the role.
#[derive(Debug)]
pub struct NewEmployee {
    pub employee_id: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewEmployee {
    pub fn new(
        employee_id: String,
        role: Role,
        password_hash: String,
        first_name: String,
        last_name: String,
    ) -> Self {
        Self {
            employee_id,
            password_hash,
            role,
            first_name,
            last_name,
            is_staff: role.is_staff(),
            is_superuser: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self.is_staff = self.role.is_staff();
        self
    }
}

/// Field changes applied by an admin/hr/manager or by the employee themself.
#[derive(Debug, Default)]
pub struct EmployeeChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

impl Employee {
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.is_staff = role.is_staff();
    }

    pub fn apply(&mut self, changes: EmployeeChanges) {
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(role) = changes.role {
            self.set_role(role);
        }
        if let Some(hash) = changes.password_hash {
            self.password = hash;
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "employee_id": "E100",
    "first_name": "Jane",
    "last_name": "Doe",
    "role": "employee",
    "is_staff": false
}))]
pub struct EmployeeSummary {
    pub id: u64,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_staff: bool,
}

#[cfg(test)]
pub(crate) fn sample(role: Role) -> Employee {
    Employee {
        id: 1,
        employee_id: "E100".into(),
        password: "hash".into(),
        role,
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        is_active: true,
        is_staff: role.is_staff(),
        is_superuser: false,
    }
}
