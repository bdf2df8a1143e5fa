use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::{
    error::AppError,
    model::{employee::Employee, role::Role},
};

/// Request-scoped identity placed in the request extensions by
/// `auth_middleware`, taken from the employee row rather than the token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Primary key of the employees row.
    pub id: u64,
    pub employee_id: String,
    pub role: Role,
}

impl From<Employee> for AuthUser {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            employee_id: employee.employee_id,
            role: employee.role,
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Authentication required".into())),
        )
    }
}

impl AuthUser {
    /// Gate for admin/hr/manager-only operations. `action` completes the
    /// sentence "Only admin/hr/manager can ...".
    pub fn require_privileged(&self, action: &str) -> Result<(), AppError> {
        if self.role.is_privileged() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Only admin/hr/manager can {action}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 1,
            employee_id: "E1".into(),
            role,
        }
    }

    #[test]
    fn privileged_roles_pass_the_gate() {
        for role in [Role::Admin, Role::Hr, Role::Manager] {
            assert!(user(role).require_privileged("view users").is_ok());
        }
    }

    #[test]
    fn employees_are_forbidden() {
        let err = user(Role::Employee)
            .require_privileged("view users")
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Only admin/hr/manager can view users"));
    }
}
