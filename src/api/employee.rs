use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::{MessageResponse, not_blank};
use crate::{
    auth::auth::AuthUser,
    error::{AppError, invalid},
    model::role::{ASSIGNABLE_ROLES, Role},
    service::employee::{self as employee_service, ListFilter, Registration},
};

fn default_role() -> String {
    Role::Employee.to_string()
}

fn validate_assignable_role(role: &str) -> Result<(), ValidationError> {
    match Role::assignable(role) {
        Some(_) => Ok(()),
        None => Err(invalid("role", "Invalid role")),
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterEmployee {
    #[schema(example = "E100")]
    #[validate(
        length(min = 1, max = 20, message = "Ensure this field has between 1 and 20 characters."),
        custom(function = "not_blank")
    )]
    pub employee_id: String,

    #[schema(example = "s3cret-pass", format = Password)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,

    #[schema(example = "Jane")]
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub first_name: String,

    #[schema(example = "Doe")]
    #[serde(default)]
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub last_name: String,

    /// employee, hr or manager (any case); defaults to employee
    #[schema(example = "employee")]
    #[serde(default = "default_role")]
    #[validate(custom(function = "validate_assignable_role"))]
    pub role: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployee {
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub last_name: Option<String>,
    #[schema(example = "hr")]
    #[validate(custom(function = "validate_assignable_role"))]
    pub role: Option<String>,
    /// Ignored when empty.
    #[schema(format = Password)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Only employees with this role
    pub role: Option<String>,
    /// Substring of employee id, first name or last name
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterInfo {
    #[schema(example = "Send POST request to register a new employee, HR, or Manager")]
    pub message: String,
    pub roles: Vec<Role>,
}

/// Registration hint
#[utoipa::path(
    get,
    path = "/register-employee",
    responses(
        (status = 200, description = "Usage hint and assignable roles", body = RegisterInfo),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn register_info(auth: AuthUser) -> Result<impl Responder, AppError> {
    auth.require_privileged("add users")?;

    Ok(HttpResponse::Ok().json(RegisterInfo {
        message: "Send POST request to register a new employee, HR, or Manager".into(),
        roles: ASSIGNABLE_ROLES.to_vec(),
    }))
}

/// Register an employee, HR or manager
#[utoipa::path(
    post,
    path = "/register-employee",
    request_body = RegisterEmployee,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn register_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RegisterEmployee>,
) -> Result<impl Responder, AppError> {
    auth.require_privileged("add users")?;
    payload.validate()?;

    let payload = payload.into_inner();
    let role = Role::assignable(&payload.role)
        .ok_or_else(|| AppError::field("role", "role", "Invalid role"))?;

    let employee = employee_service::register(
        pool.get_ref(),
        Registration {
            employee_id: payload.employee_id.trim().to_string(),
            role,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(MessageResponse::new(format!(
        "{} registered successfully",
        employee.role.capitalized()
    ))))
}

/// List non-admin employees
#[utoipa::path(
    get,
    path = "/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Employees ordered by employee id", body = [crate::model::employee::EmployeeSummary]),
        (status = 401, description = "Unauthorized", body = crate::api::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<impl Responder, AppError> {
    auth.require_privileged("view users")?;

    let role = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(
            Role::normalize(raw).ok_or_else(|| AppError::field("role", "role", "Invalid role"))?,
        ),
        None => None,
    };

    let filter = ListFilter {
        role,
        search: query.search.clone(),
    };
    let employees = employee_service::list(pool.get_ref(), &filter).await?;

    Ok(HttpResponse::Ok().json(employees))
}

/// Update an employee, HR or manager
#[utoipa::path(
    put,
    path = "/employees/{employee_id}/update",
    params(("employee_id" = String, Path, description = "Login id of the employee")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<UpdateEmployee>,
) -> Result<impl Responder, AppError> {
    auth.require_privileged("edit users")?;
    payload.validate()?;

    let employee_id = path.into_inner();
    let payload = payload.into_inner();
    let role = payload.role.as_deref().and_then(Role::assignable);

    let changes =
        employee_service::hash_changes(payload.first_name, payload.last_name, role, payload.password)
            .await?;
    let employee = employee_service::update_employee(pool.get_ref(), &employee_id, changes).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "{} updated successfully",
        employee.role.capitalized()
    ))))
}

/// Delete an employee with their attendance and muster requests
#[utoipa::path(
    delete,
    path = "/employees/{employee_id}/delete",
    params(("employee_id" = String, Path, description = "Login id of the employee")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Forbidden", body = crate::api::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    auth.require_privileged("delete users")?;

    let employee_id = path.into_inner();
    let role = employee_service::delete_employee(pool.get_ref(), &employee_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "{} deleted successfully",
        role.capitalized()
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(body: serde_json::Value) -> RegisterEmployee {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn role_defaults_to_employee() {
        let payload = register(serde_json::json!({"employee_id": "E100", "password": "pw"}));
        assert_eq!(payload.role, "employee");
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn mixed_case_roles_are_accepted() {
        let payload = register(serde_json::json!({"employee_id": "E1", "password": "pw", "role": "MANAGER"}));
        assert!(payload.validate().is_ok());
        assert_eq!(Role::assignable(&payload.role), Some(Role::Manager));
    }

    #[test]
    fn admin_and_unknown_roles_are_rejected() {
        for role in ["admin", "Admin", "ceo"] {
            let payload = register(serde_json::json!({"employee_id": "E1", "password": "pw", "role": role}));
            let errors = payload.validate().unwrap_err();
            assert!(errors.field_errors().contains_key("role"), "{role}");
        }
    }

    #[test]
    fn blank_and_long_ids_are_rejected() {
        let blank = register(serde_json::json!({"employee_id": "   ", "password": "pw"}));
        assert!(blank.validate().unwrap_err().field_errors().contains_key("employee_id"));

        let long = register(serde_json::json!({"employee_id": "X".repeat(21), "password": "pw"}));
        assert!(long.validate().unwrap_err().field_errors().contains_key("employee_id"));
    }

    #[test]
    fn update_validates_only_present_fields() {
        let empty: UpdateEmployee = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.validate().is_ok());

        let bad: UpdateEmployee = serde_json::from_value(serde_json::json!({"role": "admin"})).unwrap();
        assert!(bad.validate().unwrap_err().field_errors().contains_key("role"));
    }
}
