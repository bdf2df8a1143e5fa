use crate::api::attendance::StampResponse;
use crate::api::employee::{RegisterEmployee, RegisterInfo, UpdateEmployee};
use crate::api::muster_request::{CreateMuster, EditMuster, MusterResponse};
use crate::api::{ErrorResponse, MessageResponse};
use crate::auth::handlers::{LoginReqDto, LoginResponse, ProfileUpdate};
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, AttendanceSummary, Stamps};
use crate::model::employee::EmployeeSummary;
use crate::model::muster_request::{MusterAction, MusterRequest, MusterStatus};
use crate::model::role::Role;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Muster API",
        version = "1.0.0",
        description = r#"
## Attendance & Muster Backend

Employees stamp their working day and ask for corrections; admin, HR and
managers manage accounts and review the corrections.

### Features
- **Accounts**: login, registration of employees/HR/managers, edit, delete, self-service profile
- **Attendance**: clock in/out, break in/out, lunch in/out, daily summary
- **Muster requests**: submit, list, edit/resubmit, approve/reject

### Security
Every endpoint except `/login` expects `Authorization: Bearer <access_token>`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::update_profile,

        crate::api::employee::register_info,
        crate::api::employee::register_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::break_in,
        crate::api::attendance::break_out,
        crate::api::attendance::lunch_in,
        crate::api::attendance::lunch_out,
        crate::api::attendance::attendance_summary,

        crate::api::muster_request::create_muster_request,
        crate::api::muster_request::list_muster_requests,
        crate::api::muster_request::edit_muster_request,
        crate::api::muster_request::approve_muster_request,
        crate::api::muster_request::reject_muster_request
    ),
    components(
        schemas(
            Role,
            LoginReqDto,
            LoginResponse,
            ProfileUpdate,
            MessageResponse,
            ErrorResponse,
            RegisterEmployee,
            RegisterInfo,
            UpdateEmployee,
            EmployeeSummary,
            Stamps,
            AttendanceRecord,
            AttendanceEntry,
            AttendanceSummary,
            StampResponse,
            MusterAction,
            MusterStatus,
            MusterRequest,
            CreateMuster,
            EditMuster,
            MusterResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and self-service profile"),
        (name = "Employee", description = "Account management for admin/hr/manager"),
        (name = "Attendance", description = "Daily stamping and summary"),
        (name = "Muster", description = "Attendance correction requests"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in ["/login", "/employees/{employee_id}/update", "/muster-request/{request_id}/approve"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
