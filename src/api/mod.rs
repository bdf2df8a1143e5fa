use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::error::invalid;

pub mod attendance;
pub mod employee;
pub mod muster_request;

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Employee registered successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Only admin/hr/manager can view users")]
    pub error: String,
}

/// Rejects strings made only of whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "This field may not be blank."));
    }
    Ok(())
}
