use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Employee,
    Hr,
    Manager,
    Admin,
}

/// Roles an admin/hr/manager may hand out through registration or updates.
pub const ASSIGNABLE_ROLES: [Role; 3] = [Role::Employee, Role::Hr, Role::Manager];

/// Roles a bootstrap superuser may carry.
pub const SUPERUSER_ROLES: [Role; 3] = [Role::Admin, Role::Hr, Role::Manager];

impl Role {
    /// Lower-cases and parses a raw role string.
    pub fn normalize(raw: &str) -> Option<Self> {
        raw.trim().to_lowercase().parse().ok()
    }

    /// Parses a role that registration and employee updates accept.
    pub fn assignable(raw: &str) -> Option<Self> {
        Self::normalize(raw).filter(|r| ASSIGNABLE_ROLES.contains(r))
    }

    pub fn superuser(raw: &str) -> Option<Self> {
        Self::normalize(raw).filter(|r| SUPERUSER_ROLES.contains(r))
    }

    /// admin, hr and manager may manage other employees' records.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Manager)
    }

    /// Staff flag derived from the role; stored on every write.
    pub fn is_staff(self) -> bool {
        self.is_privileged()
    }

    /// "Employee", "Hr", "Manager", "Admin" for user-facing messages.
    pub fn capitalized(self) -> String {
        let name = self.as_ref();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.to_lowercase().parse()
    }
}
