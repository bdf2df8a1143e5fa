use serde::{Deserialize, Serialize};

use crate::model::role::Role;

/// JWT payload; `sub` is the employee's login id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Primary key of the employees row.
    pub uid: u64,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}
