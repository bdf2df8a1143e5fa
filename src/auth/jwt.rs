use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::{model::employee::Employee, models::Claims};

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

pub fn generate_access_token(employee: &Employee, secret: &str, ttl: usize) -> Result<String, Error> {
    let claims = Claims {
        sub: employee.employee_id.clone(),
        uid: employee.id,
        role: employee.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{employee::sample, role::Role};

    #[test]
    fn token_carries_identity_and_role() {
        let employee = sample(Role::Manager);
        let token = generate_access_token(&employee, "secret", 60).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "E100");
        assert_eq!(claims.uid, employee.id);
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&sample(Role::Employee), "secret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
