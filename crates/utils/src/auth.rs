//! Verification of access tokens issued by the hosted auth provider.
//!
//! The backend never issues or refreshes tokens; it only checks the signature
//! and expiry so handlers can trust the `sub` claim as a stable user id.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user id assigned by the auth provider.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn make_token(sub: &str, secret: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_valid_token() {
        let token = make_token("user-1", "secret", Duration::hours(1));
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = make_token("user-1", "secret", Duration::hours(1));
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = make_token("user-1", "secret", Duration::hours(-1));
        assert!(verify_token(&token, "secret").is_err());
    }
}
