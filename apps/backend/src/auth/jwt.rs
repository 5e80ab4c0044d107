use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::session::UserId;
use crate::state::security_config::SecurityConfig;
use crate::AppError;

/// Access-token lifetime.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Claims carried by access tokens. `sub` is the numeric user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.sub
            .parse::<UserId>()
            .map_err(|_| AppError::unauthorized("token subject is not a user id"))
    }
}

/// Mint a token for `user_id`. Issuing belongs to the account service; this
/// is used by tooling and tests.
pub fn mint_access_token(
    user_id: UserId,
    now: SystemTime,
    security: &SecurityConfig,
) -> Result<String, AppError> {
    let iat = now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AppError::internal("Failed to get current time"))?
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id.to_string(),
        iat,
        exp: iat + ACCESS_TOKEN_TTL_SECS,
    };

    encode(
        &Header::new(security.algorithm),
        &claims,
        &EncodingKey::from_secret(&security.jwt_secret),
    )
    .map_err(|e| AppError::internal(format!("Failed to encode JWT: {e}")))
}

/// Verify a token and return its claims; every failure is 401.
pub fn verify_access_token(token: &str, security: &SecurityConfig) -> Result<Claims, AppError> {
    let validation = Validation::new(security.algorithm);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&security.jwt_secret),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::unauthorized("token expired"),
        ErrorKind::InvalidSignature => AppError::unauthorized("invalid token signature"),
        _ => AppError::unauthorized("invalid token"),
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn security() -> SecurityConfig {
        SecurityConfig::new("test_secret_key_for_testing_purposes_only".as_bytes())
    }

    #[test]
    fn mint_then_verify_yields_user_id() {
        let token = mint_access_token(42, SystemTime::now(), &security()).unwrap();
        let claims = verify_access_token(&token, &security()).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.exp, claims.iat + ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let issued = SystemTime::now() - Duration::from_secs(20 * 60);
        let token = mint_access_token(42, issued, &security()).unwrap();
        let err = verify_access_token(&token, &security()).unwrap_err();
        assert_eq!(err.detail(), "token expired");
        assert_eq!(err.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_access_token(42, SystemTime::now(), &security()).unwrap();
        let other = SecurityConfig::new("another_secret_entirely".as_bytes());
        assert!(verify_access_token(&token, &other).is_err());
    }
}
