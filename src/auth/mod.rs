pub mod jwt;
pub mod middleware;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt::JwtService;
use crate::models::RoleType;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    AccessToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub role: RoleType,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// Seconds until the token expires
    pub expires_in: i64,
    pub access_token: String,
}

pub struct AuthService {
    jwt: JwtService,
    expiration_secs: i64,
}

impl AuthService {
    pub fn new(jwt_secret: &str, expiration_secs: i64) -> Self {
        Self {
            jwt: JwtService::new(jwt_secret),
            expiration_secs,
        }
    }

    pub fn generate_access_token(&self, user_id: Uuid, role: RoleType) -> Result<TokenPayload> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            role,
            token_type: TokenType::AccessToken,
            iat: now,
            exp: now + self.expiration_secs,
        };

        Ok(TokenPayload {
            expires_in: self.expiration_secs,
            access_token: self.jwt.encode_token(&claims)?,
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.jwt.decode_token(token)
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
    }

    /// False when either side is missing or the hash is malformed.
    pub fn verify_password(&self, password: &str, hash: Option<&str>) -> bool {
        let Some(hash) = hash.filter(|h| !h.is_empty()) else {
            return false;
        };
        if password.is_empty() {
            return false;
        }
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret", 3600)
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service();
        let user_id = Uuid::new_v4();
        let payload = auth.generate_access_token(user_id, RoleType::Admin).unwrap();
        assert_eq!(payload.expires_in, 3600);

        let claims = auth.verify_token(&payload.access_token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, RoleType::Admin);
        assert_eq!(claims.token_type, TokenType::AccessToken);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let payload = AuthService::new("other", 3600)
            .generate_access_token(Uuid::new_v4(), RoleType::User)
            .unwrap();
        let err = service().verify_token(&payload.access_token).unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let payload = AuthService::new("test-secret", -600)
            .generate_access_token(Uuid::new_v4(), RoleType::User)
            .unwrap();
        assert!(service().verify_token(&payload.access_token).is_err());
    }

    #[test]
    fn test_non_access_token_type_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "userId": Uuid::new_v4(),
            "role": "USER",
            "type": "REFRESH_TOKEN",
            "iat": now,
            "exp": now + 600,
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = service().verify_token(&token).unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn test_password_hashing() {
        let auth = service();
        let hash = auth.hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(auth.verify_password("correct horse", Some(&hash)));
        assert!(!auth.verify_password("wrong horse", Some(&hash)));
        assert!(!auth.verify_password("", Some(&hash)));
        assert!(!auth.verify_password("correct horse", None));
        assert!(!auth.verify_password("correct horse", Some("not-a-hash")));
    }
}
