//! Admin authentication: a single configured account, argon2 password
//! verification and HS256 JWTs for the admin API.

use axum::{Json, extract::State};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

/// Authentication configuration for the single admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Whether the admin API requires authentication. Disable only for
    /// local development.
    #[serde(default = "default_auth_enabled")]
    pub enabled: bool,

    /// Admin username.
    #[serde(default)]
    pub username: String,

    /// Argon2 PHC hash of the admin password.
    #[serde(default)]
    pub password_hash: String,

    /// Secret for signing and verifying tokens.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

fn default_auth_enabled() -> bool {
    false
}

fn default_token_ttl_secs() -> u64 {
    3600 // 1 hour
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_auth_enabled(),
            username: String::new(),
            password_hash: String::new(),
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            return Err("auth.username must not be empty".into());
        }
        if self.password_hash.is_empty() {
            return Err("auth.password_hash must not be empty".into());
        }
        PasswordHash::new(&self.password_hash)
            .map_err(|e| format!("auth.password_hash is not a valid PHC string: {e}"))?;
        if self.jwt_secret.len() < 16 {
            return Err("auth.jwt_secret must be at least 16 bytes".into());
        }
        if self.token_ttl_secs == 0 {
            return Err("auth.token_ttl_secs must be > 0".into());
        }
        Ok(())
    }
}

/// JWT claims carried by admin tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
}

/// Authentication errors. All credential problems collapse into one
/// variant so responses never leak which part was wrong.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Token issuance and verification for the configured admin account.
pub struct AuthService {
    config: AuthConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self {
            config,
            encoding,
            decoding,
            validation,
        }
    }

    /// Whether the admin API requires a token at all.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Verifies the credentials and issues a token on success.
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        if username != self.config.username {
            return Err(AuthError::InvalidCredentials);
        }
        let hash = PasswordHash::new(&self.config.password_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| AuthError::InvalidCredentials)?;
        self.issue_token()
    }

    /// Issues a token for the configured admin.
    pub fn issue_token(&self) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: self.config.username.clone(),
            role: "admin".to_string(),
            iat: now,
            exp: now + self.config.token_ttl_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verifies a bearer token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".into(),
        ));
    }
    match state.auth.login(&payload.username, &payload.password) {
        Ok(token) => Ok(Json(LoginResponse { token })),
        Err(AuthError::InvalidCredentials) => {
            Err(ApiError::Unauthorized("invalid credentials".into()))
        }
        Err(e) => {
            tracing::error!(error = %e, "token issuance failed");
            Err(ApiError::Internal("login failed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::PasswordHasher;
    use argon2::password_hash::{SaltString, rand_core::OsRng};

    fn test_config(password: &str) -> AuthConfig {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string();
        AuthConfig {
            enabled: true,
            username: "admin".into(),
            password_hash: hash,
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
            token_ttl_secs: 3600,
        }
    }

    #[test]
    fn login_roundtrip() {
        let service = AuthService::new(test_config("hunter2"));
        let token = service.login("admin", "hunter2").unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn wrong_password_is_rejected() {
        let service = AuthService::new(test_config("hunter2"));
        assert!(matches!(
            service.login("admin", "letmein"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn wrong_username_is_rejected() {
        let service = AuthService::new(test_config("hunter2"));
        assert!(matches!(
            service.login("root", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let service = AuthService::new(test_config("hunter2"));
        let mut other_config = test_config("hunter2");
        other_config.jwt_secret = "ffffffffffffffffffffffffffffffff".into();
        let other = AuthService::new(other_config);

        let token = other.issue_token().unwrap();
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn config_validation_catches_bad_hash() {
        let mut cfg = test_config("x");
        cfg.password_hash = "plaintext".into();
        assert!(cfg.validate().is_err());
    }
}
