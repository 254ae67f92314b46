use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{AuthConfig, DEFAULT_TOKEN_TTL_HOURS};

use crate::server::AppState;

const DEV_SECRET: &str = "dev-secret";
const DEFAULT_SECRET_ENV: &str = "NEWSDIGEST_JWT_SECRET";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("application state is not managed")]
    Unconfigured,
}

impl AuthError {
    /// Client-facing reason for a rejected request.
    pub fn detail(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Not authenticated",
            AuthError::Expired => "Token expired",
            _ => "Invalid token",
        }
    }
}

/// Why the bearer guard rejected a request, cached on the request for the 401 catcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection(pub &'static str);

impl Default for AuthRejection {
    fn default() -> Self {
        AuthRejection("Invalid token")
    }
}

/// JWT claims we encode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub exp: usize,
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_hours,
        }
    }

    /// Secret from the environment variable named in config, `dev-secret` if unset.
    pub fn from_config(config: &AuthConfig) -> Self {
        let env_name = config.jwt_secret_env.as_deref().unwrap_or(DEFAULT_SECRET_ENV);
        let secret = std::env::var(env_name).unwrap_or_else(|_| {
            warn!(env = %env_name, "auth: JWT secret not set, using development secret");
            DEV_SECRET.to_string()
        });
        Self::new(
            secret.as_bytes(),
            config.token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS),
        )
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let exp = (now + self.ttl_hours * 3600).max(0) as usize;
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e),
            })
    }
}

/// Hash a password with Argon2 and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("auth: invalid password hash in db: {}", e);
            false
        }
    }
}

/// Caller identity taken from a valid `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<AppState>() else {
            return Outcome::Error((Status::InternalServerError, AuthError::Unconfigured));
        };

        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            return reject(req, AuthError::MissingToken);
        };

        match state.tokens.verify(token) {
            Ok(claims) => Outcome::Success(AuthUser {
                user_id: claims.user_id,
                email: claims.email,
            }),
            Err(e) => {
                warn!("auth: rejected bearer token: {}", e);
                reject(req, e)
            }
        }
    }
}

fn reject(req: &Request<'_>, error: AuthError) -> Outcome<AuthUser, AuthError> {
    req.local_cache(|| AuthRejection(error.detail()));
    Outcome::Error((Status::Unauthorized, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn tokens_carry_identity() {
        let signer = TokenSigner::new(b"secret", 720);
        let token = signer.issue("user-1", "a@example.com").expect("issue");
        let claims = signer.verify(&token).expect("verify");
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = TokenSigner::new(b"one", 1).issue("u", "e@x.io").expect("issue");
        let err = TokenSigner::new(b"two", 1).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn rejection_reasons_are_distinct() {
        assert_eq!(AuthError::MissingToken.detail(), "Not authenticated");
        assert_eq!(AuthError::Expired.detail(), "Token expired");
        let err = TokenSigner::new(b"s", 1).verify("not.a.token").unwrap_err();
        assert_eq!(err.detail(), "Invalid token");
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // two hours in the past, well beyond the default validation leeway
        let signer = TokenSigner::new(b"secret", -2);
        let token = signer.issue("u", "e@x.io").expect("issue");
        assert!(matches!(signer.verify(&token), Err(AuthError::Expired)));
    }
}
