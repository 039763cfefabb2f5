// Access/refresh token issuance and verification for the admin session.
// There's no literal precedent for this file in the teacher's retrieval
// slice (auth/jwt.rs is referenced by its auth/mod.rs but wasn't part of
// the pack), so this follows jsonwebtoken's own idiom.

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::JwtConfig;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the admin user id (nil UUID for the single configured admin).
    pub sub: Uuid,
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_tokens(config: &JwtConfig, subject: Uuid) -> Result<IssuedTokens, JwtError> {
    let access_token = issue_token(config, subject, TokenKind::Access, config.access_token_lifetime)?;
    let refresh_token = issue_token(config, subject, TokenKind::Refresh, config.refresh_token_lifetime)?;
    Ok(IssuedTokens { access_token, refresh_token })
}

fn issue_token(
    config: &JwtConfig,
    subject: Uuid,
    kind: TokenKind,
    lifetime: std::time::Duration,
) -> Result<String, JwtError> {
    let now = Utc::now();
    let exp = now + ChronoDuration::from_std(lifetime).unwrap_or(ChronoDuration::minutes(15));
    let claims = Claims { sub: subject, kind, exp: exp.timestamp(), iat: now.timestamp() };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.secret.as_bytes()))
        .map_err(JwtError::Invalid)
}

pub fn verify_token(config: &JwtConfig, token: &str, expected_kind: TokenKind) -> Result<Claims, JwtError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(e),
    })?;

    if data.claims.kind != expected_kind {
        return Err(JwtError::Invalid(jsonwebtoken::errors::ErrorKind::InvalidToken.into()));
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-at-least-32-bytes-long".into(),
            access_token_lifetime: std::time::Duration::from_secs(900),
            refresh_token_lifetime: std::time::Duration::from_secs(2_592_000),
        }
    }

    #[test]
    fn issued_access_token_verifies_as_access() {
        let config = test_config();
        let subject = Uuid::new_v4();
        let tokens = issue_tokens(&config, subject).unwrap();

        let claims = verify_token(&config, &tokens.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, subject);
    }

    #[test]
    fn access_token_rejected_when_refresh_expected() {
        let config = test_config();
        let tokens = issue_tokens(&config, Uuid::new_v4()).unwrap();
        assert!(verify_token(&config, &tokens.access_token, TokenKind::Refresh).is_err());
    }

    #[test]
    fn tampered_secret_fails_verification() {
        let config = test_config();
        let tokens = issue_tokens(&config, Uuid::new_v4()).unwrap();

        let other = JwtConfig { secret: "a-completely-different-secret-value".into(), ..test_config() };
        assert!(verify_token(&other, &tokens.access_token, TokenKind::Access).is_err());
    }
}
