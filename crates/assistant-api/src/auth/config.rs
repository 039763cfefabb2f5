// Admin-plane authentication configuration, loaded from environment
// variables. Distinct from `assistant_contracts::connector::AuthMode`,
// which describes how a *connector* authenticates to its source app — this
// enum gates the admin HTTP surface itself, so it gets its own name to
// avoid the two being confused at a call site.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminAuthMode {
    /// No authentication required (local development).
    #[default]
    None,
    /// Admin email/password and API keys, no self-service signup.
    Admin,
    /// Everything `Admin` has, plus API keys issued to regular users.
    Full,
}

impl AdminAuthMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => AdminAuthMode::Admin,
            "full" => AdminAuthMode::Full,
            _ => AdminAuthMode::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    /// Argon2 hash of the admin password, not the plaintext.
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AdminAuthMode,
    pub jwt: JwtConfig,
    pub admin: Option<AdminConfig>,
    /// SHA-256 hash of the single admin-managed API key, if one has been
    /// minted (`AUTH_API_KEY_HASH`). There's no per-user key directory in
    /// this workspace's schema, so `Full` mode checks the same key as
    /// `Admin` rather than looking up a per-user one.
    pub api_key_hash: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { mode: AdminAuthMode::None, jwt: JwtConfig::default(), admin: None, api_key_hash: None }
    }
}

impl AuthConfig {
    /// Loads from `AUTH_MODE`, `AUTH_JWT_SECRET` (`AUTH_ACCESS_TOKEN_LIFETIME`/
    /// `AUTH_REFRESH_TOKEN_LIFETIME` in seconds), and `ADMIN_EMAIL`/
    /// `ADMIN_PASSWORD_HASH`. In `None` mode a missing JWT secret is fine —
    /// a random one is generated so the process can still boot for local
    /// development, where no token is ever actually checked.
    pub fn from_env() -> Self {
        let mode = std::env::var("AUTH_MODE").map(|s| AdminAuthMode::from_str(&s)).unwrap_or_default();

        let secret = std::env::var("AUTH_JWT_SECRET").unwrap_or_else(|_| {
            if mode == AdminAuthMode::None {
                use rand::Rng;
                let bytes: [u8; 32] = rand::thread_rng().gen();
                hex::encode(bytes)
            } else {
                tracing::warn!("AUTH_JWT_SECRET not set, using insecure default");
                "insecure-dev-secret-change-me".to_string()
            }
        });

        let access_token_lifetime = std::env::var("AUTH_ACCESS_TOKEN_LIFETIME")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(15 * 60));

        let refresh_token_lifetime = std::env::var("AUTH_REFRESH_TOKEN_LIFETIME")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30 * 24 * 60 * 60));

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD_HASH")) {
            (Ok(email), Ok(password_hash)) if !email.is_empty() && !password_hash.is_empty() => {
                Some(AdminConfig { email, password_hash })
            }
            _ => None,
        };

        let api_key_hash = std::env::var("AUTH_API_KEY_HASH").ok().filter(|h| !h.is_empty());

        Self { mode, jwt: JwtConfig { secret, access_token_lifetime, refresh_token_lifetime }, admin, api_key_hash }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != AdminAuthMode::None
    }

    /// Whether a request may authenticate via `Authorization: ApiKey <key>`
    /// instead of a `Bearer` JWT — true in `Admin`/`Full` mode once a key has
    /// actually been minted (`AUTH_API_KEY_HASH` set).
    pub fn api_key_auth_enabled(&self) -> bool {
        matches!(self.mode, AdminAuthMode::Admin | AdminAuthMode::Full) && self.api_key_hash.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_is_case_insensitive_and_falls_back_to_none() {
        assert_eq!(AdminAuthMode::from_str("ADMIN"), AdminAuthMode::Admin);
        assert_eq!(AdminAuthMode::from_str("full"), AdminAuthMode::Full);
        assert_eq!(AdminAuthMode::from_str("bogus"), AdminAuthMode::None);
    }

    #[test]
    fn default_config_has_auth_disabled() {
        let config = AuthConfig::default();
        assert!(!config.is_enabled());
        assert!(!config.api_key_auth_enabled());
    }
}
