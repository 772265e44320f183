//! Gateway settings.

use std::time::Duration;

use super::secret::SecretScheme;

const DEFAULT_REALM: &str = "fieldgate";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_FORM_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    realm: String,
    session_ttl_seconds: u64,
    session_cookie_secure: bool,
    secret_scheme: SecretScheme,
    store_timeout: Duration,
    max_form_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            secret_scheme: SecretScheme::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }

    #[must_use]
    pub fn with_realm(mut self, realm: String) -> Self {
        self.realm = realm;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_secret_scheme(mut self, scheme: SecretScheme) -> Self {
        self.secret_scheme = scheme;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_form_bytes(mut self, bytes: usize) -> Self {
        self.max_form_bytes = bytes;
        self
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn secret_scheme(&self) -> SecretScheme {
        self.secret_scheme
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn max_form_bytes(&self) -> usize {
        self.max_form_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = GatewayConfig::new();
        assert_eq!(config.realm(), DEFAULT_REALM);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(!config.session_cookie_secure());
        assert_eq!(config.secret_scheme(), SecretScheme::Plaintext);
        assert_eq!(config.store_timeout(), DEFAULT_STORE_TIMEOUT);

        let config = config
            .with_realm("omk".to_string())
            .with_session_ttl_seconds(60)
            .with_session_cookie_secure(true)
            .with_secret_scheme(SecretScheme::Argon2)
            .with_store_timeout(Duration::from_millis(250))
            .with_max_form_bytes(512);

        assert_eq!(config.realm(), "omk");
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert!(config.session_cookie_secure());
        assert_eq!(config.secret_scheme(), SecretScheme::Argon2);
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_form_bytes(), 512);
    }
}
