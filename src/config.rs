//! Runtime configuration for the security manager and its collaborators.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS: u64 = 15 * 60;
const DEFAULT_SESSION_ABSOLUTE_TIMEOUT_SECONDS: u64 = 30 * 60;
const DEFAULT_CREDENTIALS_CACHE_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_AUTHZ_INFO_CACHE_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_CACHE_MAX_CAPACITY: u64 = 10_000;

/// How the authenticator combines the outcomes of several realms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationPolicy {
    /// Realms are tried in order, the first success wins.
    #[default]
    FirstSuccessful,
    /// Every supporting realm is tried, at least one must succeed.
    AtLeastOne,
    /// Every supporting realm must succeed.
    AllSuccessful,
}

impl AuthenticationPolicy {
    /// Parse the CLI/env spelling of a policy.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "first" | "first_successful" => Some(Self::FirstSuccessful),
            "at_least_one" | "any" => Some(Self::AtLeastOne),
            "all" | "all_successful" => Some(Self::AllSuccessful),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    session_idle_timeout: Duration,
    session_absolute_timeout: Duration,
    credentials_cache_ttl: Duration,
    authz_info_cache_ttl: Duration,
    cache_max_capacity: u64,
    authentication_policy: AuthenticationPolicy,
    session_creation_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS),
            session_absolute_timeout: Duration::from_secs(DEFAULT_SESSION_ABSOLUTE_TIMEOUT_SECONDS),
            credentials_cache_ttl: Duration::from_secs(DEFAULT_CREDENTIALS_CACHE_TTL_SECONDS),
            authz_info_cache_ttl: Duration::from_secs(DEFAULT_AUTHZ_INFO_CACHE_TTL_SECONDS),
            cache_max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
            authentication_policy: AuthenticationPolicy::default(),
            session_creation_enabled: true,
        }
    }

    #[must_use]
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_absolute_timeout(mut self, timeout: Duration) -> Self {
        self.session_absolute_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_credentials_cache_ttl(mut self, ttl: Duration) -> Self {
        self.credentials_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_authz_info_cache_ttl(mut self, ttl: Duration) -> Self {
        self.authz_info_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cache_max_capacity(mut self, capacity: u64) -> Self {
        self.cache_max_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_authentication_policy(mut self, policy: AuthenticationPolicy) -> Self {
        self.authentication_policy = policy;
        self
    }

    #[must_use]
    pub fn with_session_creation_enabled(mut self, enabled: bool) -> Self {
        self.session_creation_enabled = enabled;
        self
    }

    #[must_use]
    pub fn session_idle_timeout(&self) -> Duration {
        self.session_idle_timeout
    }

    #[must_use]
    pub fn session_absolute_timeout(&self) -> Duration {
        self.session_absolute_timeout
    }

    #[must_use]
    pub fn credentials_cache_ttl(&self) -> Duration {
        self.credentials_cache_ttl
    }

    #[must_use]
    pub fn authz_info_cache_ttl(&self) -> Duration {
        self.authz_info_cache_ttl
    }

    #[must_use]
    pub fn cache_max_capacity(&self) -> u64 {
        self.cache_max_capacity
    }

    #[must_use]
    pub fn authentication_policy(&self) -> AuthenticationPolicy {
        self.authentication_policy
    }

    #[must_use]
    pub fn session_creation_enabled(&self) -> bool {
        self.session_creation_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_config_defaults_and_overrides() {
        let config = SecurityConfig::new();

        assert_eq!(
            config.session_idle_timeout(),
            Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.session_absolute_timeout(),
            Duration::from_secs(DEFAULT_SESSION_ABSOLUTE_TIMEOUT_SECONDS)
        );
        assert_eq!(config.cache_max_capacity(), DEFAULT_CACHE_MAX_CAPACITY);
        assert_eq!(
            config.authentication_policy(),
            AuthenticationPolicy::FirstSuccessful
        );
        assert!(config.session_creation_enabled());

        let config = config
            .with_session_idle_timeout(Duration::from_secs(60))
            .with_session_absolute_timeout(Duration::from_secs(120))
            .with_credentials_cache_ttl(Duration::from_secs(1))
            .with_authz_info_cache_ttl(Duration::from_secs(2))
            .with_cache_max_capacity(42)
            .with_authentication_policy(AuthenticationPolicy::AllSuccessful)
            .with_session_creation_enabled(false);

        assert_eq!(config.session_idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.session_absolute_timeout(), Duration::from_secs(120));
        assert_eq!(config.credentials_cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.authz_info_cache_ttl(), Duration::from_secs(2));
        assert_eq!(config.cache_max_capacity(), 42);
        assert_eq!(
            config.authentication_policy(),
            AuthenticationPolicy::AllSuccessful
        );
        assert!(!config.session_creation_enabled());
    }

    #[test]
    fn policy_names() {
        assert_eq!(
            AuthenticationPolicy::from_name("first"),
            Some(AuthenticationPolicy::FirstSuccessful)
        );
        assert_eq!(
            AuthenticationPolicy::from_name("at-least-one"),
            Some(AuthenticationPolicy::AtLeastOne)
        );
        assert_eq!(
            AuthenticationPolicy::from_name("ALL_SUCCESSFUL"),
            Some(AuthenticationPolicy::AllSuccessful)
        );
        assert_eq!(AuthenticationPolicy::from_name("majority"), None);
    }
}
