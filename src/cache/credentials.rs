//! Credentials cache handler and its pluggable cache/key resolvers.
//!
//! "No cached value" is a normal outcome (`Ok(None)`); "cannot resolve the
//! cache" is a wiring defect and always an error.

use std::sync::Arc;
use tracing::debug;

use super::{Cache, CacheEntry, CacheHandler, CacheScope, ScopedCache};
use crate::authc::{Account, AuthenticationToken};
use crate::error::{Result, SecurityError};

/// What a resolver is asked to map to a cache or a key.
#[derive(Clone, Copy, Debug)]
pub enum CacheLookup<'a> {
    Token(&'a dyn AuthenticationToken),
    AccountId(&'a str),
}

pub trait CredentialsCacheResolver: Send + Sync {
    fn get_credentials_cache(&self, lookup: &CacheLookup<'_>) -> Option<Arc<dyn Cache>>;
}

pub trait CredentialsCacheKeyResolver: Send + Sync {
    fn get_credentials_cache_key(&self, lookup: &CacheLookup<'_>) -> Option<String>;
}

/// Resolves every lookup to the `credentials` scope of a cache handler, the
/// same region realms read credentials from.
#[derive(Clone)]
pub struct ScopedCacheResolver {
    cache: Arc<dyn Cache>,
}

impl ScopedCacheResolver {
    #[must_use]
    pub fn new(handler: Arc<dyn CacheHandler>) -> Self {
        Self {
            cache: Arc::new(ScopedCache::new(handler, CacheScope::Credentials)),
        }
    }
}

impl CredentialsCacheResolver for ScopedCacheResolver {
    fn get_credentials_cache(&self, _lookup: &CacheLookup<'_>) -> Option<Arc<dyn Cache>> {
        Some(Arc::clone(&self.cache))
    }
}

/// Keys credentials by the token identifier (username) or the account id.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentifierKeyResolver;

impl CredentialsCacheKeyResolver for IdentifierKeyResolver {
    fn get_credentials_cache_key(&self, lookup: &CacheLookup<'_>) -> Option<String> {
        let key = match lookup {
            CacheLookup::Token(token) => token.identifier(),
            CacheLookup::AccountId(account_id) => account_id,
        };
        (!key.is_empty()).then(|| key.to_string())
    }
}

#[derive(Clone, Default)]
pub struct CredentialsCacheHandler {
    credentials_cache_resolver: Option<Arc<dyn CredentialsCacheResolver>>,
    credentials_cache_key_resolver: Option<Arc<dyn CredentialsCacheKeyResolver>>,
}

impl CredentialsCacheHandler {
    #[must_use]
    pub fn new(
        cache_resolver: Arc<dyn CredentialsCacheResolver>,
        key_resolver: Arc<dyn CredentialsCacheKeyResolver>,
    ) -> Self {
        Self {
            credentials_cache_resolver: Some(cache_resolver),
            credentials_cache_key_resolver: Some(key_resolver),
        }
    }

    /// Handler over the `credentials` scope of `handler`, keyed by identifier.
    #[must_use]
    pub fn for_cache_handler(handler: Arc<dyn CacheHandler>) -> Self {
        Self::new(
            Arc::new(ScopedCacheResolver::new(handler)),
            Arc::new(IdentifierKeyResolver),
        )
    }

    #[must_use]
    pub fn with_cache_resolver(mut self, resolver: Option<Arc<dyn CredentialsCacheResolver>>) -> Self {
        self.credentials_cache_resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_key_resolver(mut self, resolver: Option<Arc<dyn CredentialsCacheKeyResolver>>) -> Self {
        self.credentials_cache_key_resolver = resolver;
        self
    }

    /// Look up the cached account for `token`.
    ///
    /// # Errors
    /// `GetCachedCredentials` when a resolver is unset or the cache or key does not resolve.
    pub fn get_cached_credentials(
        &self,
        token: &dyn AuthenticationToken,
    ) -> Result<Option<Arc<Account>>> {
        let (Some(cache_resolver), Some(key_resolver)) = (
            &self.credentials_cache_resolver,
            &self.credentials_cache_key_resolver,
        ) else {
            return Err(SecurityError::GetCachedCredentials(
                "credentials cache resolvers are not configured".to_string(),
            ));
        };

        let lookup = CacheLookup::Token(token);
        let (Some(cache), Some(key)) = (
            cache_resolver.get_credentials_cache(&lookup),
            key_resolver.get_credentials_cache_key(&lookup),
        ) else {
            return Err(SecurityError::GetCachedCredentials(format!(
                "unable to resolve credentials cache or key for [{}]",
                token.identifier()
            )));
        };

        let cached = cache.get(&key).and_then(CacheEntry::into_account);
        debug!("cached credentials for [{key}]: hit={}", cached.is_some());
        Ok(cached)
    }

    /// Cache `account` under the key resolved for `token`.
    ///
    /// # Errors
    /// `CacheCredentials` when a resolver is unset or the cache or key does not resolve.
    pub fn cache_credentials(
        &self,
        token: &dyn AuthenticationToken,
        account: Arc<Account>,
    ) -> Result<()> {
        let (Some(cache_resolver), Some(key_resolver)) = (
            &self.credentials_cache_resolver,
            &self.credentials_cache_key_resolver,
        ) else {
            return Err(SecurityError::CacheCredentials(
                "credentials cache resolvers are not configured".to_string(),
            ));
        };

        let lookup = CacheLookup::Token(token);
        let (Some(cache), Some(key)) = (
            cache_resolver.get_credentials_cache(&lookup),
            key_resolver.get_credentials_cache_key(&lookup),
        ) else {
            return Err(SecurityError::CacheCredentials(format!(
                "unable to resolve credentials cache or key for [{}]",
                token.identifier()
            )));
        };

        cache.set(&key, CacheEntry::Account(account));
        Ok(())
    }

    /// Evict and return the cached account for `account_id`.
    ///
    /// # Errors
    /// `ClearCacheCredentials` when a resolver is unset. An unresolvable cache
    /// or key is tolerated and yields `Ok(None)`.
    pub fn clear_cached_credentials(&self, account_id: &str) -> Result<Option<Arc<Account>>> {
        let (Some(cache_resolver), Some(key_resolver)) = (
            &self.credentials_cache_resolver,
            &self.credentials_cache_key_resolver,
        ) else {
            return Err(SecurityError::ClearCacheCredentials(
                "credentials cache resolvers are not configured".to_string(),
            ));
        };

        let lookup = CacheLookup::AccountId(account_id);
        let (Some(cache), Some(key)) = (
            cache_resolver.get_credentials_cache(&lookup),
            key_resolver.get_credentials_cache_key(&lookup),
        ) else {
            return Ok(None);
        };

        Ok(cache.delete(&key).and_then(CacheEntry::into_account))
    }
}
