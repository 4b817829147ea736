//! Keyed, scoped cache abstraction with get-or-create semantics.
//!
//! Flow Overview: realms read credentials and authorization info through a
//! [`CacheHandler`] scope (`credentials`, `authz_info`), populating on miss
//! from the account store. The session manager keeps live session records in
//! the `session` scope. Invalidation is explicit (`delete`), driven by login,
//! logout, session stop and session expiration.

pub mod credentials;
mod moka;

pub use self::credentials::{
    CacheLookup, CredentialsCacheHandler, CredentialsCacheKeyResolver, CredentialsCacheResolver,
    IdentifierKeyResolver, ScopedCacheResolver,
};
pub use self::moka::MokaCacheHandler;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::authc::Account;
use crate::authz::AuthorizationInfo;
use crate::session::SessionRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Credentials,
    AuthzInfo,
    Session,
}

impl CacheScope {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::AuthzInfo => "authz_info",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached value. Entries are cheap to clone, they share the payload.
#[derive(Clone, Debug)]
pub enum CacheEntry {
    Account(Arc<Account>),
    AuthzInfo(Arc<AuthorizationInfo>),
    Session(Arc<Mutex<SessionRecord>>),
}

impl CacheEntry {
    #[must_use]
    pub fn into_account(self) -> Option<Arc<Account>> {
        match self {
            Self::Account(account) => Some(account),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_authz_info(self) -> Option<Arc<AuthorizationInfo>> {
        match self {
            Self::AuthzInfo(info) => Some(info),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_session(self) -> Option<Arc<Mutex<SessionRecord>>> {
        match self {
            Self::Session(session) => Some(session),
            _ => None,
        }
    }
}

/// Shared cache used by realms and the session manager.
///
/// Implementations must be safe for concurrent use on different keys, and
/// `get_or_create` must run the factory at most once per key when several
/// callers miss on the same key at the same time.
pub trait CacheHandler: Send + Sync {
    fn get(&self, scope: CacheScope, key: &str) -> Option<CacheEntry>;

    fn set(&self, scope: CacheScope, key: &str, value: CacheEntry);

    /// Remove and return the evicted entry.
    fn delete(&self, scope: CacheScope, key: &str) -> Option<CacheEntry>;

    /// Return the cached entry or populate it from `factory`. A factory
    /// returning `None` caches nothing.
    fn get_or_create(
        &self,
        scope: CacheScope,
        key: &str,
        factory: &mut dyn FnMut() -> Option<CacheEntry>,
    ) -> Option<CacheEntry>;

    fn keys(&self, scope: CacheScope) -> Vec<String>;
}

/// One region of the cache, as handed out by cache resolvers.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, value: CacheEntry);
    fn delete(&self, key: &str) -> Option<CacheEntry>;
}

/// A [`Cache`] view over one scope of a [`CacheHandler`].
#[derive(Clone)]
pub struct ScopedCache {
    handler: Arc<dyn CacheHandler>,
    scope: CacheScope,
}

impl ScopedCache {
    #[must_use]
    pub fn new(handler: Arc<dyn CacheHandler>, scope: CacheScope) -> Self {
        Self { handler, scope }
    }

    #[must_use]
    pub fn scope(&self) -> CacheScope {
        self.scope
    }
}

impl Cache for ScopedCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.handler.get(self.scope, key)
    }

    fn set(&self, key: &str, value: CacheEntry) {
        self.handler.set(self.scope, key, value);
    }

    fn delete(&self, key: &str) -> Option<CacheEntry> {
        self.handler.delete(self.scope, key)
    }
}
