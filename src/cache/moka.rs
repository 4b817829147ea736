use moka::sync::Cache;
use tracing::debug;

use super::{CacheEntry, CacheHandler, CacheScope};
use crate::config::SecurityConfig;

/// In-process cache handler, one moka cache per scope.
///
/// Credentials and authorization info expire after their configured TTL.
/// Session records are neither capped nor timed out here; only the session
/// manager removes them, on stop or expiration.
#[derive(Clone)]
pub struct MokaCacheHandler {
    credentials: Cache<String, CacheEntry>,
    authz_info: Cache<String, CacheEntry>,
    sessions: Cache<String, CacheEntry>,
}

impl std::fmt::Debug for MokaCacheHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheHandler")
            .field("credentials", &self.credentials.entry_count())
            .field("authz_info", &self.authz_info.entry_count())
            .field("sessions", &self.sessions.entry_count())
            .finish()
    }
}

impl Default for MokaCacheHandler {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl MokaCacheHandler {
    #[must_use]
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            credentials: Cache::builder()
                .name("credentials")
                .max_capacity(config.cache_max_capacity())
                .time_to_live(config.credentials_cache_ttl())
                .build(),
            authz_info: Cache::builder()
                .name("authz_info")
                .max_capacity(config.cache_max_capacity())
                .time_to_live(config.authz_info_cache_ttl())
                .build(),
            sessions: Cache::builder().name("session").build(),
        }
    }

    fn region(&self, scope: CacheScope) -> &Cache<String, CacheEntry> {
        match scope {
            CacheScope::Credentials => &self.credentials,
            CacheScope::AuthzInfo => &self.authz_info,
            CacheScope::Session => &self.sessions,
        }
    }
}

impl CacheHandler for MokaCacheHandler {
    fn get(&self, scope: CacheScope, key: &str) -> Option<CacheEntry> {
        let entry = self.region(scope).get(key);
        debug!("cache {scope} get [{key}]: hit={}", entry.is_some());
        entry
    }

    fn set(&self, scope: CacheScope, key: &str, value: CacheEntry) {
        debug!("cache {scope} set [{key}]");
        self.region(scope).insert(key.to_string(), value);
    }

    fn delete(&self, scope: CacheScope, key: &str) -> Option<CacheEntry> {
        debug!("cache {scope} delete [{key}]");
        self.region(scope).remove(key)
    }

    fn get_or_create(
        &self,
        scope: CacheScope,
        key: &str,
        factory: &mut dyn FnMut() -> Option<CacheEntry>,
    ) -> Option<CacheEntry> {
        self.region(scope)
            .optionally_get_with(key.to_string(), || {
                debug!("cache {scope} miss [{key}], populating");
                factory()
            })
    }

    fn keys(&self, scope: CacheScope) -> Vec<String> {
        self.region(scope)
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AuthorizationInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn authz_entry() -> CacheEntry {
        CacheEntry::AuthzInfo(Arc::new(AuthorizationInfo::default()))
    }

    #[test]
    fn scopes_are_independent() {
        let handler = MokaCacheHandler::default();
        handler.set(CacheScope::AuthzInfo, "thedude", authz_entry());

        assert!(handler.get(CacheScope::AuthzInfo, "thedude").is_some());
        assert!(handler.get(CacheScope::Credentials, "thedude").is_none());
        assert!(handler.delete(CacheScope::AuthzInfo, "thedude").is_some());
        assert!(handler.delete(CacheScope::AuthzInfo, "thedude").is_none());
    }

    #[test]
    fn get_or_create_skips_factory_on_hit_and_caches_nothing_on_none() {
        let handler = MokaCacheHandler::default();
        let calls = AtomicUsize::new(0);

        let missing = handler.get_or_create(CacheScope::AuthzInfo, "walter", &mut || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        });
        assert!(missing.is_none());
        assert!(handler.keys(CacheScope::AuthzInfo).is_empty());

        for _ in 0..3 {
            let entry = handler.get_or_create(CacheScope::AuthzInfo, "walter", &mut || {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(authz_entry())
            });
            assert!(entry.is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handler.keys(CacheScope::AuthzInfo), vec!["walter".to_string()]);
    }

    #[test]
    fn sessions_survive_size_pressure() {
        let handler = MokaCacheHandler::new(&SecurityConfig::new().with_cache_max_capacity(5));
        let ids: Vec<String> = (0..200).map(|n| format!("session-{n}")).collect();
        for id in &ids {
            handler.set(CacheScope::Session, id, authz_entry());
            handler.set(CacheScope::AuthzInfo, id, authz_entry());
        }
        handler.sessions.run_pending_tasks();
        handler.authz_info.run_pending_tasks();

        assert!(ids
            .iter()
            .all(|id| handler.get(CacheScope::Session, id).is_some()));
        assert_eq!(handler.keys(CacheScope::Session).len(), 200);
        assert!(handler.authz_info.entry_count() <= 5);
    }

    #[test]
    fn concurrent_misses_populate_once() {
        let handler = MokaCacheHandler::default();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    let entry = handler.get_or_create(CacheScope::AuthzInfo, "donny", &mut || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Some(authz_entry())
                    });
                    assert!(entry.is_some());
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
