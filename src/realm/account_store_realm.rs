//! Realm over an [`AccountStore`], reading through the shared cache.
//!
//! Flow Overview:
//! 1. Credentials and authorization info are looked up with get-or-create in
//!    the `credentials` and `authz_info` cache scopes, falling back to the
//!    account store on a miss. Without a cache handler the store is read
//!    directly.
//! 2. Authentication matches the submitted token against the stored
//!    credentials with a pluggable [`CredentialsMatcher`].
//! 3. Authorization yields lazy per-item verdicts; missing authorization info
//!    denies every item.
//! 4. Login, logout, session stop and session expiration evict both scopes
//!    through [`Realm::do_clear_cache`].

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::resolver::{AuthzInfoResolver, CredentialResolver, PermissionResolver, RoleResolver};
use super::store::AccountStore;
use super::Realm;
use crate::authc::{
    Account, Argon2CredentialsMatcher, AuthenticationToken, CredentialsMatcher,
    UsernamePasswordToken,
};
use crate::authz::{
    AuthorizationInfo, IndexedPermissionVerifier, SimpleRoleVerifier, Verdicts, Verifier,
};
use crate::cache::{CacheEntry, CacheHandler, CacheScope};
use crate::error::{Result, SecurityError};
use crate::identity::IdentifierCollection;

pub struct AccountStoreRealm {
    name: String,
    account_store: Box<dyn AccountStore>,
    cache_handler: Option<Arc<dyn CacheHandler>>,
    credentials_matcher: Arc<dyn CredentialsMatcher>,
    permission_verifier: IndexedPermissionVerifier,
    role_verifier: SimpleRoleVerifier,
    credential_resolver: Option<Arc<dyn CredentialResolver>>,
    permission_resolver: Option<Arc<dyn PermissionResolver>>,
    role_resolver: Option<Arc<dyn RoleResolver>>,
    authz_info_resolver: Option<Arc<dyn AuthzInfoResolver>>,
}

impl std::fmt::Debug for AccountStoreRealm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStoreRealm")
            .field("name", &self.name)
            .field("cached", &self.cache_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl AccountStoreRealm {
    #[must_use]
    pub fn new(name: impl Into<String>, account_store: impl AccountStore + 'static) -> Self {
        Self {
            name: name.into(),
            account_store: Box::new(account_store),
            cache_handler: None,
            credentials_matcher: Arc::new(Argon2CredentialsMatcher::default()),
            permission_verifier: IndexedPermissionVerifier::default(),
            role_verifier: SimpleRoleVerifier,
            credential_resolver: None,
            permission_resolver: None,
            role_resolver: None,
            authz_info_resolver: None,
        }
    }

    #[must_use]
    pub fn with_cache_handler(mut self, cache_handler: Arc<dyn CacheHandler>) -> Self {
        self.cache_handler = Some(cache_handler);
        self
    }

    #[must_use]
    pub fn with_credentials_matcher(mut self, matcher: Arc<dyn CredentialsMatcher>) -> Self {
        self.credentials_matcher = matcher;
        self
    }

    #[must_use]
    pub fn with_credential_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.account_store
            .set_credential_resolver(Arc::clone(&resolver));
        self.credential_resolver = Some(resolver);
        self
    }

    /// The permission resolver also drives the permission verifier.
    #[must_use]
    pub fn with_permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.account_store
            .set_permission_resolver(Arc::clone(&resolver));
        self.permission_verifier
            .set_permission_resolver(Arc::clone(&resolver));
        self.permission_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_role_resolver(mut self, resolver: Arc<dyn RoleResolver>) -> Self {
        self.account_store.set_role_resolver(Arc::clone(&resolver));
        self.role_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_authz_info_resolver(mut self, resolver: Arc<dyn AuthzInfoResolver>) -> Self {
        self.account_store
            .set_authz_info_resolver(Arc::clone(&resolver));
        self.authz_info_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn cache_handler(&self) -> Option<&Arc<dyn CacheHandler>> {
        self.cache_handler.as_ref()
    }

    #[must_use]
    pub fn credential_resolver(&self) -> Option<&Arc<dyn CredentialResolver>> {
        self.credential_resolver.as_ref()
    }

    #[must_use]
    pub fn permission_resolver(&self) -> Option<&Arc<dyn PermissionResolver>> {
        self.permission_resolver.as_ref()
    }

    #[must_use]
    pub fn role_resolver(&self) -> Option<&Arc<dyn RoleResolver>> {
        self.role_resolver.as_ref()
    }

    #[must_use]
    pub fn authz_info_resolver(&self) -> Option<&Arc<dyn AuthzInfoResolver>> {
        self.authz_info_resolver.as_ref()
    }

    /// # Errors
    /// `CredentialsNotFound` if the store has no credentials for `identifier`,
    /// `AccountStore` if the store fails.
    pub fn get_credentials(&self, identifier: &str) -> Result<Arc<Account>> {
        let account = self.read_through(CacheScope::Credentials, identifier, |store| {
            Ok(store
                .get_credentials(identifier)?
                .map(|account| CacheEntry::Account(Arc::new(account))))
        })?;

        account
            .and_then(CacheEntry::into_account)
            .ok_or_else(|| SecurityError::CredentialsNotFound(identifier.to_string()))
    }

    /// # Errors
    /// `AuthzInfoNotFound` if the store has no authorization info for the
    /// identifiers, `AccountStore` if the store fails.
    pub fn get_authorization_info(
        &self,
        identifiers: &IdentifierCollection,
    ) -> Result<Arc<AuthorizationInfo>> {
        let identifier = self.identifier_for(identifiers)?;
        let info = self.read_through(CacheScope::AuthzInfo, identifier, |store| {
            Ok(store
                .get_authz_info(identifier)?
                .map(|info| CacheEntry::AuthzInfo(Arc::new(info))))
        })?;

        info.and_then(CacheEntry::into_authz_info)
            .ok_or_else(|| SecurityError::AuthzInfoNotFound(identifier.to_string()))
    }

    /// # Errors
    /// `IncorrectCredentials` if the matcher rejects the token.
    pub fn assert_credentials_match(
        &self,
        token: &dyn AuthenticationToken,
        account: &Account,
    ) -> Result<()> {
        if self.credentials_matcher.credentials_match(token, account) {
            Ok(())
        } else {
            info!("credentials mismatch for [{}]", token.identifier());
            Err(SecurityError::IncorrectCredentials(
                token.identifier().to_string(),
            ))
        }
    }

    /// Returns the evicted credentials, if any were cached.
    pub fn clear_cached_credentials(&self, identifier: &str) -> Option<Arc<Account>> {
        info!("Clearing cached credentials for [{identifier}]");
        self.cache_handler.as_ref().and_then(|handler| {
            handler
                .delete(CacheScope::Credentials, identifier)
                .and_then(CacheEntry::into_account)
        })
    }

    /// Returns the evicted authorization info, if any was cached.
    pub fn clear_cached_authorization_info(
        &self,
        identifier: &str,
    ) -> Option<Arc<AuthorizationInfo>> {
        info!("Clearing cached authz_info for [{identifier}]");
        self.cache_handler.as_ref().and_then(|handler| {
            handler
                .delete(CacheScope::AuthzInfo, identifier)
                .and_then(CacheEntry::into_authz_info)
        })
    }

    fn identifier_for<'a>(&self, identifiers: &'a IdentifierCollection) -> Result<&'a str> {
        identifiers
            .for_realm(&self.name)
            .ok_or(SecurityError::IdentifiersNotSet)
    }

    /// Get-or-create through `scope`, or a direct store read without a cache.
    /// A store failure is returned as an error and caches nothing.
    fn read_through<F>(&self, scope: CacheScope, key: &str, load: F) -> Result<Option<CacheEntry>>
    where
        F: Fn(&dyn AccountStore) -> anyhow::Result<Option<CacheEntry>>,
    {
        let store = self.account_store.as_ref();
        let Some(handler) = &self.cache_handler else {
            return load(store).map_err(SecurityError::from);
        };

        let mut failure: Option<anyhow::Error> = None;
        let entry = handler.get_or_create(scope, key, &mut || match load(store) {
            Ok(entry) => entry,
            Err(e) => {
                error!("account store failed loading {scope} for [{key}]: {e:#}");
                failure = Some(e);
                None
            }
        });

        match failure {
            Some(e) => Err(SecurityError::from(e)),
            None => Ok(entry),
        }
    }

    fn verdicts<'a>(
        &'a self,
        identifiers: &IdentifierCollection,
        items: Vec<String>,
        verifier: &'a dyn Verifier,
    ) -> Verdicts<'a> {
        let authz_info = match self.get_authorization_info(identifiers) {
            Ok(info) => Some(info),
            Err(SecurityError::AuthzInfoNotFound(identifier)) => {
                debug!("no authz_info for [{identifier}], denying {} item(s)", items.len());
                None
            }
            Err(e) => {
                warn!("authorization degraded for [{identifiers}]: {e}");
                None
            }
        };
        Verdicts::new(items, authz_info, verifier)
    }
}

impl Realm for AccountStoreRealm {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, token: &dyn AuthenticationToken) -> bool {
        token.as_any().is::<UsernamePasswordToken>()
    }

    #[instrument(skip_all, fields(realm = %self.name))]
    fn authenticate_account(&self, token: &dyn AuthenticationToken) -> Result<Arc<Account>> {
        if !self.supports(token) {
            return Err(SecurityError::InvalidArgument(format!(
                "realm {} does not support token {token:?}",
                self.name
            )));
        }

        let account = self.get_credentials(token.identifier())?;
        self.assert_credentials_match(token, &account)?;
        debug!("authenticated [{}]", account.account_id());
        Ok(account)
    }

    fn is_permitted(
        &self,
        identifiers: &IdentifierCollection,
        permissions: Vec<String>,
    ) -> Verdicts<'_> {
        self.verdicts(identifiers, permissions, &self.permission_verifier)
    }

    fn has_role(&self, identifiers: &IdentifierCollection, roles: Vec<String>) -> Verdicts<'_> {
        self.verdicts(identifiers, roles, &self.role_verifier)
    }

    fn do_clear_cache(&self, identifiers: &IdentifierCollection) {
        let Some(identifier) = identifiers.for_realm(&self.name) else {
            return;
        };
        self.clear_cached_credentials(identifier);
        self.clear_cached_authorization_info(identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authc::password::test_matcher;
    use crate::cache::MokaCacheHandler;
    use crate::realm::store::{AccountRecord, MemoryAccountStore};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store counting reads, with a switch to make it fail.
    #[derive(Clone, Default)]
    struct CountingStore {
        inner: Arc<Mutex<MemoryAccountStore>>,
        credential_reads: Arc<AtomicUsize>,
        authz_reads: Arc<AtomicUsize>,
        broken: Arc<std::sync::atomic::AtomicBool>,
    }

    impl AccountStore for CountingStore {
        fn get_credentials(&self, identifier: &str) -> anyhow::Result<Option<Account>> {
            self.credential_reads.fetch_add(1, Ordering::SeqCst);
            if self.broken.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            self.inner.lock().get_credentials(identifier)
        }

        fn get_authz_info(&self, identifier: &str) -> anyhow::Result<Option<AuthorizationInfo>> {
            self.authz_reads.fetch_add(1, Ordering::SeqCst);
            if self.broken.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            self.inner.lock().get_authz_info(identifier)
        }
    }

    fn thedude_record() -> anyhow::Result<AccountRecord> {
        Ok(AccountRecord {
            password_hash: Some(test_matcher().hash_password("letsgobowling")?),
            roles: vec!["courier".into()],
            permissions: vec![
                "courier:transport:*".into(),
                "leatherduffelbag:transport:theringer".into(),
            ],
        })
    }

    fn realm(store: &CountingStore) -> (AccountStoreRealm, Arc<dyn CacheHandler>) {
        let cache: Arc<dyn CacheHandler> = Arc::new(MokaCacheHandler::default());
        let realm = AccountStoreRealm::new("AccountStoreRealm", store.clone())
            .with_cache_handler(Arc::clone(&cache))
            .with_credentials_matcher(Arc::new(test_matcher()));
        (realm, cache)
    }

    fn dude() -> IdentifierCollection {
        IdentifierCollection::new("AccountStoreRealm", "thedude")
    }

    #[test]
    fn authenticates_and_caches_credentials() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let (realm, cache) = realm(&store);

        let token = UsernamePasswordToken::new("thedude", "letsgobowling");
        let account = realm.authenticate_account(&token)?;
        assert_eq!(account.account_id(), "thedude");
        realm.authenticate_account(&token)?;
        assert_eq!(store.credential_reads.load(Ordering::SeqCst), 1);
        assert!(cache.get(CacheScope::Credentials, "thedude").is_some());

        assert!(matches!(
            realm.authenticate_account(&UsernamePasswordToken::new("thedude", "nihilism")),
            Err(SecurityError::IncorrectCredentials(_))
        ));
        assert!(matches!(
            realm.authenticate_account(&UsernamePasswordToken::new("jackie", "treehorn")),
            Err(SecurityError::CredentialsNotFound(_))
        ));
        Ok(())
    }

    #[derive(Debug)]
    struct ApiKeyToken(secrecy::SecretString);

    impl AuthenticationToken for ApiKeyToken {
        fn identifier(&self) -> &str {
            "api"
        }

        fn credentials(&self) -> &secrecy::SecretString {
            &self.0
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn rejects_unsupported_tokens() {
        let store = CountingStore::default();
        let (realm, _) = realm(&store);
        let token = ApiKeyToken(secrecy::SecretString::from("k".to_string()));

        assert!(!realm.supports(&token));
        assert!(matches!(
            realm.authenticate_account(&token),
            Err(SecurityError::InvalidArgument(_))
        ));
        assert_eq!(store.credential_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn verdicts_come_from_cached_authz_info() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let (realm, _) = realm(&store);

        let perms = vec![
            "money:write:bankcheck_19911109069".to_string(),
            "money:withdrawal".to_string(),
            "leatherduffelbag:transport:theringer".to_string(),
            "leatherduffelbag:access:theringer".to_string(),
        ];
        let first: Vec<bool> = realm.is_permitted(&dude(), perms.clone()).map(|v| v.1).collect();
        let second: Vec<bool> = realm.is_permitted(&dude(), perms).map(|v| v.1).collect();

        assert_eq!(first, vec![false, false, true, false]);
        assert_eq!(first, second);
        assert_eq!(store.authz_reads.load(Ordering::SeqCst), 1);

        let roles: Vec<bool> = realm
            .has_role(&dude(), vec!["courier".into(), "bowler".into()])
            .map(|v| v.1)
            .collect();
        assert_eq!(roles, vec![true, false]);
        Ok(())
    }

    #[test]
    fn missing_authz_info_denies_all_in_order() {
        let store = CountingStore::default();
        let (realm, _) = realm(&store);
        let walter = IdentifierCollection::new("AccountStoreRealm", "walter");

        let verdicts: Vec<_> = realm
            .is_permitted(&walter, vec!["b:b:b".into(), "a:a:a".into()])
            .collect();
        assert_eq!(
            verdicts,
            vec![("b:b:b".to_string(), false), ("a:a:a".to_string(), false)]
        );
        assert!(matches!(
            realm.get_authorization_info(&walter),
            Err(SecurityError::AuthzInfoNotFound(_))
        ));
    }

    #[test]
    fn store_failure_caches_nothing() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let (realm, cache) = realm(&store);

        store.broken.store(true, Ordering::SeqCst);
        assert!(matches!(
            realm.get_credentials("thedude"),
            Err(SecurityError::AccountStore(_))
        ));
        let denied: Vec<bool> = realm
            .is_permitted(&dude(), vec!["courier:transport:rug".into()])
            .map(|v| v.1)
            .collect();
        assert_eq!(denied, vec![false]);
        assert!(cache.keys(CacheScope::Credentials).is_empty());
        assert!(cache.keys(CacheScope::AuthzInfo).is_empty());

        store.broken.store(false, Ordering::SeqCst);
        assert!(realm.get_credentials("thedude").is_ok());
        Ok(())
    }

    #[test]
    fn clear_cache_forces_reload() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let (realm, cache) = realm(&store);

        realm.get_credentials("thedude")?;
        realm.get_authorization_info(&dude())?;

        let mut record = thedude_record()?;
        record.permissions.push("money:withdrawal".into());
        store.inner.lock().insert("thedude", record);

        let stale: Vec<bool> = realm
            .is_permitted(&dude(), vec!["money:withdrawal".into()])
            .map(|v| v.1)
            .collect();
        assert_eq!(stale, vec![false]);

        realm.do_clear_cache(&dude());
        assert!(cache.get(CacheScope::Credentials, "thedude").is_none());
        assert!(cache.get(CacheScope::AuthzInfo, "thedude").is_none());

        let fresh: Vec<bool> = realm
            .is_permitted(&dude(), vec!["money:withdrawal".into()])
            .map(|v| v.1)
            .collect();
        assert_eq!(fresh, vec![true]);
        assert_eq!(store.authz_reads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn works_without_cache_handler() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let realm = AccountStoreRealm::new("AccountStoreRealm", store.clone());

        realm.get_credentials("thedude")?;
        realm.get_credentials("thedude")?;
        assert_eq!(store.credential_reads.load(Ordering::SeqCst), 2);
        assert!(realm.clear_cached_credentials("thedude").is_none());
        Ok(())
    }

    struct PrefixedPermissions(AtomicUsize);

    impl PermissionResolver for PrefixedPermissions {
        fn resolve(&self, raw: &str) -> Result<crate::authz::WildcardPermission> {
            self.0.fetch_add(1, Ordering::SeqCst);
            crate::authz::WildcardPermission::parse(raw)
        }
    }

    #[test]
    fn permission_resolver_reaches_the_verifier() -> anyhow::Result<()> {
        let store = CountingStore::default();
        store.inner.lock().insert("thedude", thedude_record()?);
        let resolver = Arc::new(PrefixedPermissions(AtomicUsize::new(0)));
        let realm = AccountStoreRealm::new("AccountStoreRealm", store)
            .with_permission_resolver(Arc::clone(&resolver) as Arc<dyn PermissionResolver>);

        assert!(realm.permission_resolver().is_some());
        let granted: Vec<bool> = realm
            .is_permitted(&dude(), vec!["courier:transport:rug".into()])
            .map(|v| v.1)
            .collect();
        assert_eq!(granted, vec![true]);
        // CountingStore ignores resolvers, so only the verifier called it
        assert_eq!(resolver.0.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
