//! Security manager: composition root and the operations subjects delegate to.
//!
//! Flow Overview:
//! 1. [`SecurityManagerBuilder`] owns the cache handler and event bus; realms
//!    are configured (resolvers, matcher, cache) before they are shared.
//! 2. `build` wires the authenticator, the authorizer, the session manager and
//!    the realm listeners that evict cached account data on `SESSION.STOP`
//!    and `SESSION.EXPIRE`.
//! 3. Boundary adapters call [`SecurityManager::with_subject`] once per request.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::authc::{AuthenticationToken, ModularRealmAuthenticator};
use crate::authz::ModularRealmAuthorizer;
use crate::cache::{CacheHandler, MokaCacheHandler};
use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};
use crate::event::{EventBus, Topic};
use crate::identity::IdentifierCollection;
use crate::realm::{AccountStore, AccountStoreRealm, Realm};
use crate::session::{
    Session, SessionContext, SessionManager, AUTHENTICATED_SESSION_KEY, IDENTIFIERS_SESSION_KEY,
    RUN_AS_IDENTIFIERS_SESSION_KEY,
};
use crate::subject::{Subject, SubjectContext};

pub struct SecurityManagerBuilder {
    config: SecurityConfig,
    cache_handler: Arc<dyn CacheHandler>,
    event_bus: Arc<EventBus>,
    realms: Vec<Arc<dyn Realm>>,
}

impl SecurityManagerBuilder {
    /// Replace the default moka cache handler. Realms added afterwards with
    /// [`SecurityManagerBuilder::with_account_store_realm`] use it.
    #[must_use]
    pub fn with_cache_handler(mut self, cache_handler: Arc<dyn CacheHandler>) -> Self {
        self.cache_handler = cache_handler;
        self
    }

    /// Shared cache handler, for realms configured outside the builder.
    #[must_use]
    pub fn cache_handler(&self) -> Arc<dyn CacheHandler> {
        Arc::clone(&self.cache_handler)
    }

    #[must_use]
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    #[must_use]
    pub fn with_realm(mut self, realm: impl Realm + 'static) -> Self {
        self.realms.push(Arc::new(realm));
        self
    }

    #[must_use]
    pub fn with_shared_realm(mut self, realm: Arc<dyn Realm>) -> Self {
        self.realms.push(realm);
        self
    }

    /// Add an [`AccountStoreRealm`] over `store`, reading through the shared cache.
    #[must_use]
    pub fn with_account_store_realm(
        self,
        name: impl Into<String>,
        store: impl AccountStore + 'static,
    ) -> Self {
        let realm = AccountStoreRealm::new(name, store).with_cache_handler(self.cache_handler());
        self.with_realm(realm)
    }

    /// # Errors
    /// `RealmMisconfigured` without realms.
    pub fn build(self) -> Result<Arc<SecurityManager>> {
        if self.realms.is_empty() {
            return Err(SecurityError::RealmMisconfigured(
                "a security manager needs at least one realm".to_string(),
            ));
        }

        for topic in [Topic::SessionStop, Topic::SessionExpire] {
            for realm in &self.realms {
                let realm = Arc::clone(realm);
                self.event_bus.register(topic, move |event| {
                    if let Some(identifiers) = event.payload.identifiers() {
                        debug!("{} evicting [{identifiers}] on {}", realm.name(), event.topic);
                        realm.do_clear_cache(identifiers);
                    }
                });
            }
        }

        let realm_names: Vec<&str> = self.realms.iter().map(|realm| realm.name()).collect();
        info!(
            "security manager ready: realms={realm_names:?}, policy={:?}",
            self.config.authentication_policy()
        );

        let authenticator = ModularRealmAuthenticator::new(
            self.realms.clone(),
            self.config.authentication_policy(),
            Arc::clone(&self.event_bus),
        );
        let authorizer = ModularRealmAuthorizer::new(self.realms.clone(), Arc::clone(&self.event_bus));
        let session_manager = Arc::new(SessionManager::new(
            &self.config,
            Arc::clone(&self.cache_handler),
            Arc::clone(&self.event_bus),
        ));

        Ok(Arc::new(SecurityManager {
            config: self.config,
            cache_handler: self.cache_handler,
            event_bus: self.event_bus,
            realms: self.realms,
            authenticator,
            authorizer,
            session_manager,
        }))
    }
}

pub struct SecurityManager {
    config: SecurityConfig,
    cache_handler: Arc<dyn CacheHandler>,
    event_bus: Arc<EventBus>,
    realms: Vec<Arc<dyn Realm>>,
    authenticator: ModularRealmAuthenticator,
    authorizer: ModularRealmAuthorizer,
    session_manager: Arc<SessionManager>,
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("config", &self.config)
            .field("authenticator", &self.authenticator)
            .field("authorizer", &self.authorizer)
            .finish_non_exhaustive()
    }
}

impl SecurityManager {
    #[must_use]
    pub fn builder(config: SecurityConfig) -> SecurityManagerBuilder {
        SecurityManagerBuilder {
            cache_handler: Arc::new(MokaCacheHandler::new(&config)),
            config,
            event_bus: Arc::new(EventBus::new()),
            realms: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    #[must_use]
    pub fn cache_handler(&self) -> &Arc<dyn CacheHandler> {
        &self.cache_handler
    }

    #[must_use]
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    #[must_use]
    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    #[must_use]
    pub fn authenticator(&self) -> &ModularRealmAuthenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn authorizer(&self) -> &ModularRealmAuthorizer {
        &self.authorizer
    }

    #[must_use]
    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.session_manager
    }

    pub(crate) fn start_session(&self, host: Option<String>) -> Session {
        let id = self.session_manager.start(&SessionContext { host });
        Session::new(id, Arc::clone(&self.session_manager))
    }

    /// Build the subject for `context`, resuming its session if it is still live.
    ///
    /// A session that is unknown, stopped or expired is dropped and the
    /// subject starts anonymous.
    ///
    /// # Errors
    /// Session attribute errors other than the above.
    #[instrument(skip_all)]
    pub fn create_subject(self: &Arc<Self>, context: SubjectContext) -> Result<Subject> {
        let mut subject = Subject::new(Arc::clone(self), context.host.clone());

        if let Some(session_id) = context.session_id {
            let session = Session::new(session_id, Arc::clone(&self.session_manager));
            match Self::resume(&mut subject, &session) {
                Ok(()) => subject.session = Some(session),
                Err(
                    e @ (SecurityError::UnknownSession(_)
                    | SecurityError::StoppedSession(_)
                    | SecurityError::ExpiredSession(_)),
                ) => {
                    debug!("not resuming session {}: {e}", session.id());
                    subject.reset();
                }
                Err(e) => return Err(e),
            }
        }

        if subject.identifiers.is_none() {
            if let Some(remembered) = context.remembered_identifiers {
                subject.identifiers = Some(remembered);
                subject.remembered = true;
            }
        }

        Ok(subject)
    }

    fn resume(subject: &mut Subject, session: &Session) -> Result<()> {
        subject.identifiers = session
            .get::<IdentifierCollection>(IDENTIFIERS_SESSION_KEY)?
            .filter(|identifiers| !identifiers.is_empty());
        subject.authenticated = subject.identifiers.is_some()
            && session
                .get::<bool>(AUTHENTICATED_SESSION_KEY)?
                .unwrap_or(false);
        subject.run_as = session
            .get::<Vec<IdentifierCollection>>(RUN_AS_IDENTIFIERS_SESSION_KEY)?
            .unwrap_or_default();
        if subject.host.is_none() {
            subject.host = session.host()?;
        }
        Ok(())
    }

    /// Run `f` with the subject for `context`: the per-request scope of a
    /// boundary adapter.
    ///
    /// # Errors
    /// Errors from [`SecurityManager::create_subject`] or from `f`.
    pub fn with_subject<T>(
        self: &Arc<Self>,
        context: SubjectContext,
        f: impl FnOnce(&mut Subject) -> Result<T>,
    ) -> Result<T> {
        let mut subject = self.create_subject(context)?;
        f(&mut subject)
    }

    /// Authenticate `token` and bind the resulting identity to `subject` and
    /// its session.
    ///
    /// # Errors
    /// `Authentication` if the token is rejected, see
    /// [`ModularRealmAuthenticator::authenticate_account`].
    #[instrument(skip_all)]
    pub fn login(&self, subject: &mut Subject, token: &dyn AuthenticationToken) -> Result<()> {
        let identifiers = self.authenticator.authenticate_account(token)?;

        for realm in &self.realms {
            realm.do_clear_cache(&identifiers);
        }

        if let Some(host) = token.host() {
            subject.host = Some(host.to_string());
        }

        // a dead session is replaced rather than failing the login
        let session = match subject.get_session(true) {
            Ok(session) => session,
            Err(
                SecurityError::UnknownSession(_)
                | SecurityError::StoppedSession(_)
                | SecurityError::ExpiredSession(_),
            ) => subject.get_session(true)?,
            Err(e) => return Err(e),
        };

        if let Some(session) = &session {
            session.set(IDENTIFIERS_SESSION_KEY, &identifiers)?;
            session.set(AUTHENTICATED_SESSION_KEY, &true)?;
            session.remove(RUN_AS_IDENTIFIERS_SESSION_KEY)?;
        }

        subject.identifiers = Some(identifiers);
        subject.authenticated = true;
        subject.remembered = token.is_remember_me();
        subject.run_as.clear();
        Ok(())
    }

    /// Evict cached account data, stop the session and clear the identity.
    #[instrument(skip_all)]
    pub fn logout(&self, subject: &mut Subject) {
        if let Some(identifiers) = subject.identifiers.as_ref() {
            info!("logging out [{identifiers}]");
            for realm in &self.realms {
                realm.do_clear_cache(identifiers);
            }
        }

        if let Some(session) = subject.session.as_ref() {
            if let Err(e) = session.stop() {
                debug!("session {} already gone at logout: {e}", session.id());
            }
        }

        subject.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authc::password::test_matcher;
    use crate::authc::UsernamePasswordToken;
    use crate::authz::LogicalOperator;
    use crate::cache::CacheScope;
    use crate::realm::{AccountRecord, MemoryAccountStore};

    fn manager(config: SecurityConfig) -> anyhow::Result<Arc<SecurityManager>> {
        let store = MemoryAccountStore::new().with_account(
            "thedude",
            AccountRecord {
                password_hash: Some(test_matcher().hash_password("letsgobowling")?),
                roles: vec!["courier".into()],
                permissions: vec!["courier:transport:*".into()],
            },
        );
        let builder = SecurityManager::builder(config);
        let realm = AccountStoreRealm::new("AccountStoreRealm", store)
            .with_cache_handler(builder.cache_handler())
            .with_credentials_matcher(Arc::new(test_matcher()));
        Ok(builder.with_realm(realm).build()?)
    }

    #[test]
    fn build_requires_a_realm() {
        assert!(matches!(
            SecurityManager::builder(SecurityConfig::default()).build(),
            Err(SecurityError::RealmMisconfigured(_))
        ));
    }

    #[test]
    fn subject_resumes_from_session_id() -> anyhow::Result<()> {
        let manager = manager(SecurityConfig::default())?;

        let session_id = manager.with_subject(SubjectContext::new(), |subject| {
            subject.login(&UsernamePasswordToken::new("thedude", "letsgobowling"))?;
            subject.run_as(IdentifierCollection::new("AccountStoreRealm", "walter"))?;
            let session = subject
                .get_session(false)?
                .ok_or(SecurityError::IllegalState("no session".into()))?;
            Ok(session.id().to_string())
        })?;

        let resumed = manager.create_subject(SubjectContext::new().with_session_id(&session_id))?;
        assert!(resumed.is_authenticated());
        assert!(resumed.is_run_as());
        assert_eq!(
            resumed.identifiers().and_then(IdentifierCollection::primary_identifier),
            Some("walter")
        );
        assert_eq!(
            resumed
                .authenticated_identifiers()
                .and_then(IdentifierCollection::primary_identifier),
            Some("thedude")
        );
        Ok(())
    }

    #[test]
    fn unknown_session_yields_anonymous_subject() -> anyhow::Result<()> {
        let manager = manager(SecurityConfig::default())?;
        let mut subject = manager.create_subject(SubjectContext::new().with_session_id("01NOPE"))?;

        assert!(subject.identifiers().is_none());
        assert!(matches!(
            subject.is_permitted(&["courier:transport"]),
            Err(SecurityError::IdentifiersNotSet)
        ));
        Ok(())
    }

    #[test]
    fn remembered_identity_is_not_authenticated() -> anyhow::Result<()> {
        let manager = manager(SecurityConfig::default())?;
        let mut subject = manager.create_subject(
            SubjectContext::new()
                .with_remembered_identifiers(IdentifierCollection::new("AccountStoreRealm", "thedude")),
        )?;

        assert!(subject.is_remembered());
        assert!(!subject.is_authenticated());
        assert!(subject.is_permitted_collective(&["courier:transport:rug"], LogicalOperator::All)?);
        Ok(())
    }

    #[test]
    fn disabled_session_creation_keeps_identity_in_memory() -> anyhow::Result<()> {
        let manager = manager(SecurityConfig::default().with_session_creation_enabled(false))?;
        let mut subject = manager.create_subject(SubjectContext::new())?;

        subject.login(&UsernamePasswordToken::new("thedude", "letsgobowling"))?;
        assert!(subject.get_session(true)?.is_none());
        assert!(subject.is_authenticated());
        assert!(manager.cache_handler().keys(CacheScope::Session).is_empty());

        subject.logout();
        assert!(!subject.is_authenticated());
        Ok(())
    }
}
