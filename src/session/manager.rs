//! Session manager: start, validate-on-access, stop and expire sessions
//! kept in the `session` cache scope.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use ulid::Ulid;

use super::{Expiry, SessionRecord};
use crate::cache::{CacheEntry, CacheHandler, CacheScope};
use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};
use crate::event::{EventBus, EventPayload, Topic};

/// What is known about the caller when a session starts.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub host: Option<String>,
}

pub struct SessionManager {
    cache_handler: Arc<dyn CacheHandler>,
    event_bus: Arc<EventBus>,
    idle_timeout: Duration,
    absolute_timeout: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("idle_timeout", &self.idle_timeout)
            .field("absolute_timeout", &self.absolute_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: &SecurityConfig,
        cache_handler: Arc<dyn CacheHandler>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            cache_handler,
            event_bus,
            idle_timeout: config.session_idle_timeout(),
            absolute_timeout: config.session_absolute_timeout(),
        }
    }

    /// Start a session and return its id.
    #[instrument(skip_all)]
    pub fn start(&self, context: &SessionContext) -> String {
        let id = Ulid::new().to_string();
        let record = SessionRecord::new(
            id.clone(),
            self.idle_timeout,
            self.absolute_timeout,
            context.host.clone(),
        );
        self.cache_handler.set(
            CacheScope::Session,
            &id,
            CacheEntry::Session(Arc::new(Mutex::new(record))),
        );

        info!("session {id} started");
        self.event_bus.publish(
            Topic::SessionStart,
            EventPayload::Session {
                session_id: id.clone(),
                identifiers: None,
            },
        );
        id
    }

    /// Run `f` on a validated session, then record the access.
    ///
    /// `f` sees the record before its last-access time is updated.
    ///
    /// # Errors
    /// `UnknownSession`, `StoppedSession` or `ExpiredSession`.
    pub fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut SessionRecord) -> T) -> Result<T> {
        let session = self.lookup(id)?;
        let now = Utc::now();

        let mut record = session.lock();
        if record.is_stopped() {
            return Err(SecurityError::StoppedSession(id.to_string()));
        }
        if let Some(expiry) = record.timed_out_at(now) {
            record.expire(now);
            let snapshot = record.clone();
            drop(record);
            self.on_expiration(&snapshot, expiry);
            return Err(SecurityError::ExpiredSession(id.to_string()));
        }

        let value = f(&mut record);
        record.touch(now);
        Ok(value)
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn touch(&self, id: &str) -> Result<()> {
        self.with_session(id, |_| ())
    }

    /// Stop a session. Its record leaves the cache and `SESSION.STOP` is
    /// published with the bound identifiers.
    ///
    /// # Errors
    /// `UnknownSession` if no such session is live.
    #[instrument(skip_all)]
    pub fn stop(&self, id: &str) -> Result<()> {
        let session = self.lookup(id)?;
        let snapshot = {
            let mut record = session.lock();
            if record.is_stopped() {
                return Ok(());
            }
            record.stop(Utc::now());
            record.clone()
        };

        self.cache_handler.delete(CacheScope::Session, id);
        info!("session {id} stopped");
        self.event_bus.publish(
            Topic::SessionStop,
            EventPayload::Session {
                session_id: id.to_string(),
                identifiers: snapshot.bound_identifiers(),
            },
        );
        Ok(())
    }

    /// Expire every live session whose timeouts have elapsed, without
    /// touching the others. Returns how many expired.
    pub fn validate_sessions(&self) -> usize {
        let now = Utc::now();
        let mut expired = 0;

        for id in self.cache_handler.keys(CacheScope::Session) {
            let Ok(session) = self.lookup(&id) else {
                continue;
            };
            let mut record = session.lock();
            if record.is_stopped() {
                continue;
            }
            if let Some(expiry) = record.timed_out_at(now) {
                record.expire(now);
                let snapshot = record.clone();
                drop(record);
                self.on_expiration(&snapshot, expiry);
                expired += 1;
            }
        }

        debug!("session sweep expired {expired} session(s)");
        expired
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn get_attribute(&self, id: &str, key: &str) -> Result<Option<serde_json::Value>> {
        self.with_session(id, |record| record.attribute(key).cloned())
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn set_attribute(&self, id: &str, key: &str, value: serde_json::Value) -> Result<()> {
        self.with_session(id, |record| record.set_attribute(key, value))
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn remove_attribute(&self, id: &str, key: &str) -> Result<Option<serde_json::Value>> {
        self.with_session(id, |record| record.remove_attribute(key))
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn attribute_keys(&self, id: &str) -> Result<Vec<String>> {
        self.with_session(id, |record| record.attribute_keys())
    }

    /// Last access before this one.
    ///
    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn last_access_time(&self, id: &str) -> Result<DateTime<Utc>> {
        self.with_session(id, |record| record.last_access_time())
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn start_timestamp(&self, id: &str) -> Result<DateTime<Utc>> {
        self.with_session(id, |record| record.start_timestamp())
    }

    /// `(idle, absolute)` timeouts.
    ///
    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn timeouts(&self, id: &str) -> Result<(Duration, Duration)> {
        self.with_session(id, |record| (record.idle_timeout(), record.absolute_timeout()))
    }

    /// # Errors
    /// See [`SessionManager::with_session`].
    pub fn host(&self, id: &str) -> Result<Option<String>> {
        self.with_session(id, |record| record.host().map(ToString::to_string))
    }

    fn lookup(&self, id: &str) -> Result<Arc<Mutex<SessionRecord>>> {
        self.cache_handler
            .get(CacheScope::Session, id)
            .and_then(CacheEntry::into_session)
            .ok_or_else(|| SecurityError::UnknownSession(id.to_string()))
    }

    fn on_expiration(&self, record: &SessionRecord, expiry: Expiry) {
        self.cache_handler.delete(CacheScope::Session, record.id());
        info!("session {} expired ({expiry:?} timeout)", record.id());
        self.event_bus.publish(
            Topic::SessionExpire,
            EventPayload::Session {
                session_id: record.id().to_string(),
                identifiers: record.bound_identifiers(),
            },
        );
    }
}
