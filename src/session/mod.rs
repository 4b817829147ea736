//! Sessions: records, the manager that validates them on every access, and
//! the handle subjects hold.
//!
//! A session is `ACTIVE` until it is stopped (logout, explicit stop) or found
//! expired on access (idle or absolute timeout). Both end states are
//! terminal: the record leaves the cache and an event carrying the bound
//! identifiers is published, which evicts the realms' cached data.

mod handle;
pub mod manager;

pub use self::handle::Session;
pub use self::manager::{SessionContext, SessionManager};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::identity::IdentifierCollection;

/// Identifiers bound at login.
pub const IDENTIFIERS_SESSION_KEY: &str = "custodian.identifiers";
/// Set once the bound identifiers were proven by authentication.
pub const AUTHENTICATED_SESSION_KEY: &str = "custodian.authenticated";
/// Run-as identities, oldest first.
pub const RUN_AS_IDENTIFIERS_SESSION_KEY: &str = "custodian.run_as_identifiers";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    Idle,
    Absolute,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    id: String,
    start_timestamp: DateTime<Utc>,
    last_access_time: DateTime<Utc>,
    idle_timeout: Duration,
    absolute_timeout: Duration,
    host: Option<String>,
    stop_timestamp: Option<DateTime<Utc>>,
    expired: bool,
    attributes: HashMap<String, serde_json::Value>,
}

impl SessionRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        idle_timeout: Duration,
        absolute_timeout: Duration,
        host: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            start_timestamp: now,
            last_access_time: now,
            idle_timeout,
            absolute_timeout,
            host,
            stop_timestamp: None,
            expired: false,
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_timestamp
    }

    #[must_use]
    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.last_access_time
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn absolute_timeout(&self) -> Duration {
        self.absolute_timeout
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn stop_timestamp(&self) -> Option<DateTime<Utc>> {
        self.stop_timestamp
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop_timestamp.is_some()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Which timeout, if any, has elapsed at `now`.
    #[must_use]
    pub fn timed_out_at(&self, now: DateTime<Utc>) -> Option<Expiry> {
        let idle = (now - self.last_access_time).to_std().unwrap_or_default();
        let age = (now - self.start_timestamp).to_std().unwrap_or_default();

        if age > self.absolute_timeout {
            Some(Expiry::Absolute)
        } else if idle > self.idle_timeout {
            Some(Expiry::Idle)
        } else {
            None
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access_time = now;
    }

    pub(crate) fn stop(&mut self, now: DateTime<Utc>) {
        self.stop_timestamp.get_or_insert(now);
    }

    pub(crate) fn expire(&mut self, now: DateTime<Utc>) {
        self.expired = true;
        self.stop_timestamp.get_or_insert(now);
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<serde_json::Value> {
        self.attributes.remove(key)
    }

    #[must_use]
    pub fn attribute_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.attributes.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Identifiers bound at login, if any.
    #[must_use]
    pub fn bound_identifiers(&self) -> Option<IdentifierCollection> {
        self.attributes
            .get(IDENTIFIERS_SESSION_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .filter(|identifiers: &IdentifierCollection| !identifiers.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord::new(
            "01J0000000000000000000000",
            Duration::from_secs(15 * 60),
            Duration::from_secs(30 * 60),
            Some("127.0.0.1".into()),
        )
    }

    #[test]
    fn idle_and_absolute_timeouts() {
        let mut session = record();
        let start = session.start_timestamp();

        assert_eq!(session.timed_out_at(start), None);
        assert_eq!(
            session.timed_out_at(start + chrono::Duration::minutes(20)),
            Some(Expiry::Idle)
        );

        session.touch(start + chrono::Duration::minutes(14));
        assert_eq!(
            session.timed_out_at(start + chrono::Duration::minutes(20)),
            None
        );

        session.touch(start + chrono::Duration::minutes(29));
        assert_eq!(
            session.timed_out_at(start + chrono::Duration::minutes(31)),
            Some(Expiry::Absolute)
        );
    }

    #[test]
    fn stop_keeps_first_timestamp() {
        let mut session = record();
        let start = session.start_timestamp();
        session.stop(start);
        session.expire(start + chrono::Duration::minutes(1));

        assert!(session.is_stopped());
        assert!(session.is_expired());
        assert_eq!(session.stop_timestamp(), Some(start));
    }

    #[test]
    fn bound_identifiers_from_attributes() -> anyhow::Result<()> {
        let mut session = record();
        assert!(session.bound_identifiers().is_none());

        let identifiers = IdentifierCollection::new("AccountStoreRealm", "thedude");
        session.set_attribute(IDENTIFIERS_SESSION_KEY, serde_json::to_value(&identifiers)?);
        session.set_attribute("bowling", serde_json::json!("tuesday"));

        assert_eq!(session.bound_identifiers(), Some(identifiers));
        assert_eq!(
            session.attribute_keys(),
            vec!["bowling".to_string(), IDENTIFIERS_SESSION_KEY.to_string()]
        );
        assert_eq!(
            session.remove_attribute("bowling"),
            Some(serde_json::json!("tuesday"))
        );
        Ok(())
    }
}
