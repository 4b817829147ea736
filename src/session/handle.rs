use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::SessionManager;
use crate::error::{Result, SecurityError};

/// A subject's view of its session. Every call validates the session and
/// records the access.
#[derive(Clone)]
pub struct Session {
    id: String,
    manager: Arc<SessionManager>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub(crate) fn new(id: String, manager: Arc<SessionManager>) -> Self {
        Self { id, manager }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// # Errors
    /// `UnknownSession`, `StoppedSession` or `ExpiredSession`.
    pub fn touch(&self) -> Result<()> {
        self.manager.touch(&self.id)
    }

    /// # Errors
    /// `UnknownSession` if the session is no longer live.
    pub fn stop(&self) -> Result<()> {
        self.manager.stop(&self.id)
    }

    /// Typed attribute read. A value that does not deserialize as `T` is an
    /// `InvalidArgument` error.
    ///
    /// # Errors
    /// Session validation errors, or `InvalidArgument`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.manager
            .get_attribute(&self.id, key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    SecurityError::InvalidArgument(format!("session attribute {key}: {e}"))
                })
            })
            .transpose()
    }

    /// # Errors
    /// Session validation errors, or `InvalidArgument` if `value` does not serialize.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| SecurityError::InvalidArgument(format!("session attribute {key}: {e}")))?;
        self.manager.set_attribute(&self.id, key, value)
    }

    /// # Errors
    /// Session validation errors.
    pub fn remove(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.manager.remove_attribute(&self.id, key)
    }

    /// # Errors
    /// Session validation errors.
    pub fn attribute_keys(&self) -> Result<Vec<String>> {
        self.manager.attribute_keys(&self.id)
    }

    /// # Errors
    /// Session validation errors.
    pub fn last_access_time(&self) -> Result<DateTime<Utc>> {
        self.manager.last_access_time(&self.id)
    }

    /// # Errors
    /// Session validation errors.
    pub fn start_timestamp(&self) -> Result<DateTime<Utc>> {
        self.manager.start_timestamp(&self.id)
    }

    /// # Errors
    /// Session validation errors.
    pub fn timeouts(&self) -> Result<(Duration, Duration)> {
        self.manager.timeouts(&self.id)
    }

    /// # Errors
    /// Session validation errors.
    pub fn host(&self) -> Result<Option<String>> {
        self.manager.host(&self.id)
    }
}
