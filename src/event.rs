//! Publish/subscribe bus for audit and lifecycle events.
//!
//! The bus is an explicit handle owned by the security manager. Listeners
//! are called synchronously, in registration order, outside the registry lock
//! so a listener may register or publish without deadlocking.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::authz::{LogicalOperator, Verdict};
use crate::identity::IdentifierCollection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    AuthenticationSucceeded,
    AuthenticationFailed,
    AuthorizationResults,
    AuthorizationGranted,
    AuthorizationDenied,
    SessionStart,
    SessionStop,
    SessionExpire,
}

impl Topic {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationSucceeded => "AUTHENTICATION.SUCCEEDED",
            Self::AuthenticationFailed => "AUTHENTICATION.FAILED",
            Self::AuthorizationResults => "AUTHORIZATION.RESULTS",
            Self::AuthorizationGranted => "AUTHORIZATION.GRANTED",
            Self::AuthorizationDenied => "AUTHORIZATION.DENIED",
            Self::SessionStart => "SESSION.START",
            Self::SessionStop => "SESSION.STOP",
            Self::SessionExpire => "SESSION.EXPIRE",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Authentication {
        identifier: String,
    },
    Authorization {
        identifiers: IdentifierCollection,
        items: Vec<Verdict>,
        #[serde(skip_serializing_if = "Option::is_none")]
        logical_operator: Option<LogicalOperator>,
    },
    Session {
        session_id: String,
        identifiers: Option<IdentifierCollection>,
    },
}

impl EventPayload {
    /// Identifiers carried by the payload, if any.
    #[must_use]
    pub fn identifiers(&self) -> Option<&IdentifierCollection> {
        match self {
            Self::Authorization { identifiers, .. } => Some(identifiers),
            Self::Session { identifiers, .. } => identifiers.as_ref(),
            Self::Authentication { .. } => None,
        }
    }

    #[must_use]
    pub fn items(&self) -> Option<&[Verdict]> {
        match self {
            Self::Authorization { items, .. } => Some(items),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: Topic,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<Topic, Vec<Listener>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(topic, registered)| (topic.as_str(), registered.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, topic: Topic, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(topic)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Publish `payload` under `topic` and return the delivered event.
    pub fn publish(&self, topic: Topic, payload: EventPayload) -> Event {
        let event = Event {
            id: Uuid::now_v7(),
            topic,
            occurred_at: Utc::now(),
            payload,
        };

        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        debug!(
            "publishing {} to {} listener(s), event {}",
            topic,
            listeners.len(),
            event.id
        );

        for listener in &listeners {
            listener(&event);
        }

        event
    }

    #[must_use]
    pub fn listener_count(&self, topic: Topic) -> usize {
        self.listeners.read().get(&topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn delivers_only_to_registered_topic() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.register(Topic::AuthorizationResults, move |event| {
            sink.lock().push(event.payload.items().map(<[Verdict]>::to_vec));
        });

        bus.publish(
            Topic::SessionStart,
            EventPayload::Session {
                session_id: "s1".into(),
                identifiers: None,
            },
        );
        bus.publish(
            Topic::AuthorizationResults,
            EventPayload::Authorization {
                identifiers: IdentifierCollection::new("accounts", "thedude"),
                items: vec![("courier".into(), true)],
                logical_operator: None,
            },
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Some(vec![("courier".to_string(), true)]));
        assert_eq!(bus.listener_count(Topic::AuthorizationResults), 1);
        assert_eq!(bus.listener_count(Topic::SessionStop), 0);
    }

    #[test]
    fn listener_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let stops = Arc::new(Mutex::new(0_u32));

        let inner = Arc::clone(&bus);
        bus.register(Topic::SessionExpire, move |event| {
            inner.publish(Topic::SessionStop, event.payload.clone());
        });
        let counter = Arc::clone(&stops);
        bus.register(Topic::SessionStop, move |_| *counter.lock() += 1);

        bus.publish(
            Topic::SessionExpire,
            EventPayload::Session {
                session_id: "s2".into(),
                identifiers: None,
            },
        );

        assert_eq!(*stops.lock(), 1);
    }

    #[test]
    fn events_serialize_with_topic_names() -> anyhow::Result<()> {
        let bus = EventBus::new();
        let event = bus.publish(
            Topic::AuthenticationFailed,
            EventPayload::Authentication {
                identifier: "thedude".into(),
            },
        );
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["topic"], "AUTHENTICATION.FAILED");
        assert_eq!(json["payload"]["kind"], "authentication");
        assert_eq!(json["payload"]["identifier"], "thedude");
        Ok(())
    }
}
