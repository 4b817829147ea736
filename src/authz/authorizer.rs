//! Multi-realm authorization.
//!
//! An item is granted if ANY realm grants it. Every evaluation publishes
//! `AUTHORIZATION.RESULTS`; collective evaluations also publish
//! `AUTHORIZATION.GRANTED` or `AUTHORIZATION.DENIED`.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::verifier::{LogicalOperator, Verdict, Verdicts};
use crate::error::{Result, SecurityError};
use crate::event::{EventBus, EventPayload, Topic};
use crate::identity::IdentifierCollection;
use crate::realm::Realm;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Check {
    Permission,
    Role,
}

pub struct ModularRealmAuthorizer {
    realms: Vec<Arc<dyn Realm>>,
    event_bus: Arc<EventBus>,
}

impl std::fmt::Debug for ModularRealmAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let realms: Vec<&str> = self.realms.iter().map(|realm| realm.name()).collect();
        f.debug_struct("ModularRealmAuthorizer")
            .field("realms", &realms)
            .finish_non_exhaustive()
    }
}

impl ModularRealmAuthorizer {
    #[must_use]
    pub fn new(realms: Vec<Arc<dyn Realm>>, event_bus: Arc<EventBus>) -> Self {
        Self { realms, event_bus }
    }

    /// Per-permission verdicts, in request order.
    ///
    /// # Errors
    /// `IdentifiersNotSet` for empty identifiers, `RealmMisconfigured` without realms.
    #[instrument(skip_all)]
    pub fn is_permitted(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<Vec<Verdict>> {
        self.evaluate(Check::Permission, identifiers, permissions)
    }

    /// # Errors
    /// See [`ModularRealmAuthorizer::is_permitted`].
    #[instrument(skip_all)]
    pub fn is_permitted_collective(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
        logical_operator: LogicalOperator,
    ) -> Result<bool> {
        let verdicts = self.evaluate(Check::Permission, identifiers, permissions)?;
        Ok(self.collective(identifiers, verdicts, logical_operator))
    }

    /// Per-role verdicts, in request order.
    ///
    /// # Errors
    /// See [`ModularRealmAuthorizer::is_permitted`].
    #[instrument(skip_all)]
    pub fn has_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<Vec<Verdict>> {
        self.evaluate(Check::Role, identifiers, roles)
    }

    /// # Errors
    /// See [`ModularRealmAuthorizer::is_permitted`].
    #[instrument(skip_all)]
    pub fn has_role_collective(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
        logical_operator: LogicalOperator,
    ) -> Result<bool> {
        let verdicts = self.evaluate(Check::Role, identifiers, roles)?;
        Ok(self.collective(identifiers, verdicts, logical_operator))
    }

    /// # Errors
    /// `Unauthorized` if the permissions are not granted under `logical_operator`.
    pub fn check_permission(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
        logical_operator: LogicalOperator,
    ) -> Result<()> {
        if self.is_permitted_collective(identifiers, permissions, logical_operator)? {
            Ok(())
        } else {
            Err(SecurityError::Unauthorized(format!(
                "[{identifiers}] lacks permission(s) {permissions:?}"
            )))
        }
    }

    /// # Errors
    /// `Unauthorized` if the roles are not held under `logical_operator`.
    pub fn check_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
        logical_operator: LogicalOperator,
    ) -> Result<()> {
        if self.has_role_collective(identifiers, roles, logical_operator)? {
            Ok(())
        } else {
            Err(SecurityError::Unauthorized(format!(
                "[{identifiers}] lacks role(s) {roles:?}"
            )))
        }
    }

    fn evaluate(
        &self,
        check: Check,
        identifiers: &IdentifierCollection,
        items: &[String],
    ) -> Result<Vec<Verdict>> {
        if identifiers.is_empty() {
            return Err(SecurityError::IdentifiersNotSet);
        }
        if self.realms.is_empty() {
            return Err(SecurityError::RealmMisconfigured(
                "no realms configured for authorization".to_string(),
            ));
        }

        let mut verdicts: Vec<Verdict> = items.iter().map(|item| (item.clone(), false)).collect();
        for realm in &self.realms {
            let realm_verdicts: Verdicts<'_> = match check {
                Check::Permission => realm.is_permitted(identifiers, items.to_vec()),
                Check::Role => realm.has_role(identifiers, items.to_vec()),
            };
            for (merged, (_, granted)) in verdicts.iter_mut().zip(realm_verdicts) {
                merged.1 |= granted;
            }
        }

        debug!("{check:?} verdicts for [{identifiers}]: {verdicts:?}");

        self.event_bus.publish(
            Topic::AuthorizationResults,
            EventPayload::Authorization {
                identifiers: identifiers.clone(),
                items: verdicts.clone(),
                logical_operator: None,
            },
        );

        Ok(verdicts)
    }

    fn collective(
        &self,
        identifiers: &IdentifierCollection,
        verdicts: Vec<Verdict>,
        logical_operator: LogicalOperator,
    ) -> bool {
        let granted = logical_operator.reduce(verdicts.iter().map(|(_, granted)| *granted));
        let topic = if granted {
            Topic::AuthorizationGranted
        } else {
            Topic::AuthorizationDenied
        };
        self.event_bus.publish(
            topic,
            EventPayload::Authorization {
                identifiers: identifiers.clone(),
                items: verdicts,
                logical_operator: Some(logical_operator),
            },
        );
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::realm::{AccountRecord, AccountStoreRealm, MemoryAccountStore};
    use parking_lot::Mutex;

    fn realm(name: &str, permissions: &[&str], roles: &[&str]) -> Arc<dyn Realm> {
        let store = MemoryAccountStore::new().with_account(
            "thedude",
            AccountRecord {
                password_hash: None,
                roles: roles.iter().map(ToString::to_string).collect(),
                permissions: permissions.iter().map(ToString::to_string).collect(),
            },
        );
        Arc::new(AccountStoreRealm::new(name, store))
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    fn authorizer() -> (ModularRealmAuthorizer, Arc<Mutex<Vec<Event>>>) {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        for topic in [
            Topic::AuthorizationResults,
            Topic::AuthorizationGranted,
            Topic::AuthorizationDenied,
        ] {
            let sink = Arc::clone(&events);
            bus.register(topic, move |event| sink.lock().push(event.clone()));
        }
        let realms = vec![
            realm("one", &["courier:transport:*"], &["courier"]),
            realm("two", &["money:withdrawal"], &["bowler"]),
        ];
        (ModularRealmAuthorizer::new(realms, bus), events)
    }

    fn dude() -> IdentifierCollection {
        IdentifierCollection::new("one", "thedude")
    }

    #[test]
    fn any_realm_grants_and_order_is_kept() -> anyhow::Result<()> {
        let (authz, events) = authorizer();
        let verdicts = authz.is_permitted(
            &dude(),
            &strings(&["money:withdrawal", "money:deposit", "courier:transport:rug"]),
        )?;

        assert_eq!(
            verdicts,
            vec![
                ("money:withdrawal".to_string(), true),
                ("money:deposit".to_string(), false),
                ("courier:transport:rug".to_string(), true),
            ]
        );

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, Topic::AuthorizationResults);
        assert_eq!(events[0].payload.items(), Some(verdicts.as_slice()));
        assert_eq!(events[0].payload.identifiers(), Some(&dude()));
        Ok(())
    }

    #[test]
    fn collective_publishes_verdict_topic() -> anyhow::Result<()> {
        let (authz, events) = authorizer();

        assert!(authz.has_role_collective(
            &dude(),
            &strings(&["courier", "bowler"]),
            LogicalOperator::All
        )?);
        assert!(!authz.is_permitted_collective(
            &dude(),
            &strings(&["money:deposit", "bank:rob"]),
            LogicalOperator::Any
        )?);

        let topics: Vec<Topic> = events.lock().iter().map(|e| e.topic).collect();
        assert_eq!(
            topics,
            vec![
                Topic::AuthorizationResults,
                Topic::AuthorizationGranted,
                Topic::AuthorizationResults,
                Topic::AuthorizationDenied,
            ]
        );
        Ok(())
    }

    #[test]
    fn empty_collectives() -> anyhow::Result<()> {
        let (authz, _) = authorizer();
        assert!(authz.is_permitted_collective(&dude(), &[], LogicalOperator::All)?);
        assert!(!authz.is_permitted_collective(&dude(), &[], LogicalOperator::Any)?);
        Ok(())
    }

    #[test]
    fn checks_and_preconditions() {
        let (authz, _) = authorizer();

        assert!(authz
            .check_role(&dude(), &strings(&["courier"]), LogicalOperator::All)
            .is_ok());
        assert!(matches!(
            authz.check_permission(&dude(), &strings(&["bank:rob"]), LogicalOperator::All),
            Err(SecurityError::Unauthorized(_))
        ));
        assert!(matches!(
            authz.is_permitted(&IdentifierCollection::default(), &strings(&["a"])),
            Err(SecurityError::IdentifiersNotSet)
        ));

        let empty = ModularRealmAuthorizer::new(Vec::new(), Arc::new(EventBus::new()));
        assert!(matches!(
            empty.has_role(&dude(), &strings(&["courier"])),
            Err(SecurityError::RealmMisconfigured(_))
        ));
    }
}
