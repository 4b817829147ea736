//! Multi-realm authentication under an explicit [`AuthenticationPolicy`].

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::AuthenticationToken;
use crate::config::AuthenticationPolicy;
use crate::error::{Result, SecurityError};
use crate::event::{EventBus, EventPayload, Topic};
use crate::identity::IdentifierCollection;
use crate::realm::Realm;

pub struct ModularRealmAuthenticator {
    realms: Vec<Arc<dyn Realm>>,
    policy: AuthenticationPolicy,
    event_bus: Arc<EventBus>,
}

impl std::fmt::Debug for ModularRealmAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let realms: Vec<&str> = self.realms.iter().map(|realm| realm.name()).collect();
        f.debug_struct("ModularRealmAuthenticator")
            .field("realms", &realms)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ModularRealmAuthenticator {
    #[must_use]
    pub fn new(
        realms: Vec<Arc<dyn Realm>>,
        policy: AuthenticationPolicy,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            realms,
            policy,
            event_bus,
        }
    }

    #[must_use]
    pub fn policy(&self) -> AuthenticationPolicy {
        self.policy
    }

    /// Authenticate `token` and return the identifiers of every realm that
    /// vouched for it, the first one being primary.
    ///
    /// Publishes `AUTHENTICATION.SUCCEEDED` or `AUTHENTICATION.FAILED`.
    ///
    /// # Errors
    /// `Authentication` when the policy is not met, `RealmMisconfigured` or
    /// `InvalidArgument` when no realm can handle the token, `AccountStore`
    /// when a store fails.
    #[instrument(skip_all, fields(policy = ?self.policy))]
    pub fn authenticate_account(
        &self,
        token: &dyn AuthenticationToken,
    ) -> Result<IdentifierCollection> {
        let outcome = self.attempt(token);

        let identifier = token.identifier().to_string();
        match &outcome {
            Ok(identifiers) => {
                info!("[{identifiers}] authenticated");
                self.event_bus.publish(
                    Topic::AuthenticationSucceeded,
                    EventPayload::Authentication { identifier },
                );
            }
            Err(e) => {
                warn!("authentication of [{identifier}] failed: {e}");
                self.event_bus.publish(
                    Topic::AuthenticationFailed,
                    EventPayload::Authentication { identifier },
                );
            }
        }

        outcome
    }

    fn attempt(&self, token: &dyn AuthenticationToken) -> Result<IdentifierCollection> {
        if self.realms.is_empty() {
            return Err(SecurityError::RealmMisconfigured(
                "no realms configured for authentication".to_string(),
            ));
        }

        let supporting: Vec<&Arc<dyn Realm>> = self
            .realms
            .iter()
            .filter(|realm| realm.supports(token))
            .collect();
        if supporting.is_empty() {
            return Err(SecurityError::InvalidArgument(format!(
                "no realm supports token {token:?}"
            )));
        }

        let mut identifiers = IdentifierCollection::default();
        let mut failures = 0_usize;

        for realm in supporting {
            match realm.authenticate_account(token) {
                Ok(account) => {
                    identifiers.add(realm.name(), account.account_id());
                    if self.policy == AuthenticationPolicy::FirstSuccessful {
                        break;
                    }
                }
                Err(e) if e.is_authentication_failure() => {
                    debug!("realm {} rejected [{}]: {e}", realm.name(), token.identifier());
                    failures += 1;
                    if self.policy == AuthenticationPolicy::AllSuccessful {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let satisfied = match self.policy {
            AuthenticationPolicy::FirstSuccessful | AuthenticationPolicy::AtLeastOne => {
                !identifiers.is_empty()
            }
            AuthenticationPolicy::AllSuccessful => failures == 0 && !identifiers.is_empty(),
        };

        if satisfied {
            Ok(identifiers)
        } else {
            Err(SecurityError::Authentication(token.identifier().to_string()))
        }
    }
}
