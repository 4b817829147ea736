//! The Subject: the acting identity of one request or unit of work.
//!
//! A Subject carries the identifiers proven at login, an optional session
//! and a stack of run-as identities. Authorization always evaluates the
//! current identity: the top of the run-as stack, or the authenticated
//! identifiers when the stack is empty. Identity state is mirrored into the
//! session so a subject resumed from the same session id sees it again, and
//! every authorization call first validates that session: once it is stopped
//! or expired the identity is gone.

mod context;
pub mod guard;

pub use self::context::SubjectContext;
pub use self::guard::{Guard, ResourceParams};

use std::sync::Arc;
use tracing::{debug, info};

use crate::authc::AuthenticationToken;
use crate::authz::{LogicalOperator, Verdict};
use crate::error::{Result, SecurityError};
use crate::identity::IdentifierCollection;
use crate::manager::SecurityManager;
use crate::session::{Session, RUN_AS_IDENTIFIERS_SESSION_KEY};

pub struct Subject {
    security_manager: Arc<SecurityManager>,
    pub(crate) identifiers: Option<IdentifierCollection>,
    pub(crate) authenticated: bool,
    pub(crate) remembered: bool,
    pub(crate) session: Option<Session>,
    pub(crate) run_as: Vec<IdentifierCollection>,
    pub(crate) host: Option<String>,
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("identifiers", &self.identifiers)
            .field("authenticated", &self.authenticated)
            .field("remembered", &self.remembered)
            .field("session", &self.session)
            .field("run_as", &self.run_as)
            .finish_non_exhaustive()
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Subject {
    pub(crate) fn new(security_manager: Arc<SecurityManager>, host: Option<String>) -> Self {
        Self {
            security_manager,
            identifiers: None,
            authenticated: false,
            remembered: false,
            session: None,
            run_as: Vec::new(),
            host,
        }
    }

    /// # Errors
    /// `Authentication` if the token is rejected, misconfiguration or store
    /// errors otherwise.
    pub fn login(&mut self, token: &dyn AuthenticationToken) -> Result<()> {
        let manager = Arc::clone(&self.security_manager);
        manager.login(self, token)
    }

    /// Clear cached account data, stop the session and forget the identity.
    /// Calling it again is a no-op.
    pub fn logout(&mut self) {
        let manager = Arc::clone(&self.security_manager);
        manager.logout(self);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Identity recalled without authentication in this session.
    #[must_use]
    pub fn is_remembered(&self) -> bool {
        self.remembered && !self.authenticated && self.identifiers.is_some()
    }

    /// Current identity: the latest run-as identity, else the authenticated one.
    #[must_use]
    pub fn identifiers(&self) -> Option<&IdentifierCollection> {
        self.run_as.last().or(self.identifiers.as_ref())
    }

    /// Identity proven at login, ignoring run-as.
    #[must_use]
    pub fn authenticated_identifiers(&self) -> Option<&IdentifierCollection> {
        self.identifiers.as_ref()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Record an access on the session, if there is one. A session found
    /// stopped or expired ends the identity, see [`Subject::get_session`].
    ///
    /// # Errors
    /// `ExpiredSession`, `StoppedSession` or `UnknownSession`.
    pub fn validate_session(&mut self) -> Result<()> {
        if self.session.is_some() {
            self.get_session(false)?;
        }
        Ok(())
    }

    fn current(&mut self) -> Result<IdentifierCollection> {
        self.validate_session()?;
        self.identifiers()
            .cloned()
            .ok_or(SecurityError::IdentifiersNotSet)
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, session errors as in
    /// [`Subject::validate_session`].
    pub fn is_permitted(&mut self, permissions: &[&str]) -> Result<Vec<Verdict>> {
        let identifiers = self.current()?;
        self.security_manager
            .authorizer()
            .is_permitted(&identifiers, &owned(permissions))
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, session errors as in
    /// [`Subject::validate_session`].
    pub fn is_permitted_collective(
        &mut self,
        permissions: &[&str],
        logical_operator: LogicalOperator,
    ) -> Result<bool> {
        let identifiers = self.current()?;
        self.security_manager.authorizer().is_permitted_collective(
            &identifiers,
            &owned(permissions),
            logical_operator,
        )
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, session errors as in
    /// [`Subject::validate_session`].
    pub fn has_role(&mut self, roles: &[&str]) -> Result<Vec<Verdict>> {
        let identifiers = self.current()?;
        self.security_manager
            .authorizer()
            .has_role(&identifiers, &owned(roles))
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, session errors as in
    /// [`Subject::validate_session`].
    pub fn has_role_collective(
        &mut self,
        roles: &[&str],
        logical_operator: LogicalOperator,
    ) -> Result<bool> {
        let identifiers = self.current()?;
        self.security_manager.authorizer().has_role_collective(
            &identifiers,
            &owned(roles),
            logical_operator,
        )
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, `Unauthorized` if not granted,
    /// session errors as in [`Subject::validate_session`].
    pub fn check_permission(
        &mut self,
        permissions: &[&str],
        logical_operator: LogicalOperator,
    ) -> Result<()> {
        let identifiers = self.current()?;
        self.security_manager.authorizer().check_permission(
            &identifiers,
            &owned(permissions),
            logical_operator,
        )
    }

    /// # Errors
    /// `IdentifiersNotSet` without an identity, `Unauthorized` if not held,
    /// session errors as in [`Subject::validate_session`].
    pub fn check_role(&mut self, roles: &[&str], logical_operator: LogicalOperator) -> Result<()> {
        let identifiers = self.current()?;
        self.security_manager.authorizer().check_role(
            &identifiers,
            &owned(roles),
            logical_operator,
        )
    }

    /// Act as `identifiers` until [`Subject::pop_identity`].
    ///
    /// # Errors
    /// `IllegalState` unless authenticated, `InvalidArgument` for empty
    /// identifiers, session errors when persisting the stack.
    pub fn run_as(&mut self, identifiers: IdentifierCollection) -> Result<()> {
        if !self.authenticated || self.identifiers.is_none() {
            return Err(SecurityError::IllegalState(
                "only an authenticated subject can run as another identity".to_string(),
            ));
        }
        if identifiers.is_empty() {
            return Err(SecurityError::InvalidArgument(
                "run_as requires non-empty identifiers".to_string(),
            ));
        }

        info!("[{}] running as [{identifiers}]", self.describe());
        self.run_as.push(identifiers);
        self.persist_run_as()
    }

    /// Drop the latest run-as identity and return it. With an empty stack
    /// nothing changes and `None` is returned.
    ///
    /// # Errors
    /// Session errors when persisting the stack.
    pub fn pop_identity(&mut self) -> Result<Option<IdentifierCollection>> {
        let Some(popped) = self.run_as.pop() else {
            return Ok(None);
        };
        info!("[{}] released run-as identity [{popped}]", self.describe());
        self.persist_run_as()?;
        Ok(Some(popped))
    }

    #[must_use]
    pub fn is_run_as(&self) -> bool {
        !self.run_as.is_empty()
    }

    /// Identity that was current before the latest `run_as`.
    #[must_use]
    pub fn previous_identifiers(&self) -> Option<&IdentifierCollection> {
        match self.run_as.len() {
            0 => None,
            1 => self.identifiers.as_ref(),
            n => self.run_as.get(n - 2),
        }
    }

    /// The active session. With `create`, one is started when there is none
    /// and session creation is enabled.
    ///
    /// A session found stopped or expired here ends the subject's identity
    /// and the error is returned.
    ///
    /// # Errors
    /// `ExpiredSession`, `StoppedSession` or `UnknownSession`.
    pub fn get_session(&mut self, create: bool) -> Result<Option<Session>> {
        if let Some(session) = &self.session {
            return match session.touch() {
                Ok(()) => Ok(Some(session.clone())),
                Err(e) => {
                    if matches!(
                        e,
                        SecurityError::ExpiredSession(_)
                            | SecurityError::StoppedSession(_)
                            | SecurityError::UnknownSession(_)
                    ) {
                        debug!("dropping session of [{}]: {e}", self.describe());
                        self.reset();
                    }
                    Err(e)
                }
            };
        }

        if !create || !self.security_manager.config().session_creation_enabled() {
            return Ok(None);
        }

        let session = self.security_manager.start_session(self.host.clone());
        self.session = Some(session.clone());
        Ok(Some(session))
    }

    fn persist_run_as(&mut self) -> Result<()> {
        let Some(session) = self.get_session(true)? else {
            return Ok(());
        };
        if self.run_as.is_empty() {
            session.remove(RUN_AS_IDENTIFIERS_SESSION_KEY)?;
            Ok(())
        } else {
            session.set(RUN_AS_IDENTIFIERS_SESSION_KEY, &self.run_as)
        }
    }

    pub(crate) fn reset(&mut self) {
        self.identifiers = None;
        self.authenticated = false;
        self.remembered = false;
        self.session = None;
        self.run_as.clear();
    }

    fn describe(&self) -> String {
        self.identifiers
            .as_ref()
            .map_or_else(|| "<anonymous>".to_string(), ToString::to_string)
    }
}
