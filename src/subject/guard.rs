//! Guards: capability checks wrapped around a handler.
//!
//! A guard runs its check against the current Subject and only then calls the
//! handler. Every check first validates the subject's session, so a stopped or
//! expired session fails the guard with its session error. Identity checks
//! fail with `Unauthenticated`, capability checks with `Unauthorized`.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;

use super::Subject;
use crate::authz::LogicalOperator;
use crate::error::{Result, SecurityError};

/// Resource parameters used to fill `{name}` placeholders of dynamic permissions.
pub type ResourceParams = HashMap<String, String>;

type Check = Box<dyn Fn(&mut Subject, &ResourceParams) -> Result<()> + Send + Sync>;

pub struct Guard {
    name: &'static str,
    check: Check,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("name", &self.name).finish()
    }
}

const PLACEHOLDER: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Fill `{name}` placeholders from `params`.
///
/// # Errors
/// `InvalidArgument` naming the first placeholder without a value.
pub fn resolve_template(template: &str, params: &ResourceParams) -> Result<String> {
    let placeholder = Regex::new(PLACEHOLDER)
        .map_err(|e| SecurityError::InvalidArgument(format!("placeholder pattern: {e}")))?;
    let mut missing: Option<String> = None;
    let resolved = placeholder.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        if let Some(value) = params.get(name) {
            value.clone()
        } else {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        }
    });

    match missing {
        Some(name) => Err(SecurityError::InvalidArgument(format!(
            "no resource parameter [{name}] for permission template [{template}]"
        ))),
        None => Ok(resolved.into_owned()),
    }
}

fn require_identity(subject: &mut Subject) -> Result<()> {
    subject.validate_session()?;
    if subject.identifiers().is_some() {
        Ok(())
    } else {
        Err(SecurityError::Unauthenticated)
    }
}

impl Guard {
    fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&mut Subject, &ResourceParams) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Box::new(check),
        }
    }

    /// Passes only for a subject authenticated in this session.
    #[must_use]
    pub fn requires_authentication() -> Self {
        Self::new("requires_authentication", |subject, _| {
            subject.validate_session()?;
            if subject.is_authenticated() {
                Ok(())
            } else {
                Err(SecurityError::Unauthenticated)
            }
        })
    }

    /// Passes for an authenticated or remembered subject.
    #[must_use]
    pub fn requires_user() -> Self {
        Self::new("requires_user", |subject, _| {
            subject.validate_session()?;
            if subject.is_authenticated() || subject.is_remembered() {
                Ok(())
            } else {
                Err(SecurityError::Unauthenticated)
            }
        })
    }

    /// Passes only for a subject with no known identity.
    #[must_use]
    pub fn requires_guest() -> Self {
        Self::new("requires_guest", |subject, _| {
            subject.validate_session()?;
            if subject.is_authenticated() || subject.is_remembered() {
                Err(SecurityError::Unauthorized(
                    "only guests may access this resource".to_string(),
                ))
            } else {
                Ok(())
            }
        })
    }

    #[must_use]
    pub fn requires_permission(permissions: &[&str], logical_operator: LogicalOperator) -> Self {
        let permissions: Vec<String> = permissions.iter().map(ToString::to_string).collect();
        Self::new("requires_permission", move |subject, _| {
            require_identity(subject)?;
            let requested: Vec<&str> = permissions.iter().map(String::as_str).collect();
            subject.check_permission(&requested, logical_operator)
        })
    }

    /// Like [`Guard::requires_permission`], with `{name}` placeholders filled
    /// from the resource parameters given to [`Guard::call_with`].
    #[must_use]
    pub fn requires_dynamic_permission(
        templates: &[&str],
        logical_operator: LogicalOperator,
    ) -> Self {
        let templates: Vec<String> = templates.iter().map(ToString::to_string).collect();
        Self::new("requires_dynamic_permission", move |subject, params| {
            require_identity(subject)?;
            let resolved = templates
                .iter()
                .map(|template| resolve_template(template, params))
                .collect::<Result<Vec<String>>>()?;
            let requested: Vec<&str> = resolved.iter().map(String::as_str).collect();
            subject.check_permission(&requested, logical_operator)
        })
    }

    #[must_use]
    pub fn requires_role(roles: &[&str], logical_operator: LogicalOperator) -> Self {
        let roles: Vec<String> = roles.iter().map(ToString::to_string).collect();
        Self::new("requires_role", move |subject, _| {
            require_identity(subject)?;
            let requested: Vec<&str> = roles.iter().map(String::as_str).collect();
            subject.check_role(&requested, logical_operator)
        })
    }

    /// # Errors
    /// The check's error; the handler does not run.
    pub fn check(&self, subject: &mut Subject, params: &ResourceParams) -> Result<()> {
        (self.check)(subject, params)
    }

    /// Run `handler` if the check passes.
    ///
    /// # Errors
    /// `Unauthenticated` or `Unauthorized` from the check, or the session
    /// error of a dead session.
    pub fn call<T>(
        &self,
        subject: &mut Subject,
        handler: impl FnOnce(&mut Subject) -> T,
    ) -> Result<T> {
        self.call_with(subject, &ResourceParams::new(), handler)
    }

    /// Run `handler` if the check passes for `params`.
    ///
    /// # Errors
    /// `Unauthenticated` or `Unauthorized` from the check, `InvalidArgument`
    /// when a placeholder has no parameter.
    pub fn call_with<T>(
        &self,
        subject: &mut Subject,
        params: &ResourceParams,
        handler: impl FnOnce(&mut Subject) -> T,
    ) -> Result<T> {
        self.check(subject, params)?;
        Ok(handler(subject))
    }
}
