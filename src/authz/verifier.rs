//! Permission and role verifiers and the lazy per-item verdict sequence.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::info::AuthorizationInfo;
use super::permission::PermissionPart;
use crate::realm::resolver::{PermissionResolver, WildcardPermissionResolver};

/// `(requested item, granted)`.
pub type Verdict = (String, bool);

pub trait Verifier: Send + Sync {
    fn verify(&self, authz_info: &AuthorizationInfo, item: &str) -> bool;
}

/// Lazily evaluated verdicts, one verifier call per `next()`, in request order.
///
/// Without authorization info every item yields `false`. Ask the realm again
/// for a fresh sequence.
#[derive(Clone)]
pub struct Verdicts<'a> {
    items: std::vec::IntoIter<String>,
    authz_info: Option<Arc<AuthorizationInfo>>,
    verifier: &'a dyn Verifier,
}

impl<'a> Verdicts<'a> {
    #[must_use]
    pub fn new(
        items: Vec<String>,
        authz_info: Option<Arc<AuthorizationInfo>>,
        verifier: &'a dyn Verifier,
    ) -> Self {
        Self {
            items: items.into_iter(),
            authz_info,
            verifier,
        }
    }
}

impl Iterator for Verdicts<'_> {
    type Item = Verdict;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        let granted = self
            .authz_info
            .as_deref()
            .is_some_and(|info| self.verifier.verify(info, &item));
        Some((item, granted))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Verdicts<'_> {}

/// Checks requested permission strings against domain-indexed held permissions.
#[derive(Clone)]
pub struct IndexedPermissionVerifier {
    permission_resolver: Arc<dyn PermissionResolver>,
}

impl Default for IndexedPermissionVerifier {
    fn default() -> Self {
        Self {
            permission_resolver: Arc::new(WildcardPermissionResolver),
        }
    }
}

impl IndexedPermissionVerifier {
    pub fn set_permission_resolver(&mut self, resolver: Arc<dyn PermissionResolver>) {
        self.permission_resolver = resolver;
    }
}

impl Verifier for IndexedPermissionVerifier {
    fn verify(&self, authz_info: &AuthorizationInfo, item: &str) -> bool {
        let requested = match self.permission_resolver.resolve(item) {
            Ok(permission) => permission,
            Err(e) => {
                warn!("not evaluating [{item}]: {e}");
                return false;
            }
        };

        match requested.domain() {
            PermissionPart::Wildcard => authz_info
                .permissions_for_domain("*")
                .any(|held| held.implies(&requested)),
            PermissionPart::Values(domains) => domains.iter().any(|domain| {
                authz_info
                    .permissions_for_domain(domain)
                    .any(|held| held.implies(&requested))
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleRoleVerifier;

impl Verifier for SimpleRoleVerifier {
    fn verify(&self, authz_info: &AuthorizationInfo, item: &str) -> bool {
        authz_info.has_role(item)
    }
}

/// How a collective check combines per-item verdicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    Any,
    All,
}

impl LogicalOperator {
    /// `All` over nothing is `true`, `Any` over nothing is `false`.
    pub fn reduce(self, grants: impl IntoIterator<Item = bool>) -> bool {
        let mut grants = grants.into_iter();
        match self {
            Self::Any => grants.any(|granted| granted),
            Self::All => grants.all(|granted| granted),
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}
