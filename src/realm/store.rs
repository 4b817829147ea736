//! Account store contract and an in-memory store loaded from JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::resolver::{
    AuthzInfoResolver, CredentialResolver, IndexedAuthzInfoResolver, PasswordCredentialResolver,
    PermissionResolver, RoleResolver, SimpleRoleResolver, WildcardPermissionResolver,
};
use crate::authc::Account;
use crate::authz::{AuthorizationInfo, Role, WildcardPermission};

/// Backing store of accounts.
///
/// `Ok(None)` means "no such data"; `Err` means the store itself failed.
/// Resolver setters default to no-ops for stores that return domain
/// objects directly.
pub trait AccountStore: Send + Sync {
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn get_credentials(&self, identifier: &str) -> Result<Option<Account>>;

    /// # Errors
    /// Returns an error if the store cannot be read.
    fn get_authz_info(&self, identifier: &str) -> Result<Option<AuthorizationInfo>>;

    fn set_credential_resolver(&mut self, _resolver: Arc<dyn CredentialResolver>) {}

    fn set_permission_resolver(&mut self, _resolver: Arc<dyn PermissionResolver>) {}

    fn set_role_resolver(&mut self, _resolver: Arc<dyn RoleResolver>) {}

    fn set_authz_info_resolver(&mut self, _resolver: Arc<dyn AuthzInfoResolver>) {}
}

/// Raw account data as stored: a password hash plus role and permission strings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Accounts held in memory, keyed by account id.
///
/// An account without roles and permissions has no authorization info.
pub struct MemoryAccountStore {
    accounts: HashMap<String, AccountRecord>,
    credential_resolver: Arc<dyn CredentialResolver>,
    permission_resolver: Arc<dyn PermissionResolver>,
    role_resolver: Arc<dyn RoleResolver>,
    authz_info_resolver: Arc<dyn AuthzInfoResolver>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            credential_resolver: Arc::new(PasswordCredentialResolver),
            permission_resolver: Arc::new(WildcardPermissionResolver),
            role_resolver: Arc::new(SimpleRoleResolver),
            authz_info_resolver: Arc::new(IndexedAuthzInfoResolver),
        }
    }
}

impl std::fmt::Debug for MemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.accounts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("MemoryAccountStore")
            .field("accounts", &ids)
            .finish_non_exhaustive()
    }
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "<account id>": { "password_hash", "roles", "permissions" } }`.
    ///
    /// # Errors
    /// Returns an error if the JSON does not have that shape.
    pub fn from_json(json: &str) -> Result<Self> {
        let accounts: HashMap<String, AccountRecord> =
            serde_json::from_str(json).context("invalid account store JSON")?;
        Ok(Self {
            accounts,
            ..Self::default()
        })
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read account store {}", path.display()))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>, record: AccountRecord) -> Self {
        self.insert(account_id, record);
        self
    }

    /// Insert or replace an account, returning the previous record.
    pub fn insert(
        &mut self,
        account_id: impl Into<String>,
        record: AccountRecord,
    ) -> Option<AccountRecord> {
        self.accounts.insert(account_id.into(), record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get_credentials(&self, identifier: &str) -> Result<Option<Account>> {
        let Some(record) = self.accounts.get(identifier) else {
            debug!("no account [{identifier}] in memory store");
            return Ok(None);
        };
        let Some(hash) = record.password_hash.as_deref() else {
            return Ok(None);
        };

        Ok(Some(
            Account::new(identifier).with_credentials(self.credential_resolver.resolve(hash)),
        ))
    }

    fn get_authz_info(&self, identifier: &str) -> Result<Option<AuthorizationInfo>> {
        let Some(record) = self.accounts.get(identifier) else {
            return Ok(None);
        };
        if record.roles.is_empty() && record.permissions.is_empty() {
            return Ok(None);
        }

        let mut permissions: Vec<WildcardPermission> = Vec::with_capacity(record.permissions.len());
        for raw in &record.permissions {
            match self.permission_resolver.resolve(raw) {
                Ok(permission) => permissions.push(permission),
                Err(e) => warn!("skipping stored permission of [{identifier}]: {e}"),
            }
        }
        let roles: Vec<Role> = record
            .roles
            .iter()
            .map(|raw| self.role_resolver.resolve(raw))
            .collect();

        Ok(Some(self.authz_info_resolver.resolve(permissions, roles)))
    }

    fn set_credential_resolver(&mut self, resolver: Arc<dyn CredentialResolver>) {
        self.credential_resolver = resolver;
    }

    fn set_permission_resolver(&mut self, resolver: Arc<dyn PermissionResolver>) {
        self.permission_resolver = resolver;
    }

    fn set_role_resolver(&mut self, resolver: Arc<dyn RoleResolver>) {
        self.role_resolver = resolver;
    }

    fn set_authz_info_resolver(&mut self, resolver: Arc<dyn AuthzInfoResolver>) {
        self.authz_info_resolver = resolver;
    }
}
