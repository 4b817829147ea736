//! Domain resolvers: turn raw account-store values into domain objects.
//!
//! Realms hand their resolvers to the account store, and the permission
//! resolver also to the permission verifier, so that stored and requested
//! permissions are interpreted the same way.

use crate::authc::Credentials;
use crate::authz::{AuthorizationInfo, Role, WildcardPermission};
use crate::error::Result;

pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Credentials;
}

pub trait PermissionResolver: Send + Sync {
    /// # Errors
    /// `InvalidPermission` if `raw` is not a valid permission string.
    fn resolve(&self, raw: &str) -> Result<WildcardPermission>;
}

pub trait RoleResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Role;
}

pub trait AuthzInfoResolver: Send + Sync {
    fn resolve(&self, permissions: Vec<WildcardPermission>, roles: Vec<Role>) -> AuthorizationInfo;
}

/// Treats the raw value as a PHC password hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordCredentialResolver;

impl CredentialResolver for PasswordCredentialResolver {
    fn resolve(&self, raw: &str) -> Credentials {
        Credentials::new(raw)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WildcardPermissionResolver;

impl PermissionResolver for WildcardPermissionResolver {
    fn resolve(&self, raw: &str) -> Result<WildcardPermission> {
        WildcardPermission::parse(raw)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleRoleResolver;

impl RoleResolver for SimpleRoleResolver {
    fn resolve(&self, raw: &str) -> Role {
        Role::new(raw.trim())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IndexedAuthzInfoResolver;

impl AuthzInfoResolver for IndexedAuthzInfoResolver {
    fn resolve(&self, permissions: Vec<WildcardPermission>, roles: Vec<Role>) -> AuthorizationInfo {
        AuthorizationInfo::new(permissions, roles)
    }
}
