//! Realms: pluggable authentication/authorization backends.

pub mod account_store_realm;
pub mod resolver;
pub mod store;

pub use self::account_store_realm::AccountStoreRealm;
pub use self::store::{AccountRecord, AccountStore, MemoryAccountStore};

use std::sync::Arc;

use crate::authc::{Account, AuthenticationToken};
use crate::authz::Verdicts;
use crate::error::Result;
use crate::identity::IdentifierCollection;

pub trait Realm: Send + Sync {
    /// Source name stamped on the identifiers this realm authenticates.
    fn name(&self) -> &str;

    fn supports(&self, token: &dyn AuthenticationToken) -> bool;

    /// # Errors
    /// `InvalidArgument` for unsupported tokens, `CredentialsNotFound` or
    /// `IncorrectCredentials` when authentication fails, `AccountStore` when
    /// the store cannot be read.
    fn authenticate_account(&self, token: &dyn AuthenticationToken) -> Result<Arc<Account>>;

    /// Per-permission verdicts in input order. Never fails: without
    /// authorization info every permission is denied.
    fn is_permitted(&self, identifiers: &IdentifierCollection, permissions: Vec<String>)
        -> Verdicts<'_>;

    /// Per-role verdicts in input order, see [`Realm::is_permitted`].
    fn has_role(&self, identifiers: &IdentifierCollection, roles: Vec<String>) -> Verdicts<'_>;

    /// Evict cached credentials and authorization info for `identifiers`.
    fn do_clear_cache(&self, identifiers: &IdentifierCollection);
}
