//! # Custodian (Identity and Access Management runtime)
//!
//! `custodian` authenticates subjects against pluggable realms, tracks them
//! through sessions and answers authorization questions about them.
//!
//! ## Subjects and Sessions
//!
//! A [`subject::Subject`] is the acting identity of one unit of work. It is
//! built by the [`manager::SecurityManager`] from a [`subject::SubjectContext`]
//! and resumes its identity from the session named there. Sessions expire on
//! idle or absolute timeout and are validated on every access.
//!
//! ## Realms and Caching
//!
//! An [`realm::AccountStoreRealm`] reads credentials and authorization info
//! from an [`realm::AccountStore`] through a shared cache. Cached entries of an
//! identity are evicted on login, on logout and when its session stops or
//! expires, so stale grants never outlive a session.
//!
//! ## Authorization
//!
//! Permissions are colon-separated wildcard strings (`domain:action:target`,
//! `*` matches anything, `a,b` lists alternatives). A request is granted when
//! any realm grants it; collective checks reduce the verdicts with
//! [`authz::LogicalOperator::All`] or [`authz::LogicalOperator::Any`].
//!
//! ## Events
//!
//! Authentication, authorization and session transitions are published on the
//! [`event::EventBus`]; the realms listen for session ends.

pub mod authc;
pub mod authz;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod manager;
pub mod realm;
pub mod session;
pub mod subject;

pub use self::config::{AuthenticationPolicy, SecurityConfig};
pub use self::error::{Result, SecurityError};
pub use self::identity::IdentifierCollection;
pub use self::manager::{SecurityManager, SecurityManagerBuilder};
pub use self::subject::{Subject, SubjectContext};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
