//! Authorization: wildcard permissions, roles, verifiers and the
//! multi-realm authorizer.

pub mod authorizer;
mod info;
pub mod permission;
pub mod verifier;

pub use self::authorizer::ModularRealmAuthorizer;
pub use self::info::{AuthorizationInfo, Role};
pub use self::permission::WildcardPermission;
pub use self::verifier::{
    IndexedPermissionVerifier, LogicalOperator, SimpleRoleVerifier, Verdict, Verdicts, Verifier,
};
