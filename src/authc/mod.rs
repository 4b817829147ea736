//! Authentication: tokens, accounts, credential matching and the
//! multi-realm authenticator.

mod account;
pub mod authenticator;
pub mod password;
mod token;

pub use self::account::{Account, Credentials};
pub use self::authenticator::ModularRealmAuthenticator;
pub use self::password::{Argon2CredentialsMatcher, CredentialsMatcher};
pub use self::token::{AuthenticationToken, UsernamePasswordToken};
