//! Password hashing and credential matching (Argon2id, PHC strings).

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use secrecy::ExposeSecret;
use tracing::warn;

use super::{Account, AuthenticationToken};

/// Decides whether submitted credentials match an account's stored ones.
pub trait CredentialsMatcher: Send + Sync {
    fn credentials_match(&self, token: &dyn AuthenticationToken, account: &Account) -> bool;
}

/// Verifies token passwords against stored Argon2 PHC hashes.
///
/// Verification reads the algorithm parameters from the stored hash, so the
/// matcher's own params only matter for [`Argon2CredentialsMatcher::hash_password`].
#[derive(Clone)]
pub struct Argon2CredentialsMatcher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for Argon2CredentialsMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2CredentialsMatcher").finish_non_exhaustive()
    }
}

impl Default for Argon2CredentialsMatcher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Argon2CredentialsMatcher {
    /// Matcher hashing with Argon2id and the given params.
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Matcher with explicit Argon2id costs: memory in KiB, iterations and lanes.
    ///
    /// # Errors
    /// Returns an error if the costs are out of Argon2's accepted range.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self::new(params))
    }

    /// Hash `password` into a PHC string with a random salt.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?
            .to_string())
    }

    /// Verify `password` against a PHC string.
    ///
    /// # Errors
    /// Returns an error if `hash` is not a valid PHC string.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("invalid password hash: {e}"))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl CredentialsMatcher for Argon2CredentialsMatcher {
    fn credentials_match(&self, token: &dyn AuthenticationToken, account: &Account) -> bool {
        let Some(stored) = account.credentials() else {
            return false;
        };

        match self.verify_password(
            token.credentials().expose_secret(),
            stored.password_hash().expose_secret(),
        ) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("credentials for [{}] are unusable: {e}", account.account_id());
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_matcher() -> Argon2CredentialsMatcher {
    Argon2CredentialsMatcher::with_cost(8, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authc::{Credentials, UsernamePasswordToken};

    #[test]
    fn hash_and_verify_round_trip() -> Result<()> {
        let matcher = test_matcher();
        let hash = matcher.hash_password("letsgobowling")?;

        assert!(hash.starts_with("$argon2id$"));
        assert!(matcher.verify_password("letsgobowling", &hash)?);
        assert!(!matcher.verify_password("nihilist", &hash)?);
        assert!(matcher.verify_password("x", "not-a-phc-string").is_err());
        Ok(())
    }

    #[test]
    fn matches_token_against_account() -> Result<()> {
        let matcher = test_matcher();
        let account = Account::new("thedude")
            .with_credentials(Credentials::new(matcher.hash_password("letsgobowling")?));

        assert!(matcher.credentials_match(
            &UsernamePasswordToken::new("thedude", "letsgobowling"),
            &account
        ));
        assert!(!matcher.credentials_match(
            &UsernamePasswordToken::new("thedude", "rug"),
            &account
        ));
        assert!(!matcher.credentials_match(
            &UsernamePasswordToken::new("thedude", "letsgobowling"),
            &Account::new("thedude")
        ));
        assert!(!matcher.credentials_match(
            &UsernamePasswordToken::new("thedude", "letsgobowling"),
            &Account::new("thedude").with_credentials(Credentials::new("garbage"))
        ));
        Ok(())
    }
}
