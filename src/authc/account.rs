use secrecy::SecretString;
use std::sync::Arc;

use crate::authz::AuthorizationInfo;

/// Stored credentials: a PHC-formatted password hash.
#[derive(Debug, Clone)]
pub struct Credentials {
    password_hash: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(password_hash: impl Into<String>) -> Self {
        Self {
            password_hash: SecretString::from(password_hash.into()),
        }
    }

    #[must_use]
    pub fn password_hash(&self) -> &SecretString {
        &self.password_hash
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    account_id: String,
    credentials: Option<Credentials>,
    authz_info: Option<Arc<AuthorizationInfo>>,
}

impl Account {
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            credentials: None,
            authz_info: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_authz_info(mut self, authz_info: AuthorizationInfo) -> Self {
        self.authz_info = Some(Arc::new(authz_info));
        self
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn authz_info(&self) -> Option<&Arc<AuthorizationInfo>> {
        self.authz_info.as_ref()
    }
}
