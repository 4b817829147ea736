use secrecy::SecretString;
use std::any::Any;
use std::fmt;

/// Principal + credential pair submitted at login.
pub trait AuthenticationToken: fmt::Debug + Send + Sync {
    /// Username or other account identifier.
    fn identifier(&self) -> &str;

    fn credentials(&self) -> &SecretString;

    fn host(&self) -> Option<&str> {
        None
    }

    fn is_remember_me(&self) -> bool {
        false
    }

    /// Lets realms decide whether they support a concrete token type.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone)]
pub struct UsernamePasswordToken {
    username: String,
    password: SecretString,
    remember_me: bool,
    host: Option<String>,
}

impl UsernamePasswordToken {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            remember_me: false,
            host: None,
        }
    }

    #[must_use]
    pub fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl AuthenticationToken for UsernamePasswordToken {
    fn identifier(&self) -> &str {
        &self.username
    }

    fn credentials(&self) -> &SecretString {
        &self.password
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn is_remember_me(&self) -> bool {
        self.remember_me
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
