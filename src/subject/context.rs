use crate::identity::IdentifierCollection;

/// What a boundary adapter knows about the caller of one request.
#[derive(Clone, Debug, Default)]
pub struct SubjectContext {
    /// Session to resume, as carried by the transport.
    pub session_id: Option<String>,
    /// Identifiers recalled without authentication ("remember me").
    pub remembered_identifiers: Option<IdentifierCollection>,
    pub host: Option<String>,
}

impl SubjectContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_remembered_identifiers(mut self, identifiers: IdentifierCollection) -> Self {
        self.remembered_identifiers = Some(identifiers);
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}
