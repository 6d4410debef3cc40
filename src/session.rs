// Authenticated user, passed explicitly into every authenticated action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub first_name: Option<String>,
    access_token: Option<String>,
}

impl Session {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: None,
            access_token: None,
        }
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        !self.email.trim().is_empty()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

// Treats a missing session and an empty one the same way
pub fn authenticated(session: Option<&Session>) -> Option<&Session> {
    session.filter(|s| s.is_authenticated())
}
