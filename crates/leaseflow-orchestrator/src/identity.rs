//! Caller identity consumed from the login subsystem.

/// Principal the authority assigns to unauthenticated callers.
pub const ANONYMOUS_PRINCIPAL: &str = "2vxsx-fae";

/// Who is calling the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    principal: String,
    access_token: Option<String>,
}

impl CallerIdentity {
    pub fn authenticated(principal: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            access_token: Some(access_token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            principal: ANONYMOUS_PRINCIPAL.to_string(),
            access_token: None,
        }
    }

    /// Build from configured credentials; anonymous when either is missing.
    pub fn from_credentials(principal: Option<&str>, access_token: Option<&str>) -> Self {
        match (principal, access_token) {
            (Some(p), Some(t)) if !p.is_empty() && !t.is_empty() => Self::authenticated(p, t),
            _ => Self::anonymous(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.principal != ANONYMOUS_PRINCIPAL
    }
}
