use super::Principal;

/// Attached to request extensions by the auth guard for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    /// Raw bearer token, forwarded to the store when row-level security applies.
    pub access_token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    pub fn scope(&self) -> crate::storage::Scope<'_> {
        crate::storage::Scope { user_id: &self.principal.user_id, access_token: &self.access_token }
    }
}
