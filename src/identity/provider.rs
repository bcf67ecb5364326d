use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::principal::Principal;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a signup or login. Signup may return a user without a session when the
/// provider requires email confirmation first.
#[derive(Debug, Clone, Default)]
pub struct AuthOutcome {
    pub user: Option<Principal>,
    pub session: Option<SessionTokens>,
}

/// Identity provider seam. The auth guard only needs `resolve_user`; the auth routes use the rest.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, creds: &Credentials) -> Result<AuthOutcome>;
    async fn sign_in(&self, creds: &Credentials) -> Result<AuthOutcome>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;
    /// Exchange a bearer token for the user it was issued to. Fails on invalid or expired tokens.
    async fn resolve_user(&self, access_token: &str) -> Result<Principal>;
}
