//! Supabase GoTrue client implementing `AuthProvider` over plain HTTP.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::principal::Principal;
use super::provider::{AuthOutcome, AuthProvider, Credentials, SessionTokens};

#[derive(Clone)]
pub struct SupabaseAuth {
    client: reqwest::Client,
    base: String,
    api_key: String,
}

impl SupabaseAuth {
    pub fn new(client: reqwest::Client, supabase_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let body: Value = if status == StatusCode::NO_CONTENT {
            Value::Null
        } else {
            resp.json().await.unwrap_or(Value::Null)
        };
        if !status.is_success() {
            return Err(anyhow!(provider_message(status, &body)));
        }
        Ok(body)
    }
}

/// Pull the human-readable message out of a GoTrue error body.
/// GoTrue has used `msg`, `error_description`, `message` and `error` across versions.
fn provider_message(status: StatusCode, body: &Value) -> String {
    for key in ["msg", "error_description", "message", "error"] {
        if let Some(s) = body.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    format!("identity provider returned HTTP {}", status.as_u16())
}

fn principal_from(user: &Value) -> Option<Principal> {
    let id = user.get("id").and_then(|v| v.as_str())?;
    let email = user.get("email").and_then(|v| v.as_str()).map(|s| s.to_string());
    Some(Principal::new(id, email))
}

/// Token responses carry `{access_token, refresh_token, user}`; signup without auto-confirm
/// returns the bare user object instead.
fn outcome_from(body: &Value) -> AuthOutcome {
    let session = match (
        body.get("access_token").and_then(|v| v.as_str()),
        body.get("refresh_token").and_then(|v| v.as_str()),
    ) {
        (Some(a), Some(r)) => Some(SessionTokens { access_token: a.to_string(), refresh_token: r.to_string() }),
        _ => None,
    };
    let user = match body.get("user") {
        Some(u) if u.is_object() => principal_from(u),
        _ => principal_from(body),
    };
    AuthOutcome { user, session }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_up(&self, creds: &Credentials) -> Result<AuthOutcome> {
        let resp = self.client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({"email": creds.email, "password": creds.password}))
            .send()
            .await
            .context("signup request failed")?;
        let body = Self::read_json(resp).await?;
        Ok(outcome_from(&body))
    }

    async fn sign_in(&self, creds: &Credentials) -> Result<AuthOutcome> {
        let resp = self.client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({"email": creds.email, "password": creds.password}))
            .send()
            .await
            .context("login request failed")?;
        let body = Self::read_json(resp).await?;
        let outcome = outcome_from(&body);
        if outcome.session.is_none() {
            return Err(anyhow!("identity provider returned no session"));
        }
        Ok(outcome)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let resp = self.client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("logout request failed")?;
        Self::read_json(resp).await?;
        Ok(())
    }

    async fn resolve_user(&self, access_token: &str) -> Result<Principal> {
        let resp = self.client
            .get(self.url("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("user lookup failed")?;
        let body = Self::read_json(resp).await?;
        let principal = principal_from(&body).ok_or_else(|| anyhow!("identity provider returned no user"))?;
        debug!(target: "auth", user = %principal.user_id, "token resolved");
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_response_yields_user_and_session() {
        let body = json!({
            "access_token": "at", "refresh_token": "rt", "token_type": "bearer",
            "user": {"id": "6f1c", "email": "a@b.c", "aud": "authenticated"}
        });
        let o = outcome_from(&body);
        assert_eq!(o.user, Some(Principal::new("6f1c", Some("a@b.c".into()))));
        assert_eq!(o.session.unwrap().refresh_token, "rt");
    }

    #[test]
    fn unconfirmed_signup_has_user_but_no_session() {
        let body = json!({"id": "6f1c", "email": "a@b.c", "confirmation_sent_at": "2026-01-01T00:00:00Z"});
        let o = outcome_from(&body);
        assert_eq!(o.user.map(|u| u.user_id), Some("6f1c".to_string()));
        assert!(o.session.is_none());
    }

    #[test]
    fn error_message_prefers_provider_text() {
        let body = json!({"error": "invalid_grant", "error_description": "Invalid login credentials"});
        assert_eq!(provider_message(StatusCode::BAD_REQUEST, &body), "Invalid login credentials");
        assert_eq!(provider_message(StatusCode::BAD_GATEWAY, &Value::Null), "identity provider returned HTTP 502");
    }
}
