//! Signup / login / logout / me. Thin pass-through to the identity provider.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthContext, AuthOutcome, Credentials};

#[derive(Debug, Default, Deserialize)]
struct CredentialsPayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn credentials(body: &[u8]) -> AppResult<Credentials> {
    let missing = || AppError::validation("missing_credentials", "Email and password are required");
    let payload: CredentialsPayload = serde_json::from_slice(body).map_err(|_| missing())?;
    match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Ok(Credentials { email: email.trim().to_string(), password })
        }
        _ => Err(missing()),
    }
}

fn outcome_body(message: &str, outcome: AuthOutcome) -> Value {
    json!({
        "message": message,
        "user": outcome.user,
        "session": outcome.session,
    })
}

pub async fn signup(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let creds = credentials(&body)?;
    let auth = state.auth_provider()?;
    match auth.sign_up(&creds).await {
        Ok(outcome) => {
            info!(target: "auth", email = %creds.email, confirmed = outcome.session.is_some(), "signup");
            let message = if outcome.session.is_some() {
                "User created successfully"
            } else {
                "User created successfully. Check your email to confirm your account."
            };
            Ok(Json(outcome_body(message, outcome)))
        }
        Err(e) => {
            warn!(target: "auth", email = %creds.email, "signup failed: {:#}", e);
            Err(AppError::validation("signup_failed".to_string(), e.to_string()))
        }
    }
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let creds = credentials(&body)?;
    let auth = state.auth_provider()?;
    match auth.sign_in(&creds).await {
        Ok(outcome) => {
            info!(target: "auth", email = %creds.email, "login");
            Ok(Json(outcome_body("Login successful", outcome)))
        }
        Err(e) => {
            warn!(target: "auth", email = %creds.email, "login failed: {:#}", e);
            Err(AppError::unauthorized("invalid_credentials".to_string(), e.to_string()))
        }
    }
}

pub async fn logout(State(state): State<AppState>, Extension(ctx): Extension<AuthContext>) -> AppResult<Json<Value>> {
    let auth = state.auth_provider()?;
    auth.sign_out(&ctx.access_token)
        .await
        .map_err(|e| AppError::validation("logout_failed".to_string(), e.to_string()))?;
    info!(target: "auth", user = ctx.user_id(), "logout");
    Ok(Json(json!({"message": "Logged out successfully"})))
}

pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<Value> {
    Json(json!({"user": ctx.principal}))
}
