//! Study set routes. Identity comes from the `AuthContext` the guard attached.
//! `Path` percent-decodes the identifier; nothing downstream decodes it again.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::{json, Value};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::AuthContext;
use crate::studysets::{self, SavePayload, SavedSet, StudySetView};

pub async fn save(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> AppResult<Json<SavedSet>> {
    let payload: SavePayload = serde_json::from_slice(&body)
        .map_err(|_| AppError::validation("invalid_json", "Invalid JSON data or missing title"))?;
    let store = state.study_store()?;
    let saved = studysets::save(store.as_ref(), ctx.scope(), &payload).await?;
    Ok(Json(saved))
}

pub async fn open(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(identifier): Path<String>,
) -> AppResult<Json<StudySetView>> {
    let store = state.study_store()?;
    Ok(Json(studysets::open(store.as_ref(), ctx.scope(), &identifier).await?))
}

pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<AuthContext>) -> AppResult<Json<Value>> {
    let store = state.study_store()?;
    let files = studysets::list(store.as_ref(), ctx.scope()).await?;
    Ok(Json(json!({"files": files})))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(identifier): Path<String>,
) -> AppResult<Json<Value>> {
    let store = state.study_store()?;
    let title = studysets::delete(store.as_ref(), ctx.scope(), &identifier).await?;
    Ok(Json(json!({"message": format!("Study set '{}' deleted successfully", title)})))
}
