//! Account CRUD routes (mounted under `server.api_prefix`).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use meterline_core::AppError;

use super::ApiError;
use crate::account::{Account, AccountInput};
use crate::app_state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/account", get(list).post(create))
        .route("/account/:id", get(show).put(update).delete(remove))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidArgument("Invalid UUID format".into()))
}

fn body(payload: Result<Json<AccountInput>, JsonRejection>) -> Result<AccountInput, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rej| AppError::InvalidRequest(rej.body_text()))
}

async fn create(
    State(app): State<AppState>,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let input = body(payload)?;
    let account = app.accounts().create(input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list(State(app): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(app.accounts().list().await?))
}

async fn show(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(app.accounts().find(id).await?))
}

async fn update(
    State(app): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_id(&id)?;
    let input = body(payload)?;
    Ok(Json(app.accounts().update(id, input).await?))
}

async fn remove(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    app.accounts().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
