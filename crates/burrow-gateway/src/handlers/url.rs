use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::model::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use burrow_core::{Incoming, RequestContext, ShortCode, Storage, StorageError};
use tracing::{debug, info};

/// Saves `url`, mapping a duplicate to the existing code with 409.
async fn shorten(state: &AppState, identity: Identity, url: &str) -> Result<(StatusCode, String)> {
    let ctx = RequestContext::new(identity.owner);

    match state.storage().save_url(&ctx, url).await {
        Ok(code) => {
            info!(code = %code, "shortened url");
            Ok((StatusCode::CREATED, code.to_url(state.base_url())))
        }
        Err(StorageError::Conflict(code)) => {
            debug!(code = %code, "url already shortened");
            Ok((StatusCode::CONFLICT, code.to_url(state.base_url())))
        }
        Err(err) => Err(err.into()),
    }
}

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: String,
) -> Result<Response> {
    let url = body.trim();
    if url.is_empty() {
        return Err(AppError::EmptyBody);
    }

    Ok(shorten(&state, identity, url).await?.into_response())
}

/// `POST /api/shorten` with `{"url": "..."}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Result<Response> {
    let request: ShortenRequest = serde_json::from_slice(&body)?;
    let url = request.url.trim();
    if url.is_empty() {
        return Err(AppError::EmptyBody);
    }

    let (status, result) = shorten(&state, identity, url).await?;
    Ok((status, Json(ShortenResponse { result })).into_response())
}

/// `POST /api/shorten/batch`.
///
/// Any duplicate in the batch turns the whole answer into an empty 409; the
/// other items are still stored.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Result<Response> {
    let items: Vec<BatchRequestItem> = serde_json::from_slice(&body)?;
    if items.is_empty() {
        return Err(AppError::EmptyBody);
    }

    let incoming: Vec<Incoming> = items.into_iter().map(Incoming::from).collect();
    let ctx = RequestContext::new(identity.owner);
    let outcome = state
        .storage()
        .load_urls(&ctx, incoming, state.base_url())
        .await?;

    if outcome.has_conflicts() {
        debug!(conflicts = ?outcome.conflicts, "batch contained stored urls");
        return Ok(StatusCode::CONFLICT.into_response());
    }

    info!(count = outcome.outputs.len(), "shortened batch");
    let body: Vec<BatchResponseItem> = outcome
        .outputs
        .into_iter()
        .map(BatchResponseItem::from)
        .collect();
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `GET /{code}`: 307 to the original URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(code): Path<String>,
) -> Result<Redirect> {
    let code = ShortCode::new(code)?;
    let ctx = RequestContext::new(identity.owner);

    let original_url = state.storage().get_by_id(&ctx, &code).await?;
    Ok(Redirect::temporary(&original_url))
}
