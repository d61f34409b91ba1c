use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::model::UserUrlResponse;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use burrow_core::{RequestContext, ShortCode, Storage};
use tracing::{debug, warn};

/// `GET /api/user/urls`: the caller's live links.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    if !identity.presented {
        return Err(AppError::Unauthorized);
    }

    let ctx = RequestContext::new(identity.owner);
    let Some(urls) = state
        .storage()
        .get_user_urls(&ctx, state.base_url())
        .await?
    else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let body: Vec<UserUrlResponse> = urls.into_iter().map(UserUrlResponse::from).collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of short codes.
///
/// Answers 202 right away; the soft-delete finishes in the background and
/// is cancelled on shutdown.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Result<StatusCode> {
    let raw: Vec<String> = serde_json::from_slice(&body)?;
    // Malformed codes cannot name a stored record.
    let codes: Vec<ShortCode> = raw
        .into_iter()
        .filter_map(|code| ShortCode::new(code).ok())
        .collect();

    let ctx = RequestContext::new(identity.owner).with_cancellation(state.shutdown().child_token());
    let storage = state.storage().clone();

    tokio::spawn(async move {
        let requested = codes.len();
        match storage.delete_user_urls(&ctx, codes).await {
            Ok(()) => debug!(owner = %ctx.owner(), requested, "soft-delete finished"),
            Err(err) => warn!(owner = %ctx.owner(), error = %err, "soft-delete failed"),
        }
    });

    Ok(StatusCode::ACCEPTED)
}
