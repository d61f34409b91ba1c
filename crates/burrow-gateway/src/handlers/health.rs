use crate::error::Result;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use burrow_core::{RequestContext, Storage};

pub async fn ping_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.storage().ping(&RequestContext::system()).await?;
    Ok(StatusCode::OK)
}
