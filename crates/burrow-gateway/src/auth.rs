//! Cookie/JWT identity.
//!
//! Callers without a token are given a fresh owner id and a signed token in
//! both a `token` cookie and the `Authorization` response header. Callers
//! presenting a token must present a valid one.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use burrow_core::OwnerId;
use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_TTL: SignedDuration = SignedDuration::from_hours(3);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub exp: i64,
}

/// HS256 signing and verification keys derived from one secret.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl AuthKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
        }
    }

    pub fn issue(&self, owner: &OwnerId) -> Result<String, AppError> {
        let claims = Claims {
            user_id: owner.as_str().to_owned(),
            exp: (Timestamp::now() + TOKEN_TTL).as_second(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AppError::TokenIssue)
    }

    pub fn verify(&self, token: &str) -> Result<OwnerId, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|err| {
                debug!(error = %err, "token rejected");
                AppError::Unauthorized
            })?;

        if data.claims.user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }
        Ok(OwnerId::new(data.claims.user_id))
    }
}

/// The caller identity attached to every request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub owner: OwnerId,
    /// Whether the request carried its own token rather than being issued one.
    pub presented: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = bearer_token(request.headers())
        .map(str::to_owned)
        .or_else(|| jar.get(TOKEN_COOKIE).map(|cookie| cookie.value().to_owned()));

    if let Some(token) = presented {
        let owner = state.auth().verify(&token)?;
        request.extensions_mut().insert(Identity {
            owner,
            presented: true,
        });
        return Ok(next.run(request).await);
    }

    let owner = OwnerId::generate();
    let token = state.auth().issue(&owner)?;
    debug!(owner = %owner, "issued token to new caller");

    request.extensions_mut().insert(Identity {
        owner,
        presented: false,
    });
    let response = next.run(request).await;

    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .path("/")
        .http_only(true);
    Ok((jar.add(cookie), [(AUTHORIZATION, token)], response).into_response())
}
