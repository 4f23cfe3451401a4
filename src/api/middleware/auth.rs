use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::{Claims, validate_jwt};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

pub const SESSION_COOKIE: &str = "session";

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Reads the session token from the cookie, then the bearer header, then
/// the `token` query parameter.
pub fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());
    if from_cookie.is_some() {
        return from_cookie;
    }

    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());
    if from_header.is_some() {
        return from_header;
    }

    serde_urlencoded::from_str::<AuthQuery>(query.unwrap_or_default())
        .ok()
        .and_then(|q| q.token)
}

/// Claims for a valid token whose session is still open.
async fn authenticate(state: &AppState, token: Option<String>) -> Option<Claims> {
    let token = token?;
    let claims = validate_jwt(&token, &state.config.jwt_secret).ok()?;
    if state.sessions.is_open(&claims.sid).await {
        Some(claims)
    } else {
        tracing::debug!("Token presented for closed session {}", claims.sid);
        None
    }
}

/// Gate for JSON endpoints: unauthenticated requests get a 401 body.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers(), req.uri().query());
    match authenticate(&state, token).await {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        None => Err(AppError::Unauthorized(
            "Authentication required".to_string(),
        )),
    }
}

/// Gate for browser pages: unauthenticated requests go to the login form.
pub async fn page_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_token(req.headers(), req.uri().query());
    match authenticate(&state, token).await {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => Redirect::to("/login").into_response(),
    }
}
