use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::auth;
use crate::database::AppState;
use crate::error::AppError;

/// Bearer token of the current admin session, kept so logout can revoke it.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Middleware guarding the administrative routes
///
/// Expects an `Authorization: Bearer <token>` header carrying a token issued
/// by `POST /admin/login`. On success the resolved [`auth::AdminSession`] and
/// the raw [`SessionToken`] are placed in the request extensions for the
/// handlers; otherwise the request is answered with 401.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or_else(|| {
        AppError::Unauthorized("Invalid or missing authorization header".into())
    })?;

    let session = auth::authenticate(&state.db, &token)?;

    request.extensions_mut().insert(session);
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// Address of the client that sent the request, if it can be determined.
///
/// The first `X-Forwarded-For` entry wins; otherwise the peer address from
/// the listener is used. Requests built in tests have neither.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientIp(ip))
    }
}
