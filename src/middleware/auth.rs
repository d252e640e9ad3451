//! Session middleware
//!
//! The session is a signed JWT carried in an HttpOnly cookie. Gated routes
//! without a valid session are redirected to the login page before any
//! handler runs.

use axum::{
    extract::{State, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    http::{header::COOKIE, HeaderMap},
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, AppError, AppResult};
use crate::config::Config;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // User ID
    pub name: String,     // Username
    pub exp: usize,       // Expiration timestamp
    pub iat: usize,       // Issued at
}

/// Logged-in user, available to gated handlers
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub username: String,
}

/// Sign a session token for a user
pub fn issue_session(user_id: Uuid, username: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.session_expiration_hours as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        name: username.to_string(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes())
    ).map_err(|e| AppError::InternalError(e.to_string()))
}

/// Verify a session token
pub fn verify_session(token: &str, secret: &str) -> AppResult<UserContext> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default()
    )?;

    let claims = token_data.claims;
    Ok(UserContext {
        user_id: Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?,
        username: claims.name,
    })
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        config.session_expiration_hours * 3600,
        if config.is_production() { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value expiring the session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Session token from the `Cookie` header, if any
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Middleware: require a valid session, otherwise redirect to /login
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_ctx = session_token(req.headers())
        .and_then(|token| verify_session(token, &state.config.jwt_secret).ok());

    match user_ctx {
        Some(user_ctx) => {
            req.extensions_mut().insert(user_ctx);
            next.run(req).await
        }
        None => {
            tracing::debug!("No valid session for {}, redirecting to login", req.uri().path());
            Redirect::to("/login").into_response()
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<UserContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
