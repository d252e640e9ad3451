//! Authentication handlers

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use serde::Deserialize;

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::{clear_session_cookie, issue_session, session_cookie, UserContext};
use crate::models::{is_unique_violation, Credentials, User};
use crate::views::{self, Flash};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub registered: Option<String>,
}

/// Render an error as the given form page with the matching status
fn form_error(err: AppError, page: fn(Option<Flash<'_>>) -> String) -> Response {
    let message = err.user_message();
    (err.status(), Html(page(Some(Flash::Error(&message))))).into_response()
}

/// GET /login
pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    let flash = query
        .registered
        .is_some()
        .then_some(Flash::Success("Account created! Please log in."));
    Html(views::login_page(flash))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Form(req): Form<Credentials>,
) -> Response {
    match authenticate(&state, &req).await {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response(),
        Err(err) => form_error(err, views::login_page),
    }
}

async fn authenticate(state: &AppState, req: &Credentials) -> AppResult<String> {
    let user = User::find_by_username(&state.pool, &req.username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::InternalError("Invalid password hash".to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            tracing::info!("Failed login for {}", user.username);
            AppError::InvalidCredentials
        })?;

    User::update_last_login(&state.pool, user.id).await?;

    let token = issue_session(user.id, &user.username, &state.config)?;
    tracing::info!("User logged in: {}", user.username);

    Ok(session_cookie(&token, &state.config))
}

/// GET /register
pub async fn register_page() -> Html<String> {
    Html(views::register_page(None))
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Form(req): Form<Credentials>,
) -> Response {
    match create_account(&state, req).await {
        Ok(()) => Redirect::to("/login?registered=1").into_response(),
        Err(err) => form_error(err, views::register_page),
    }
}

async fn create_account(state: &AppState, req: Credentials) -> AppResult<()> {
    req.check().map_err(AppError::ValidationError)?;

    // Check if username already exists
    if User::find_by_username(&state.pool, &req.username).await?.is_some() {
        return Err(AppError::AlreadyExists("Username already exists.".to_string()));
    }

    // Hash password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .to_string();

    let user = User::create(&state.pool, &req.username, password_hash)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists("Username already exists.".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    tracing::info!("New user registered: {} ({})", user.username, user.id);
    Ok(())
}

/// GET /logout
pub async fn logout(user: UserContext) -> impl IntoResponse {
    tracing::info!("User logged out: {}", user.username);
    ([(SET_COOKIE, clear_session_cookie())], Redirect::to("/login"))
}
