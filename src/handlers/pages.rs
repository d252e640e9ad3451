//! Static and form pages behind the session gate

use std::collections::HashMap;

use axum::{response::Html, Form};

use crate::middleware::auth::UserContext;
use crate::views::{self, Flash};

pub async fn home(user: UserContext) -> Html<String> {
    Html(views::home_page(&user.username))
}

pub async fn about() -> Html<String> {
    Html(views::about_page())
}

pub async fn services() -> Html<String> {
    Html(views::services_page())
}

pub async fn dashboard(user: UserContext) -> Html<String> {
    Html(views::dashboard_page(&user.username, &HashMap::new(), None))
}

pub async fn contact_page() -> Html<String> {
    Html(views::contact_page(None))
}

/// Messages are acknowledged, not stored
pub async fn contact_submit(
    user: UserContext,
    Form(_message): Form<HashMap<String, String>>,
) -> Html<String> {
    tracing::info!("Contact message received from {}", user.username);
    Html(views::contact_page(Some(Flash::Success(
        "Message sent! We will get back to you shortly.",
    ))))
}
