//! Prediction handlers
//!
//! Both entry points hand the submitted fields to the shared `RiskService`
//! on the blocking pool. The form flow renders HTML, the API returns JSON.

use std::collections::HashMap;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    Form, Json,
};

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::UserContext;
use crate::ml::{RawFields, RawValue};
use crate::risk::ScoringResult;
use crate::views::{self, Flash};

/// POST /predict
pub async fn predict_form(
    State(state): State<AppState>,
    user: UserContext,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let raw: RawFields = form
        .iter()
        .map(|(k, v)| (k.clone(), RawValue::from(v.as_str())))
        .collect();

    match state.risk.clone().score_blocking(raw).await {
        Ok(result) => {
            tracing::info!(
                user = %user.username,
                tier = result.label,
                probability = result.probability,
                "Prediction served"
            );
            Html(views::result_page(&result)).into_response()
        }
        Err(err) => {
            let err = AppError::from(err);
            let message = err.user_message();
            tracing::info!(user = %user.username, "Prediction rejected: {}", message);
            (
                err.status(),
                Html(views::dashboard_page(&user.username, &form, Some(Flash::Error(&message)))),
            )
                .into_response()
        }
    }
}

/// POST /api/v1/predict
///
/// Returns the serialized `ScoringResult`. When present, `chart` is an
/// SVG waterfall (`mime_type` is `image/svg+xml`), not a PNG, base64-encoded
/// in `base64` and ready for a `data:` URI.
pub async fn predict_api(
    State(state): State<AppState>,
    user: UserContext,
    Json(raw): Json<RawFields>,
) -> AppResult<Json<ScoringResult>> {
    let result = state.risk.clone().score_blocking(raw).await?;

    tracing::info!(
        user = %user.username,
        tier = result.label,
        probability = result.probability,
        "API prediction served"
    );

    Ok(Json(result))
}
