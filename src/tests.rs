//! Router tests: session gate, account flow and prediction over HTTP

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::config::Config;
use crate::risk::RiskService;
use crate::test_support::trained_service;
use crate::{create_router, db, AppState};

const SCENARIO_B: &str =
    "pregnancies=8&glucose=183&bp=64&skin=0&insulin=0&bmi=23.3&dpf=0.672&age=32";

async fn app_with(risk: Arc<RiskService>) -> (Router, sqlx::SqlitePool) {
    let config = Config::for_tests();
    let pool = db::create_pool(&config.database_url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let state = AppState { pool: pool.clone(), config, risk };
    (create_router(state), pool)
}

async fn app() -> Router {
    app_with(trained_service()).await.0
}

fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Register and log in, returning the `Cookie` header value
async fn sign_in(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(form("/register", "username=alice&password=secret1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .clone()
        .oneshot(form("/login", "username=alice&password=secret1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = app().await.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["explainer_available"], true);
}

#[tokio::test]
async fn test_gated_routes_redirect_to_login() {
    let app = app().await;
    for uri in ["/", "/about", "/services", "/dashboard", "/contact", "/logout"] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/login");
    }

    let response = app.clone().oneshot(form("/predict", SCENARIO_B, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .oneshot(form("/predict", SCENARIO_B, Some("session=forged.token.value")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_register_flow() {
    let (app, pool) = app_with(trained_service()).await;

    let response = app
        .clone()
        .oneshot(form("/register", "username=alice&password=secret1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?registered=1");

    let stored = crate::models::User::find_by_username(&pool, "alice").await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2"));
    assert_ne!(stored.password_hash, "secret1");

    let response = app
        .clone()
        .oneshot(form("/register", "username=alice&password=another1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(text(response).await.contains("Username already exists."));

    let response = app
        .clone()
        .oneshot(form("/register", "username=bob&password=123", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/login?registered=1", None)).await.unwrap();
    assert!(text(response).await.contains("Account created! Please log in."));
}

#[tokio::test]
async fn test_invalid_login_sets_no_cookie() {
    let app = app().await;
    sign_in(&app).await;

    for body in ["username=alice&password=wrongpass", "username=nobody&password=secret1"] {
        let response = app.clone().oneshot(form("/login", body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(text(response).await.contains("Invalid username or password."));
    }
}

#[tokio::test]
async fn test_pages_with_session() {
    let app = app().await;
    let cookie = sign_in(&app).await;

    let response = app.clone().oneshot(get("/dashboard", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Hello, alice."));

    let response = app
        .clone()
        .oneshot(form("/contact", "name=A&email=a%40b.c&message=hi", Some(&cookie)))
        .await
        .unwrap();
    assert!(text(response).await.contains("Message sent! We will get back to you shortly."));

    let response = app.oneshot(get("/logout", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers()[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_form_prediction_renders_result() {
    let app = app().await;
    let cookie = sign_in(&app).await;

    let response = app.oneshot(form("/predict", SCENARIO_B, Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("HIGH RISK"));
    assert!(html.contains(r#"class="risk danger""#));
    assert!(html.contains("data:image/svg+xml;base64,"));
    assert!(html.contains("Glucose"));
}

#[tokio::test]
async fn test_form_prediction_invalid_field() {
    let app = app().await;
    let cookie = sign_in(&app).await;

    let body = SCENARIO_B.replace("glucose=183", "glucose=abc");
    let response = app.oneshot(form("/predict", &body, Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let html = text(response).await;
    assert!(html.contains("field &#x27;glucose&#x27; is not a number"));
    // form is refilled
    assert!(html.contains(r#"value="abc""#));
}

#[tokio::test]
async fn test_degraded_server_reports_model_unavailable() {
    let (app, _pool) = app_with(Arc::new(RiskService::unavailable())).await;

    let response = app.clone().oneshot(get("/health", None)).await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["model_loaded"], false);

    let cookie = sign_in(&app).await;
    let response = app.oneshot(form("/predict", SCENARIO_B, Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(text(response).await.contains("Model not loaded."));
}

#[tokio::test]
async fn test_api_prediction() {
    let app = app().await;
    let cookie = sign_in(&app).await;

    let request = Request::post("/api/v1/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from(
            r#"{"pregnancies": 8, "glucose": "183", "bp": 64, "skin": 0, "insulin": 0,
                "bmi": 23.3, "dpf": 0.672, "age": 32}"#,
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["tier"], "HIGH");
    assert_eq!(body["color"], "danger");
    assert_eq!(body["clinical_alert"], true);
    assert_eq!(body["chart"]["mime_type"], "image/svg+xml");

    let request = Request::post("/api/v1/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from(r#"{"glucose": 120}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "Invalid input: field 'pregnancies' is missing");
}

#[tokio::test]
async fn test_api_prediction_non_numeric_json_names_field() {
    let app = app().await;
    let cookie = sign_in(&app).await;

    for glucose in ["null", "true", "[183]"] {
        let body = format!(
            r#"{{"pregnancies": 8, "glucose": {}, "bp": 64, "skin": 0, "insulin": 0,
                "bmi": 23.3, "dpf": 0.672, "age": 32}}"#,
            glucose
        );
        let request = Request::post("/api/v1/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, &cookie)
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "glucose = {}", glucose);

        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body["status"], 400);
        assert_eq!(body["error"], "Invalid input: field 'glucose' is not a number");
    }
}
