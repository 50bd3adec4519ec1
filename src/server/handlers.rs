//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::analysis::DatasetAnalysis;
use crate::auth::{FlashCategory, Session};
use crate::error::BmiError;
use crate::prediction::{Prediction, PredictionRequest};

use super::error::{Result, ServerError};
use super::state::AppState;
use super::views::{self, PageContext};

/// Render a page with the current user and any pending flashes
fn page<F>(session: &Session, render: F) -> Html<String>
where
    F: FnOnce(&PageContext<'_>) -> String,
{
    let user = session.user();
    let flashes = session.take_flashes();
    let ctx = PageContext {
        user: user.as_deref(),
        flashes: &flashes,
    };
    Html(render(&ctx))
}

// ============================================================================
// Pages
// ============================================================================

pub async fn home(Extension(session): Extension<Session>) -> Html<String> {
    page(&session, views::home)
}

pub async fn about(Extension(session): Extension<Session>) -> Html<String> {
    page(&session, views::about)
}

pub async fn database(Extension(session): Extension<Session>) -> Html<String> {
    page(&session, views::database)
}

pub async fn model_performance(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Html<String> {
    let assignments: Vec<_> = state.context.router().assignments().values().collect();
    page(&session, |ctx| views::performance(ctx, state.context.report(), &assignments))
}

pub async fn data_analysis(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Html<String>> {
    let path = state.config.training.dataset_path.clone();
    let analysis = tokio::task::spawn_blocking(move || DatasetAnalysis::from_path(&path))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(match analysis {
        Ok(analysis) => page(&session, |ctx| views::data_analysis(ctx, &analysis)),
        Err(e) => {
            warn!(error = %e, "Data analysis failed");
            page(&session, |ctx| views::error(ctx, &format!("Error loading dataset: {}", e)))
        }
    })
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn signup_page(Extension(session): Extension<Session>) -> Html<String> {
    page(&session, views::signup)
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<SignupForm>,
) -> Response {
    match state
        .auth
        .signup(&form.email, &form.password, &form.confirm_password)
        .await
    {
        Ok(_) => {
            session.flash(FlashCategory::Success, "Signup successful! Please login.");
            Redirect::to("/login").into_response()
        }
        Err(e) => {
            session.flash(FlashCategory::Danger, e.to_string());
            page(&session, views::signup).into_response()
        }
    }
}

pub async fn login_page(Extension(session): Extension<Session>) -> Html<String> {
    page(&session, views::login)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.login(&form.email, &form.password).await {
        Ok(user) => {
            session.login(&user.email);
            session.flash(FlashCategory::Success, "Logged in!");
            Redirect::to("/").into_response()
        }
        Err(e) => {
            session.flash(FlashCategory::Danger, e.to_string());
            page(&session, views::login).into_response()
        }
    }
}

pub async fn logout(Extension(session): Extension<Session>) -> Redirect {
    session.clear();
    session.flash(FlashCategory::Info, "Logged out");
    Redirect::to("/login")
}

// ============================================================================
// Prediction
// ============================================================================

pub async fn form(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Response {
    if !session.is_logged_in() {
        session.flash(FlashCategory::Warning, "Please login to access the form");
        return Redirect::to("/login").into_response();
    }
    let options = state.context.algorithm_options();
    page(&session, |ctx| views::prediction_form(ctx, &options)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PredictForm {
    gender: Option<String>,
    height: Option<String>,
    weight: Option<String>,
    algorithm: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> crate::error::Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| BmiError::InvalidInput(format!("missing field '{}'", field)))
}

fn run_prediction(state: &AppState, form: &PredictForm) -> crate::error::Result<Prediction> {
    let request = PredictionRequest::parse(
        required(&form.gender, "gender")?,
        required(&form.height, "height")?,
        required(&form.weight, "weight")?,
        form.algorithm.as_deref(),
    )?;
    state.context.predict(&request)
}

/// Failures are reported as plain text with status 200
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<PredictForm>,
) -> Response {
    match run_prediction(&state, &form) {
        Ok(prediction) => {
            info!(
                model = %prediction.model,
                cluster = ?prediction.cluster,
                value = prediction.value,
                "Prediction served"
            );
            page(&session, |ctx| views::result(ctx, &prediction)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Prediction failed");
            format!("Prediction Error: {}", e).into_response()
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "models": state.context.bank().len(),
        "uptime_secs": state.uptime_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let report = state.context.report();
    let models: Vec<serde_json::Value> = report
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "mae": s.metrics.mae,
                "mse": s.metrics.mse,
                "rmse": s.metrics.rmse,
                "r2": s.metrics.r2,
            })
        })
        .collect();
    let clusters: Vec<_> = state.context.router().assignments().values().collect();

    Json(json!({
        "models": models,
        "best_model": report.best().name,
        "clusters": clusters,
        "n_train": state.context.n_train(),
        "n_test": state.context.n_test(),
    }))
}

pub async fn not_found() -> impl IntoResponse {
    let ctx = PageContext { user: None, flashes: &[] };
    (StatusCode::NOT_FOUND, Html(views::error(&ctx, "Page not found")))
}
