//! HTTP surface for the verification worker

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::info;
use uuid::Uuid;

use crate::collab::{Notifier, TestGenerator};
use crate::error::ApiError;
use crate::languages;
use crate::model::{ExecutionRequest, TestCase, TestCaseResult, VerificationResult};
use crate::registry::ResultRegistry;
use crate::runner::TestRunner;
use crate::sandbox::Limits;
use crate::verifier::VerificationLoop;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<VerificationLoop>,
    pub generator: Arc<dyn TestGenerator>,
    pub runner: Arc<TestRunner>,
    pub registry: Arc<ResultRegistry>,
    pub notifier: Arc<Notifier>,
    /// Worker-pool ceiling: concurrent verifications are bounded, not fanned out
    pub permits: Arc<Semaphore>,
    pub default_limits: Limits,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/verify", post(post_verify))
        .route("/verify/{id}", get(get_verify))
        .route("/verify/{id}/report", get(get_report))
        .route("/generate-tests", post(post_generate_tests))
        .route("/run-tests", post(post_run_tests))
        .with_state(state)
}

async fn post_verify(
    State(state): State<AppState>,
    Json(request): Json<ExecutionRequest>,
) -> Result<Json<VerificationResult>, ApiError> {
    let _permit = state
        .permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("verification pool closed".into()))?;

    let result = state.verifier.verify(&request).await?;
    state.registry.insert(result.clone()).await;
    state.notifier.notify(&result);

    Ok(Json(result))
}

async fn get_verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationResult>, ApiError> {
    match state.registry.get(&id).await {
        Some(result) => Ok(Json(result)),
        None => Err(ApiError::NotFound(id)),
    }
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<String, ApiError> {
    match state.registry.get(&id).await {
        Some(result) => Ok(result.report()),
        None => Err(ApiError::NotFound(id)),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateTestsRequest {
    code: String,
    language: String,
}

async fn post_generate_tests(
    State(state): State<AppState>,
    Json(request): Json<GenerateTestsRequest>,
) -> Json<Vec<TestCase>> {
    // Collaborator unavailability degrades to an empty sequence; this
    // route never fails.
    let cases = state
        .generator
        .generate(&request.code, &request.language)
        .await;
    info!(
        "Generated {} test cases for a {} submission",
        cases.len(),
        request.language
    );
    Json(cases)
}

#[derive(Debug, Deserialize)]
struct RunTestsRequest {
    code: String,
    language: String,
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

async fn post_run_tests(
    State(state): State<AppState>,
    Json(request): Json<RunTestsRequest>,
) -> Result<Json<Vec<TestCaseResult>>, ApiError> {
    if request.code.trim().is_empty() {
        return Err(crate::error::ValidationError::new("code must not be empty").into());
    }
    if languages::get_language_config(&request.language).is_none() {
        return Err(crate::error::ValidationError::new(format!(
            "unsupported language: {} (supported: {})",
            request.language,
            languages::get_supported_languages().join(", ")
        ))
        .into());
    }

    let _permit = state
        .permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("verification pool closed".into()))?;

    let results = state
        .runner
        .run(
            &request.code,
            &request.test_cases,
            &request.language,
            &Default::default(),
            None,
            state.default_limits,
        )
        .await;

    Ok(Json(results))
}
