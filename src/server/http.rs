//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{InferenceError, ValidationError};
use crate::features::UserFeatureVector;
use crate::risk::RiskLevel;
use crate::serving::Predictor;

use super::AppState;

pub const SERVICE_NAME: &str = "SuperApp ML API";
pub const ENDPOINTS: [&str; 3] = ["/predict/churn", "/predict/segment", "/predict/forecast"];

/// Request failure as seen by the caller
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Inference(InferenceError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        ApiError::Inference(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::MalformedBody(e.body_text()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Inference(e) => {
                tracing::error!(error = %e, "inference failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error during prediction".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Validated body: the ten counters plus an optional caller id echoed back.
struct PredictRequest {
    user_id: Option<String>,
    features: UserFeatureVector,
}

impl PredictRequest {
    fn parse(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<Self, ApiError> {
        let Json(value) = body?;
        let features = UserFeatureVector::from_json(&value)?;
        let user_id = match value.get("user_id") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ValidationError::InvalidUserId.into()),
        };
        Ok(Self { user_id, features })
    }
}

fn run<P: Predictor>(
    predictor: &P,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(Option<String>, P::Output), ApiError> {
    let request = PredictRequest::parse(body).map_err(|e| {
        tracing::debug!(model = predictor.name(), error = ?e, "rejected request");
        e
    })?;
    let output = predictor.predict(&request.features)?;
    Ok((request.user_id, output))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub models_loaded: usize,
    pub endpoints: [&'static str; 3],
}

/// Readiness: the state only exists once every model is loaded.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "healthy",
        models_loaded: state.models.loaded(),
        endpoints: ENDPOINTS,
    })
}

#[derive(Debug, Serialize)]
pub struct ChurnResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub churn_probability: f64,
    pub is_churned: bool,
    pub risk_level: RiskLevel,
}

pub async fn predict_churn(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ChurnResponse>, ApiError> {
    let (user_id, a) = run(&state.models.churn, body)?;
    Ok(Json(ChurnResponse {
        user_id,
        churn_probability: a.churn_probability,
        is_churned: a.is_churned,
        risk_level: a.risk_level,
    }))
}

#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub cluster_id: usize,
    pub segment_name: String,
}

pub async fn predict_segment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let (user_id, s) = run(&state.models.segment, body)?;
    Ok(Json(SegmentResponse {
        user_id,
        cluster_id: s.cluster_id,
        segment_name: s.segment_name,
    }))
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub predicted_events: f64,
}

pub async fn predict_forecast(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let (user_id, f) = run(&state.models.forecast, body)?;
    Ok(Json(ForecastResponse {
        user_id,
        predicted_events: f.predicted_events,
    }))
}
