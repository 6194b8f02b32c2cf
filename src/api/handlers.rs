use crate::api::AppState;
use crate::correlation::{CorrelationInput, CorrelationResult, RecognizedView};
use crate::error::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use uuid::Uuid;
use validator::Validate;

const INDEX_HTML: &str = r#"<html>
    <head>
        <title>Telemetry Correlator</title>
    </head>
    <body>
        <form action="/correlate" method="post">
            Alert firing? Tell me the alert name! <input type="text" name="alertname">
            <br/>
            Use exemplars too? <input type="checkbox" name="useExemplar">
            <input type="submit" value="Correlate">
        </form>
    </body>
</html>
"#;

/// Landing page with the correlation form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Correlate from the HTML form
pub async fn correlate_form(
    State(state): State<AppState>,
    Form(request): Form<CorrelateForm>,
) -> Result<Json<CorrelationResult>> {
    request.validate()?;
    let input = CorrelationInput::new(request.alertname, request.use_exemplar.as_deref() == Some("on"));
    run_correlation(&state, input).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct CorrelateForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "alertname parameter is required"))]
    pub alertname: String,
    /// Checkbox value, `on` when ticked
    #[serde(rename = "useExemplar", default)]
    pub use_exemplar: Option<String>,
}

/// Correlate from query parameters
pub async fn correlate(
    State(state): State<AppState>,
    Query(params): Query<CorrelateQuery>,
) -> Result<Json<CorrelationResult>> {
    params.validate()?;
    let input = CorrelationInput::new(params.alertname, params.exemplar);
    run_correlation(&state, input).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct CorrelateQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "alertname parameter is required"))]
    pub alertname: String,
    #[serde(default)]
    pub exemplar: bool,
}

async fn run_correlation(
    state: &AppState,
    input: CorrelationInput,
) -> Result<Json<CorrelationResult>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("correlate", %request_id, alert = %input.alert_name);

    async move {
        info!(pivot = input.include_exemplar_pivot, "Correlation requested");
        let result = state.engine.correlate(&input).await?;
        Ok(Json(result))
    }
    .instrument(span)
    .await
}

/// Recognize a backend UI URL
pub async fn recognize(
    State(state): State<AppState>,
    Query(params): Query<RecognizeQuery>,
) -> Result<Json<RecognizeResponse>> {
    params.validate()?;
    let view = state.engine.recognize(&params.url)?;
    Ok(Json(RecognizeResponse {
        recognized: view.is_some(),
        view,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecognizeQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "url parameter is required"))]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<RecognizedView>,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
