//! HTTP dispatcher around the transformation core.
//!
//! `POST /transform?direction=bpmntopnml|pnmltobpmn` takes a url-encoded
//! form with the model under `bpmn` or `pnml` (plus `isTargetWorkflow` for
//! the BPMN direction) and answers with JSON. Known transformation errors
//! map to 400, internal ones to 500; a remote token check gates every
//! transformation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bpmn_pnml_core::TransformError;

pub const DEFAULT_CHECK_TOKEN_URL: &str =
    "https://europe-west3-woped-422510.cloudfunctions.net/checkTokens";

// ─── Token gate ───────────────────────────────────────────────

/// Remote precondition for every transformation request.
#[async_trait]
pub trait TokenGate: Send + Sync {
    async fn check(&self) -> Result<(), TransformError>;
}

/// Production gate: GET against the token service. A 400 means the quota is
/// exhausted; any other failure is an unsuccessful check.
pub struct HttpTokenGate {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenGate {
    pub fn new(url: impl Into<String>) -> Self {
        HttpTokenGate { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl TokenGate for HttpTokenGate {
    async fn check(&self) -> Result<(), TransformError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|_| TransformError::TokenCheckUnsuccessful)?;
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Err(TransformError::NoRequestTokensAvailable);
        }
        if !response.status().is_success() {
            return Err(TransformError::TokenCheckUnsuccessful);
        }
        Ok(())
    }
}

/// Gate that always admits; used by tests.
pub struct OpenTokenGate;

#[async_trait]
impl TokenGate for OpenTokenGate {
    async fn check(&self) -> Result<(), TransformError> {
        Ok(())
    }
}

// ─── Router ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub token_gate: Arc<dyn TokenGate>,
}

pub fn app(token_gate: Arc<dyn TokenGate>) -> Router {
    Router::new()
        .route("/transform", post(post_transform))
        .route("/health", get(get_health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { token_gate })
}

#[derive(Deserialize)]
struct DirectionParams {
    direction: Option<String>,
}

#[derive(Deserialize)]
struct TransformForm {
    bpmn: Option<String>,
    pnml: Option<String>,
    #[serde(rename = "isTargetWorkflow")]
    is_target_workflow: Option<String>,
}

/// Response-side wrapper: known errors become 400, internal ones 500; the
/// body always carries the public text only.
struct ApiError(TransformError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.id() {
            Some(_) => StatusCode::BAD_REQUEST,
            None => {
                tracing::error!(error = %self.0, "internal transformation error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.public_text() }))).into_response()
    }
}

impl From<TransformError> for ApiError {
    fn from(err: TransformError) -> Self {
        ApiError(err)
    }
}

async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn post_transform(
    State(state): State<AppState>,
    Query(params): Query<DirectionParams>,
    Form(form): Form<TransformForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.token_gate.check().await?;

    match params.direction.as_deref() {
        Some("bpmntopnml") => {
            let bpmn_xml = form
                .bpmn
                .ok_or_else(|| TransformError::UnexpectedQueryParameter("bpmn".into()))?;
            let is_target_workflow = form
                .is_target_workflow
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false);
            tracing::info!(is_target_workflow, "transform bpmn to pnml");
            let pnml = if is_target_workflow {
                bpmn_pnml_core::bpmn_to_workflow_net_xml(&bpmn_xml)?
            } else {
                bpmn_pnml_core::bpmn_to_st_net_xml(&bpmn_xml)?
            };
            Ok(Json(json!({ "pnml": pnml })))
        }
        Some("pnmltobpmn") => {
            let pnml_xml = form
                .pnml
                .ok_or_else(|| TransformError::UnexpectedQueryParameter("pnml".into()))?;
            tracing::info!("transform pnml to bpmn");
            let bpmn = bpmn_pnml_core::pnml_to_bpmn_xml(&pnml_xml)?;
            Ok(Json(json!({ "bpmn": bpmn })))
        }
        other => Err(ApiError(TransformError::UnexpectedQueryParameter(
            other.unwrap_or("direction").to_owned(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct DenyingGate;

    #[async_trait]
    impl TokenGate for DenyingGate {
        async fn check(&self) -> Result<(), TransformError> {
            Err(TransformError::NoRequestTokensAvailable)
        }
    }

    const BPMN: &str = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL"><bpmn:process id="p1" isExecutable="true"><bpmn:startEvent id="s" /><bpmn:endEvent id="e" /><bpmn:sequenceFlow id="f" sourceRef="s" targetRef="e" /></bpmn:process></bpmn:definitions>"#;

    fn form_request(direction: &str, key: &str, xml: &str) -> Request<Body> {
        let body = format!("{key}={}", urlencode(xml));
        Request::builder()
            .method("POST")
            .uri(format!("/transform?direction={direction}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn urlencode(value: &str) -> String {
        let mut out = String::new();
        for byte in value.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char)
                }
                _ => out.push_str(&format!("%{byte:02X}")),
            }
        }
        out
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn transforms_bpmn_to_pnml() {
        let app = app(Arc::new(OpenTokenGate));
        let response = app.oneshot(form_request("bpmntopnml", "bpmn", BPMN)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let pnml = json["pnml"].as_str().expect("pnml payload");
        assert!(pnml.contains("<pnml>"));
        assert!(pnml.contains("SILENTFROMsTOe"));
    }

    #[tokio::test]
    async fn unknown_direction_is_a_400_with_error_id_4() {
        let app = app(Arc::new(OpenTokenGate));
        let response = app.oneshot(form_request("sideways", "bpmn", BPMN)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("[4]"));
    }

    #[tokio::test]
    async fn exhausted_tokens_surface_as_400() {
        let app = app(Arc::new(DenyingGate));
        let response = app.oneshot(form_request("bpmntopnml", "bpmn", BPMN)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("[14]"));
    }

    #[tokio::test]
    async fn unsupported_elements_surface_as_400() {
        let app = app(Arc::new(OpenTokenGate));
        let bad = BPMN.replace("<bpmn:endEvent id=\"e\" />", "<bpmn:endEvent id=\"e\" /><bpmn:manualTask id=\"m\" />");
        let response = app.oneshot(form_request("bpmntopnml", "bpmn", &bad)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("[1]"));
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = app(Arc::new(OpenTokenGate));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }
}
