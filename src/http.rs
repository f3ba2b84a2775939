use crate::collectors::{Fault, FieldValue};
use crate::metrics::Metrics;
use crate::state::State as AgentState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub state: Arc<RwLock<AgentState>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiSnapshot {
    pub started_at_unix: i64,
    pub last_collect_timestamp_seconds: i64,
    pub last_collect_at: Option<String>,
    pub cycles: u64,
    pub measurement: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub faults: Vec<Fault>,
}

impl From<&AgentState> for ApiSnapshot {
    fn from(value: &AgentState) -> Self {
        Self {
            started_at_unix: value.started_at_unix,
            last_collect_timestamp_seconds: value.last_collect_timestamp_seconds,
            last_collect_at: value.last_collect_at(),
            cycles: value.cycles,
            measurement: value.measurement.clone(),
            fields: value.snapshot.fields.clone(),
            faults: value.snapshot.faults.clone(),
        }
    }
}

pub fn build_router(metrics: Arc<Metrics>, state: Arc<RwLock<AgentState>>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(HttpAppState { metrics, state })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    Json(ApiSnapshot::from(&*guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Snapshot;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let metrics = Metrics::new().expect("metrics init");
        let state = Arc::new(RwLock::new(AgentState::new(0, "core")));
        let (status, body) = get_text(build_router(metrics, state), "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn metrics_contains_uptime() {
        let metrics = Metrics::new().expect("metrics init");
        let state = Arc::new(RwLock::new(AgentState::new(0, "core")));
        metrics.update_from_state(&AgentState::new(0, "core"));
        let (status, body) = get_text(build_router(metrics, state), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("edgeprobe_uptime_seconds"));
        assert!(body.contains("edgeprobe_scrape_count_total 1"));
    }

    #[tokio::test]
    async fn api_snapshot_returns_fields_and_faults() {
        let metrics = Metrics::new().expect("metrics init");
        let mut agent = AgentState::new(10, "core");
        let mut snapshot = Snapshot::default();
        snapshot.insert("thermo", 43500);
        snapshot.insert("gpu", FieldValue::Absent);
        snapshot.faults.push(Fault::Parse {
            path: "/sys/devices/platform/host1x/gpu.0/load".to_string(),
            raw: "n/a".to_string(),
        });
        agent.update_collected(20, snapshot);
        let state = Arc::new(RwLock::new(agent));

        let (status, body) = get_text(build_router(metrics, state), "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["cycles"], 1);
        assert_eq!(json["measurement"], "core");
        assert_eq!(json["fields"]["thermo"], 43500);
        assert!(json["fields"]["gpu"].is_null());
        assert_eq!(json["faults"][0]["kind"], "parse");
        assert_eq!(json["faults"][0]["raw"], "n/a");
        assert_eq!(json["last_collect_at"], "1970-01-01T00:00:20Z");
    }
}
