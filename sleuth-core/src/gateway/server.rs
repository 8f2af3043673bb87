//! HTTP gateway server built on axum.

use crate::research::activity::{ActivityEvent, ActivityStatus, ActivityType};
use crate::research::engine::DeepResearch;
use crate::research::questions::generate_questions;
use crate::research::request::ResearchRequest;
use crate::research::sink::{ChannelSink, ResearchEvent, StreamSink};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    research: Arc<DeepResearch>,
    started_at: chrono::DateTime<Utc>,
}

impl GatewayState {
    pub fn new(research: Arc<DeepResearch>) -> Self {
        Self {
            research,
            started_at: Utc::now(),
        }
    }

    /// Uptime in seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_seconds().max(0) as u64
    }
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/deep-research", post(deep_research_handler))
        .route("/api/generate-questions", post(generate_questions_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn client_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

fn to_sse(event: &ResearchEvent) -> SseEvent {
    SseEvent::default()
        .event(event.name())
        .data(event.to_wire().to_string())
}

/// Start a research run and stream its events.
///
/// The request is validated before anything runs; a malformed payload is a
/// 400 and never opens a stream.
async fn deep_research_handler(State(state): State<GatewayState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => return client_error("Invalid message format!"),
    };
    let request = match ResearchRequest::from_chat_payload(&payload) {
        Ok(request) => request,
        Err(e) => return client_error(e.to_string()),
    };

    info!(topic = %request.topic, clarifications = request.clarifications.len(), "Deep research requested");

    let (sink, rx) = ChannelSink::new();
    tokio::spawn(drive_run(state.research.clone(), request, Arc::new(sink)));

    let stream = UnboundedReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(to_sse(&event)));
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

/// Run to completion on its own task. A panicking run still produces one
/// error activity so the stream closes cleanly.
async fn drive_run(research: Arc<DeepResearch>, request: ResearchRequest, sink: Arc<dyn StreamSink>) {
    let run_sink = sink.clone();
    let handle = tokio::spawn(async move {
        let mut state = request.new_state();
        research.run(&mut state, run_sink).await
    });

    if let Err(e) = handle.await {
        error!(error = %e, "Deep research task aborted");
        sink.write(ResearchEvent::Activity(ActivityEvent::new(
            ActivityType::Generate,
            ActivityStatus::Error,
            "An unexpected error occurred during research",
        )));
    }
}

async fn generate_questions_handler(State(state): State<GatewayState>, body: Bytes) -> Response {
    let topic = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("topic")?.as_str().map(str::to_string))
        .unwrap_or_default();
    if topic.trim().is_empty() {
        return client_error("Topic is required");
    }

    let model = state.research.models().planning.clone();
    let questions = generate_questions(state.research.brain(), &model, &topic).await;
    Json(questions).into_response()
}

/// Health check endpoint.
async fn health_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model": state.research.brain().model_name(),
        "search_providers": state.research.search().provider_names(),
        "uptime_secs": state.uptime_secs(),
    }))
}

/// Serve the gateway on `host:port` until Ctrl-C.
pub async fn run(state: GatewayState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{Brain, MockLlmProvider, RetryPolicy};
    use crate::config::ResearchConfig;
    use crate::research::search::{SearchAggregator, SearchResult, StaticSearchProvider};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_state(provider: Arc<MockLlmProvider>) -> GatewayState {
        let brain = Brain::new(provider, RetryPolicy::new(3, Duration::from_millis(1)));
        let search = SearchAggregator::new(
            vec![Arc::new(StaticSearchProvider::new(
                "web",
                vec![SearchResult::new(
                    "Laptops",
                    "https://example.com/laptops",
                    "The XPS 13 costs $999.",
                )],
            ))],
            20_000,
        );
        GatewayState::new(Arc::new(DeepResearch::new(
            Arc::new(brain),
            Arc::new(search),
            ResearchConfig::default(),
        )))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// `(event name, data json)` pairs from an SSE body.
    fn parse_sse(body: &str) -> Vec<(String, Value)> {
        body.split("\n\n")
            .filter_map(|frame| {
                let mut name = None;
                let mut data = None;
                for line in frame.lines() {
                    if let Some(rest) = line.strip_prefix("event:") {
                        name = Some(rest.trim().to_string());
                    } else if let Some(rest) = line.strip_prefix("data:") {
                        data = serde_json::from_str(rest.trim()).ok();
                    }
                }
                Some((name?, data?))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(make_state(Arc::new(MockLlmProvider::new())));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);

        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "mock-model");
        assert_eq!(json["search_providers"], json!(["web"]));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_client_error() {
        let app = router(make_state(Arc::new(MockLlmProvider::new())));
        let req = Request::builder()
            .method("POST")
            .uri("/api/deep-research")
            .body(Body::from("{not json"))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid message format!");
    }

    #[tokio::test]
    async fn test_missing_topic_is_client_error() {
        let provider = Arc::new(MockLlmProvider::new());
        let app = router(make_state(provider.clone()));
        let payload = json!({"messages": [{"content": "{\"clarifications\": []}"}]});

        let resp = app
            .oneshot(post_json("/api/deep-research", payload))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["error"], "Topic is required");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_deep_research_streams_activities_then_report() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::submit_response(
            json!({"queries": ["best laptop under $1000"]}),
        ));
        provider.queue_response(MockLlmProvider::submit_response(
            json!({"summary": "The XPS 13 costs $999."}),
        ));
        provider.queue_response(MockLlmProvider::submit_response(json!({"sufficient": true})));
        provider.queue_response(MockLlmProvider::text_response(
            "<report># Best laptop\nXPS 13</report>",
        ));
        let app = router(make_state(provider));
        let doc = json!({
            "topic": "best laptop 2024",
            "clarifications": [{"question": "budget?", "answer": "$1000"}]
        });
        let payload = json!({"messages": [{"role": "user", "parts": [{"type": "text", "text": doc.to_string()}]}]});

        let resp = app
            .oneshot(post_json("/api/deep-research", payload))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let events = parse_sse(&body_text(resp).await);
        let reports: Vec<_> = events.iter().filter(|(n, _)| n == "data-report").collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1["type"], "data-report");
        assert_eq!(reports[0].1["data"], "<report># Best laptop\nXPS 13</report>");

        let extracted = events.iter().any(|(n, d)| {
            n == "data-activity"
                && d["data"]["type"] == "extract"
                && d["data"]["message"] == "Extracted from https://example.com/laptops"
        });
        assert!(extracted);

        let report_done = &events[events.len() - 2];
        assert_eq!(report_done.0, "data-activity");
        assert_eq!(report_done.1["data"]["type"], "report");
        assert_eq!(report_done.1["data"]["status"], "complete");
        assert_eq!(events.last().unwrap().0, "data-report");
    }

    #[tokio::test]
    async fn test_failed_run_streams_single_error() {
        let provider = Arc::new(MockLlmProvider::with_handler(|_| {
            Err(crate::error::LlmError::Connection {
                message: "refused".into(),
            })
        }));
        let app = router(make_state(provider));
        let payload = json!({"messages": [{"content": "{\"topic\": \"rust\"}"}]});

        let resp = app
            .oneshot(post_json("/api/deep-research", payload))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let events = parse_sse(&body_text(resp).await);
        assert!(events.iter().all(|(n, _)| n == "data-activity"));
        let errors: Vec<_> = events
            .iter()
            .filter(|(_, d)| d["data"]["status"] == "error")
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1["data"]["type"], "plan");
    }

    #[tokio::test]
    async fn test_panicking_run_streams_single_error() {
        let provider = Arc::new(MockLlmProvider::with_handler(|_| {
            panic!("provider blew up");
        }));
        let app = router(make_state(provider));
        let payload = json!({"messages": [{"content": "{\"topic\": \"rust\"}"}]});

        let resp = app
            .oneshot(post_json("/api/deep-research", payload))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let events = parse_sse(&body_text(resp).await);
        assert!(events.iter().all(|(n, _)| n == "data-activity"));
        let errors: Vec<_> = events
            .iter()
            .filter(|(_, d)| d["data"]["status"] == "error")
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].1["data"]["message"],
            "An unexpected error occurred during research"
        );
        assert_eq!(events.last().unwrap().1["data"]["status"], "error");
    }

    #[tokio::test]
    async fn test_generate_questions_endpoint() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::submit_response(
            json!({"questions": ["What budget?", "Which OS?"]}),
        ));
        let app = router(make_state(provider));

        let resp = app
            .oneshot(post_json("/api/generate-questions", json!({"topic": "best laptop"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json, json!(["What budget?", "Which OS?"]));
    }

    #[tokio::test]
    async fn test_generate_questions_requires_topic() {
        let app = router(make_state(Arc::new(MockLlmProvider::new())));
        let resp = app
            .oneshot(post_json("/api/generate-questions", json!({"topic": ""})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
