// Mock routing provider used by unit and integration tests.
//
// Shared via `include!`, so nothing here may refer to the crate under test.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const DIRECTIONS_PATH: &str = "/v2/directions/driving-car/geojson";

/// What the stub answers to every directions call.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum StubReply {
    Json { status: StatusCode, body: Value },
    Text { status: StatusCode, body: String },
    Delayed { delay: Duration, body: Value },
}

#[allow(dead_code)]
impl StubReply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        StubReply::Json { status, body }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        StubReply::Text {
            status,
            body: body.to_string(),
        }
    }

    pub fn delayed(delay: Duration, body: Value) -> Self {
        StubReply::Delayed { delay, body }
    }
}

/// One request as seen by the stub.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    reply: StubReply,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn handle_directions(
    State(state): State<StubState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    let captured = CapturedRequest {
        authorization: header_text(header::AUTHORIZATION),
        accept: header_text(header::ACCEPT),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    };
    state.requests.lock().unwrap().push(captured);

    match state.reply {
        StubReply::Json { status, body } => (status, Json(body)).into_response(),
        StubReply::Text { status, body } => (status, body).into_response(),
        StubReply::Delayed { delay, body } => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, Json(body)).into_response()
        }
    }
}

pub struct ProviderStub {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    join: JoinHandle<()>,
}

#[allow(dead_code)]
impl ProviderStub {
    pub async fn start(reply: StubReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            reply,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route(DIRECTIONS_PATH, post(handle_directions))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind provider stub");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("provider stub server error");
        });

        Self {
            base_url,
            requests,
            join,
        }
    }

    /// Full directions URL served by the stub.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, DIRECTIONS_PATH)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn take_requests(&self) -> Vec<CapturedRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl Drop for ProviderStub {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// URL of a local port nothing listens on.
#[allow(dead_code)]
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}{}", addr, DIRECTIONS_PATH)
}
