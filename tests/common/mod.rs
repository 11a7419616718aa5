#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

pub const GREETING: &[&str] = &[
    "{\"response\":\"Hel\",\"done\":false}\n",
    "{\"response\":\"lo\",\"done\":false}\n",
    "{\"response\":\"\",\"done\":true,\"context\":[1,2,3]}\n",
];

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    chunks: Arc<Vec<String>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

// Stand-in for an Ollama server: records request bodies, answers every
// request with the same body chunks
pub struct FakeOllama {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeOllama {
    pub async fn start(chunks: &[&str]) -> Self {
        Self::start_with_status(StatusCode::OK, chunks).await
    }

    pub async fn start_with_status(status: StatusCode, chunks: &[&str]) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            chunks: Arc::new(chunks.iter().map(|c| c.to_string()).collect()),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/api/generate", post(generate))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn generate(State(state): State<FakeState>, Json(body): Json<Value>) -> impl IntoResponse {
    state.requests.lock().unwrap().push(body);

    let chunks: Vec<Result<String, std::io::Error>> =
        state.chunks.iter().cloned().map(Ok).collect();

    (
        state.status,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(futures_util::stream::iter(chunks)),
    )
}
