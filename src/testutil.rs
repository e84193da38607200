// ===============================
// src/testutil.rs (test only)
// ===============================
//
// In-process LLM endpoint on an ephemeral port. Replies with a fixed
// status/body and remembers the last request it saw.
//
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

pub struct MockUpstream {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockUpstream {
    pub async fn start(status: StatusCode, body: String) -> Self {
        let seen: Arc<Mutex<Vec<SeenRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_svc = seen.clone();

        let make_svc = make_service_fn(move |_conn| {
            let seen = seen_svc.clone();
            let body = body.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let seen = seen.clone();
                    let body = body.clone();
                    async move {
                        let authorization = req
                            .headers()
                            .get(hyper::header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap_or_default();
                        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
                        seen.lock().await.push(SeenRequest { authorization, body: json });

                        let rsp = Response::builder()
                            .status(status)
                            .header("content-type", "application/json")
                            .body(Body::from(body))
                            .unwrap();
                        Ok::<_, Infallible>(rsp)
                    }
                }))
            }
        });

        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);
        Self { addr, seen }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/v1/chat/completions", self.addr)).unwrap()
    }

    pub async fn last_request(&self) -> Option<SeenRequest> {
        self.seen.lock().await.last().cloned()
    }

    pub async fn hits(&self) -> usize {
        self.seen.lock().await.len()
    }
}

/// Chat-completions envelope around `content`.
pub fn chat_reply(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

/// URL of a local port nobody listens on (connection refused).
pub fn closed_port_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/v1/chat/completions")).unwrap()
}
