// ===============================
// src/server.rs (HTTP boundary: /analyze + /metrics)
// ===============================
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::analysis::AnalysisGateway;
use crate::domain::{AnalysisKind, AnalysisRequest, MarketSnapshot, PortfolioSnapshot, RequestError};
use crate::metrics::{self, HTTP_RESPONSES};

pub const SOURCE_HEADER: &str = "x-analysis-source";

pub struct AppState {
    pub gateway: AnalysisGateway,
    pub tag_source: bool,
}

/// Raw body; fields stay loose so each precondition gets its own 400.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    #[serde(default)]
    portfolio_data: Value,
    #[serde(default)]
    market_data: Value,
    #[serde(default)]
    analysis_type: Value,
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    let mut rsp = Response::new(Body::from(body.to_string()));
    *rsp.status_mut() = status;
    rsp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    rsp
}

fn error_response(status: StatusCode, msg: &str) -> Response<Body> {
    json_response(status, &json!({ "error": msg }))
}

fn internal_error(msg: &str) -> Response<Body> {
    json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "error": msg, "fallback": true }))
}

fn describe() -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({
            "message": "AI Analysis API",
            "endpoints": {
                "POST": "/analyze",
                "parameters": {
                    "portfolioData": "Required - Portfolio data object",
                    "marketData": "Optional - Market data object (required for market/trading analysis)",
                    "analysisType": "Required - One of: portfolio, market, trading"
                }
            }
        }),
    )
}

/// `null`, `false`, `0`, `""` and a missing field all count as "not given".
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

async fn handle_analyze(req: Request<Body>, state: &AppState) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => {
            error!(?e, "analyze: reading body failed");
            return internal_error("Failed to read request body");
        }
    };
    let body: AnalyzeBody = match serde_json::from_slice(&bytes) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "analyze: body is not JSON");
            return internal_error(&format!("Invalid request body: {e}"));
        }
    };

    if is_blank(&body.portfolio_data) {
        return error_response(StatusCode::BAD_REQUEST, "Portfolio data is required");
    }
    let Some(kind) = body.analysis_type.as_str().and_then(AnalysisKind::parse) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid analysis type. Must be one of: portfolio, market, trading",
        );
    };

    if is_blank(&body.market_data) {
        if let Some(e) = RequestError::missing_market(kind) {
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    }

    // market insights tidak membaca portfolio: bentuk yang salah tidak menggagalkan request
    let portfolio: PortfolioSnapshot = match (kind, serde_json::from_value::<PortfolioSnapshot>(body.portfolio_data)) {
        (_, Ok(p)) => p,
        (AnalysisKind::Market, Err(e)) => {
            debug!(error = %e, "analyze: portfolio ignored for market insights");
            PortfolioSnapshot::default()
        }
        (_, Err(e)) => return internal_error(&format!("Invalid portfolio data: {e}")),
    };
    let market: Option<MarketSnapshot> = match kind {
        AnalysisKind::Portfolio => None,
        AnalysisKind::Market | AnalysisKind::Trading => match serde_json::from_value(body.market_data) {
            Ok(m) => Some(m),
            Err(e) => return internal_error(&format!("Invalid market data: {e}")),
        },
    };

    let request = match AnalysisRequest::new(kind, portfolio, market) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let analysis = state.gateway.analyze(&request).await;
    let mut payload = match serde_json::to_value(&analysis.report) {
        Ok(v) => v,
        Err(e) => {
            error!(?e, "analyze: result serialization failed");
            return internal_error("AI analysis failed");
        }
    };
    if state.tag_source {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("source".to_string(), json!(analysis.source.as_str()));
        }
    }

    let mut rsp = json_response(StatusCode::OK, &payload);
    rsp.headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(analysis.source.as_str()));
    rsp
}

fn metrics_response() -> Response<Body> {
    let mut rsp = Response::new(Body::from(metrics::encode_metrics()));
    if let Ok(ct) = HeaderValue::from_str(&metrics::content_type()) {
        rsp.headers_mut().insert(CONTENT_TYPE, ct);
    }
    rsp
}

pub async fn route(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (label, rsp) = match (&method, path.as_str()) {
        (&Method::POST, "/analyze") | (&Method::POST, "/api/ai/analyze") => {
            ("analyze", handle_analyze(req, &state).await)
        }
        (&Method::GET, "/analyze") | (&Method::GET, "/api/ai/analyze") => ("describe", describe()),
        (&Method::GET, "/metrics") | (&Method::GET, "/") => ("metrics", metrics_response()),
        _ => ("other", error_response(StatusCode::NOT_FOUND, "Not found")),
    };

    HTTP_RESPONSES.with_label_values(&[label, rsp.status().as_str()]).inc();
    Ok(rsp)
}

pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| route(req, state.clone()))) }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(addr = %server.local_addr(), "http listening (POST /analyze, GET /metrics)");
    server.with_graceful_shutdown(shutdown).await
}
