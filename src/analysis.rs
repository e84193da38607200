// ===============================
// src/analysis.rs (gateway: quota -> LLM -> validate | fallback)
// ===============================
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::{sync::mpsc, time::{Duration, Instant}};
use tracing::{info, warn};

use crate::domain::{Analysis, AnalysisEvent, AnalysisReport, AnalysisRequest, Event, Source};
use crate::fallback;
use crate::llm::{ChatClient, UpstreamError};
use crate::metrics::{ANALYSES, FALLBACKS};
use crate::prompts;
use crate::recorder;
use crate::quota::{QuotaError, QuotaGate};
use crate::schema::{parse_reply, SchemaError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl AnalysisError {
    pub fn reason(&self) -> &'static str {
        match self {
            AnalysisError::Quota(_) => "quota_timeout",
            AnalysisError::Upstream(e) => e.reason(),
            AnalysisError::Schema(_) => "schema",
        }
    }
}

pub struct AnalysisGateway {
    quota: Arc<QuotaGate>,
    client: ChatClient,
    quota_wait: Duration,
    journal: Option<mpsc::Sender<Event>>,
}

impl AnalysisGateway {
    pub fn new(quota: Arc<QuotaGate>, client: ChatClient, quota_wait: Duration) -> Self {
        Self { quota, client, quota_wait, journal: None }
    }

    pub fn with_journal(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.journal = Some(tx);
        self
    }

    /// Always yields a schema-valid report; failures turn into the fallback.
    pub async fn analyze(&self, req: &AnalysisRequest) -> Analysis {
        let kind = req.kind();
        let started = Instant::now();

        let (report, source, reason) = match self.ask_model(req).await {
            Ok(report) => (report, Source::Model, None),
            Err(e) => {
                warn!(%kind, reason = e.reason(), error = %e, "analysis falling back");
                FALLBACKS.with_label_values(&[kind.as_str(), e.reason()]).inc();
                (fallback::for_request(req), Source::Fallback, Some(e.to_string()))
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        ANALYSES.with_label_values(&[kind.as_str(), source.as_str()]).inc();
        info!(%kind, tokens = req.portfolio().tokens.len(), source = source.as_str(), latency_ms, "analysis done");

        if let Some(tx) = &self.journal {
            let ev = AnalysisEvent { ts: Utc::now(), kind, source, reason, latency_ms };
            recorder::record(tx, Event::Analysis(ev));
        }

        Analysis { report, source }
    }

    async fn ask_model(&self, req: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let messages = prompts::build(req);
        self.quota.acquire_within(self.quota_wait).await?;
        let text = self.client.complete(&messages).await?;

        let report = match req {
            AnalysisRequest::Portfolio(_) => AnalysisReport::Portfolio(parse_reply(&text)?),
            AnalysisRequest::Market { .. } => AnalysisReport::Market(parse_reply(&text)?),
            AnalysisRequest::Trading { .. } => AnalysisReport::Trading(parse_reply(&text)?),
        };
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AnalysisKind, MarketSnapshot, PortfolioSnapshot, RiskLevel, TokenHolding, TradeAction, Trend,
    };
    use crate::testutil::{chat_reply, closed_port_url, MockUpstream};
    use hyper::StatusCode;
    use url::Url;

    fn gateway(url: Url) -> AnalysisGateway {
        let quota = Arc::new(QuotaGate::new(100, Duration::from_secs(60)));
        let client = ChatClient::new(url, "k".into(), "m".into(), Duration::from_secs(5)).unwrap();
        AnalysisGateway::new(quota, client, Duration::from_secs(5))
    }

    fn empty_portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot { balance: 0.0, tokens: vec![], total_value: 0.0 }
    }

    fn request(kind: AnalysisKind) -> AnalysisRequest {
        AnalysisRequest::new(kind, empty_portfolio(), Some(MarketSnapshot::reference())).unwrap()
    }

    fn assert_zero_token_fallback(a: &Analysis) {
        assert_eq!(a.source, Source::Fallback);
        match &a.report {
            AnalysisReport::Portfolio(p) => {
                assert_eq!(p.risk_score, 100);
                assert_eq!(p.risk_level, RiskLevel::High);
                assert_eq!(p.diversification_score, 0);
            }
            other => panic!("wrong report: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_model_reply_is_returned_unchanged() {
        let content = r#"{"riskScore":35,"riskLevel":"Low","diversificationScore":80,"recommendations":["Keep staking"],"summary":"Healthy."}"#;
        let upstream = MockUpstream::start(StatusCode::OK, chat_reply(content)).await;
        let a = gateway(upstream.url()).analyze(&request(AnalysisKind::Portfolio)).await;

        assert_eq!(a.source, Source::Model);
        let body = serde_json::to_value(&a.report).unwrap();
        assert_eq!(body, serde_json::from_str::<serde_json::Value>(content).unwrap());
        assert_eq!(upstream.hits().await, 1);
    }

    #[tokio::test]
    async fn test_empty_choices_falls_back() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"choices":[]}"#.into()).await;
        let a = gateway(upstream.url()).analyze(&request(AnalysisKind::Portfolio)).await;
        assert_zero_token_fallback(&a);
    }

    #[tokio::test]
    async fn test_unparseable_content_falls_back() {
        let upstream = MockUpstream::start(StatusCode::OK, chat_reply("I think you should buy more SOL.")).await;
        let a = gateway(upstream.url()).analyze(&request(AnalysisKind::Portfolio)).await;
        assert_zero_token_fallback(&a);
    }

    #[tokio::test]
    async fn test_bad_risk_level_falls_back() {
        let content = r#"{"riskScore":35,"riskLevel":"Moderate","diversificationScore":80,"recommendations":[],"summary":"s"}"#;
        let upstream = MockUpstream::start(StatusCode::OK, chat_reply(content)).await;
        let a = gateway(upstream.url()).analyze(&request(AnalysisKind::Portfolio)).await;
        assert_zero_token_fallback(&a);
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let upstream = MockUpstream::start(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()).await;
        let a = gateway(upstream.url()).analyze(&request(AnalysisKind::Market)).await;
        assert_eq!(a.source, Source::Fallback);
        match a.report {
            AnalysisReport::Market(m) => assert_eq!(m.trend, Trend::Neutral),
            other => panic!("wrong report: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_kind_is_valid_when_endpoint_unreachable() {
        let gw = gateway(closed_port_url());
        for kind in [AnalysisKind::Portfolio, AnalysisKind::Market, AnalysisKind::Trading] {
            let a = gw.analyze(&request(kind)).await;
            assert_eq!(a.source, Source::Fallback);
            let ok = match &a.report {
                AnalysisReport::Portfolio(p) => kind == AnalysisKind::Portfolio && p.risk_score == 100,
                AnalysisReport::Market(m) => kind == AnalysisKind::Market && m.confidence == 50,
                AnalysisReport::Trading(t) => {
                    kind == AnalysisKind::Trading && t.recommendations[0].action == TradeAction::Hold
                }
            };
            assert!(ok, "kind {kind} produced {:?}", a.report);
        }
    }

    #[tokio::test]
    async fn test_fallback_uses_token_count_of_request() {
        let gw = gateway(closed_port_url());
        let tokens = (0..2)
            .map(|i| TokenHolding { symbol: format!("T{i}"), amount: 1.0, value: 2.0 })
            .collect();
        let p = PortfolioSnapshot { balance: 1.0, tokens, total_value: 154.0 };
        let a = gw.analyze(&AnalysisRequest::Portfolio(p)).await;
        match a.report {
            AnalysisReport::Portfolio(r) => {
                assert_eq!((r.risk_score, r.risk_level, r.diversification_score), (70, RiskLevel::Medium, 40));
            }
            other => panic!("wrong report: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quota_timeout_falls_back_without_calling_endpoint() {
        let upstream = MockUpstream::start(StatusCode::OK, chat_reply("{}")).await;
        let quota = Arc::new(QuotaGate::new(1, Duration::from_secs(3600)));
        quota.acquire().await;
        let client = ChatClient::new(upstream.url(), "k".into(), "m".into(), Duration::from_secs(5)).unwrap();
        let gw = AnalysisGateway::new(quota, client, Duration::from_millis(20));

        let a = gw.analyze(&request(AnalysisKind::Trading)).await;
        assert_eq!(a.source, Source::Fallback);
        assert_eq!(upstream.hits().await, 0);
    }

    #[tokio::test]
    async fn test_journal_receives_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let gw = gateway(closed_port_url()).with_journal(tx);
        gw.analyze(&request(AnalysisKind::Market)).await;
        match rx.recv().await {
            Some(Event::Analysis(ev)) => {
                assert_eq!(ev.kind, AnalysisKind::Market);
                assert_eq!(ev.source, Source::Fallback);
                assert!(ev.reason.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
