// ===============================
// src/main.rs
// ===============================
/*
 # jalankan service
 MISTRAL_API_KEY=... cargo run --release

 # analisis portfolio
 curl -s localhost:8080/analyze -d '{"portfolioData":{"balance":1,"tokens":[],"totalValue":150},"analysisType":"portfolio"}'

 # metrics kuota & fallback
 curl -s localhost:8080/metrics | egrep '^(quota_|analysis_fallbacks_total)'
*/
/*
=============================================================================
Project : sol_insight_gateway — rate-limited AI analysis gateway in Rust
Module  : main.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Serves portfolio / market / trading analysis for a Solana
          dashboard over HTTP, calls an LLM chat endpoint through a
          sliding-window quota gate, validates replies against fixed
          schemas and falls back to deterministic answers. Exposes
          Prometheus metrics and records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod domain;
mod config;
mod metrics;
mod recorder;
mod quota;            // sliding-window admission gate
mod llm;              // chat-completions client
mod prompts;
mod schema;           // parse + validate model replies
mod fallback;         // deterministic offline answers
mod analysis;         // gateway: quota -> LLM -> validate | fallback
mod server;           // POST /analyze, GET /metrics
#[cfg(test)]
mod testutil;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::{select, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analysis::AnalysisGateway;
use crate::domain::{AnalysisKind, AnalysisRequest, Event, MarketSnapshot, PortfolioSnapshot, WalletToken};
use crate::llm::ChatClient;
use crate::quota::QuotaGate;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "sol_insight_gateway", version, about = "Rate-limited AI analysis gateway for Solana portfolios")]
struct Cli {
    /// Override LISTEN_ADDR (e.g. 127.0.0.1:8080)
    #[arg(long, global = true)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Run one analysis and print the JSON result
    Analyze {
        /// portfolio | market | trading
        #[arg(long)]
        kind: String,
        /// JSON file with {balance, tokens, totalValue}, or raw wallet
        /// {balance, tokens: [{symbol?, amount?, price?}]}
        #[arg(long)]
        portfolio: PathBuf,
        /// JSON file with {prices, marketCap, volume24h}; reference data when omitted
        #[arg(long)]
        market: Option<PathBuf>,
    },
}

/// Portfolio file: a ready snapshot, or wallet holdings still to be valued.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum PortfolioInput {
    Snapshot(PortfolioSnapshot),
    Wallet { balance: f64, #[serde(default)] tokens: Vec<WalletToken> },
}

const DEFAULT_SOL_PRICE: f64 = 150.0;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BoxError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// CLI inputs -> request. Wallet holdings are valued at the market's SOL
/// price; reference market data stands in when none was given.
fn build_request(
    kind: &str,
    portfolio: PortfolioInput,
    market: Option<MarketSnapshot>,
) -> Result<AnalysisRequest, BoxError> {
    let kind = AnalysisKind::parse(kind)
        .ok_or("Invalid analysis type. Must be one of: portfolio, market, trading")?;
    let market = market.unwrap_or_else(MarketSnapshot::reference);
    let portfolio = match portfolio {
        PortfolioInput::Snapshot(p) => p,
        PortfolioInput::Wallet { balance, tokens } => {
            // harga SOL kasar dari market snapshot (dashboard pakai 150)
            let sol_price = market.prices.get("SOL").copied().unwrap_or(DEFAULT_SOL_PRICE);
            PortfolioSnapshot::from_holdings(balance, &tokens, sol_price)
        }
    };
    Ok(AnalysisRequest::new(kind, portfolio, Some(market))?)
}

async fn run_once(
    gateway: &AnalysisGateway,
    kind: &str,
    portfolio: &Path,
    market: Option<&Path>,
) -> Result<(), BoxError> {
    let market = market.map(read_json::<MarketSnapshot>).transpose()?;
    let request = build_request(kind, read_json(portfolio)?, market)?;

    let analysis = gateway.analyze(&request).await;
    info!(source = analysis.source.as_str(), "one-shot analysis finished");
    println!("{}", serde_json::to_string_pretty(&analysis.report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config (API key wajib) ----
    let cli = Cli::parse();
    let mut args = match config::load() {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "config error");
            return Err(e.into());
        }
    };
    if let Some(listen) = &cli.listen {
        args.listen_addr = listen
            .parse()
            .map_err(|_| config::ConfigError::InvalidListenAddr(listen.clone()))?;
    }

    // ---- Metrics ----
    metrics::init();
    metrics::CONFIG_QUOTA_REQUESTS.set(args.quota_requests as i64);
    metrics::CONFIG_QUOTA_WINDOW_MS.set(args.quota_window.as_millis() as i64);
    metrics::CONFIG_MODEL.with_label_values(&[args.model.as_str()]).set(1);

    info!(
        endpoint = %args.api_url,
        model = %args.model,
        quota_requests = args.quota_requests,
        quota_window_ms = args.quota_window.as_millis() as u64,
        upstream_timeout_ms = args.upstream_timeout.as_millis() as u64,
        quota_wait_timeout_ms = args.quota_wait_timeout.as_millis() as u64,
        listen = %args.listen_addr,
        record_file = ?args.record_file,
        tag_source = args.tag_source,
        "startup config"
    );

    // ---- Quota gate + LLM client (dibuat sekali, dibagi ke semua request) ----
    let quota = Arc::new(QuotaGate::new(args.quota_requests, args.quota_window));
    let client = ChatClient::new(args.api_url.clone(), args.api_key.clone(), args.model.clone(), args.upstream_timeout)?;
    let mut gateway = AnalysisGateway::new(quota.clone(), client, args.quota_wait_timeout);

    // ---- Recorder (optional) ----
    let mut journal = None;
    if let Some(path) = args.record_file.clone() {
        let (rec_tx, task) = recorder::spawn(path);
        recorder::record(&rec_tx, Event::Note(format!("startup model={}", args.model)));
        gateway = gateway.with_journal(rec_tx);
        journal = Some(task);
    }

    if let Some(Command::Analyze { kind, portfolio, market }) = &cli.command {
        let res = run_once(&gateway, kind, portfolio, market.as_deref()).await;
        // gateway memegang sender terakhir; lepas dulu supaya recorder bisa flush
        drop(gateway);
        if let Some(task) = journal {
            recorder::finish(task).await;
        }
        return res;
    }

    // ---- HTTP ----
    let state = Arc::new(server::AppState { gateway, tag_source: args.tag_source });
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, shutting down");
    };
    let http = server::serve(args.listen_addr, state, shutdown);
    tokio::pin!(http);

    // ---- Heartbeat ----
    let mut heartbeat = tokio::time::interval(Duration::from_secs(30));
    let res = loop {
        select! {
            res = &mut http => break res,
            _ = heartbeat.tick() => {
                match quota.in_window() {
                    Some(n) => {
                        metrics::QUOTA_IN_WINDOW.set(n as i64);
                        info!(
                            in_window = n,
                            limit = quota.max_requests(),
                            window_ms = quota.window().as_millis() as u64,
                            "heartbeat"
                        );
                    }
                    None => info!(limit = quota.max_requests(), "heartbeat (quota saturated, callers waiting)"),
                }
            }
        }
    };

    // server selesai -> state (dan sender journal) sudah dilepas
    if let Some(task) = journal {
        recorder::finish(task).await;
    }
    if let Err(e) = res {
        error!(?e, "http server stopped");
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenHolding;

    fn wallet_input() -> PortfolioInput {
        serde_json::from_str(r#"{"balance":2,"tokens":[{"symbol":"RAY","amount":10,"price":1.5},{"amount":3}]}"#)
            .unwrap()
    }

    #[test]
    fn test_snapshot_file_is_used_as_is() {
        let input: PortfolioInput = serde_json::from_str(
            r#"{"balance":1,"tokens":[{"symbol":"RAY","amount":10,"value":12}],"totalValue":162}"#,
        )
        .unwrap();
        let req = build_request("portfolio", input, None).unwrap();
        assert_eq!(req.kind(), AnalysisKind::Portfolio);
        assert_eq!(
            req.portfolio().tokens,
            vec![TokenHolding { symbol: "RAY".into(), amount: 10.0, value: 12.0 }]
        );
        assert_eq!(req.portfolio().total_value, 162.0);
    }

    #[test]
    fn test_wallet_file_is_valued_at_market_sol_price() {
        let mut market = MarketSnapshot::reference();
        market.prices.insert("SOL".into(), 200.0);
        let req = build_request("trading", wallet_input(), Some(market)).unwrap();
        let p = req.portfolio();
        assert_eq!(p.tokens.len(), 2);
        assert_eq!(p.tokens[0].value, 15.0);
        assert_eq!(p.tokens[1].symbol, "UNKNOWN");
        assert_eq!(p.total_value, 2.0 * 200.0 + 15.0);
    }

    #[test]
    fn test_wallet_without_sol_price_uses_default() {
        let req = build_request("portfolio", wallet_input(), Some(MarketSnapshot::default())).unwrap();
        assert_eq!(req.portfolio().total_value, 2.0 * DEFAULT_SOL_PRICE + 15.0);
    }

    #[test]
    fn test_omitted_market_uses_reference_data() {
        match build_request("market", wallet_input(), None).unwrap() {
            AnalysisRequest::Market { market, .. } => assert_eq!(market, MarketSnapshot::reference()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_bad_kind_is_rejected() {
        let err = build_request("yolo", wallet_input(), None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid analysis type. Must be one of: portfolio, market, trading");
    }

    #[test]
    fn test_read_json_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.json");
        std::fs::write(&path, r#"{"prices":{"SOL":99},"marketCap":{},"volume24h":{}}"#).unwrap();
        let m: MarketSnapshot = read_json(&path).unwrap();
        assert_eq!(m.prices.get("SOL"), Some(&99.0));
        assert!(read_json::<MarketSnapshot>(&dir.path().join("missing.json")).is_err());
    }
}
