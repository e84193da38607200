// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---- Snapshots (input) ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding { pub symbol: String, pub amount: f64, pub value: f64 }

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot { pub balance: f64, pub tokens: Vec<TokenHolding>, pub total_value: f64 }

/// Raw wallet token as the dashboard store keeps it (symbol/price may be unknown).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletToken { pub symbol: Option<String>, pub amount: Option<f64>, pub price: Option<f64> }

impl PortfolioSnapshot {
    /// Build the snapshot the way the dashboard does: value = amount * price,
    /// total = SOL balance at `sol_price` plus every token value.
    pub fn from_holdings(balance: f64, holdings: &[WalletToken], sol_price: f64) -> Self {
        let tokens: Vec<TokenHolding> = holdings
            .iter()
            .map(|t| {
                let amount = t.amount.unwrap_or(0.0);
                TokenHolding {
                    symbol: t.symbol.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
                    amount,
                    value: amount * t.price.unwrap_or(0.0),
                }
            })
            .collect();
        let total_value = balance * sol_price + tokens.iter().map(|t| t.value).sum::<f64>();
        Self { balance, tokens, total_value }
    }
}

/// Per-symbol maps keep the order they arrived in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub prices: IndexMap<String, f64>,
    pub market_cap: IndexMap<String, f64>,
    #[serde(rename = "volume24h")]
    pub volume_24h: IndexMap<String, f64>,
}

impl MarketSnapshot {
    /// Static market data the dashboard ships with (no market feed yet).
    pub fn reference() -> Self {
        let rows: [(&str, f64, f64, f64); 4] = [
            ("SOL", 150.0, 65_000_000_000.0, 2_500_000_000.0),
            ("USDC", 1.0, 25_000_000_000.0, 8_000_000_000.0),
            ("RAY", 1.2, 180_000_000.0, 45_000_000.0),
            ("SRM", 0.8, 65_000_000.0, 12_000_000.0),
        ];
        let mut snap = Self::default();
        for (sym, px, cap, vol) in rows {
            snap.prices.insert(sym.to_string(), px);
            snap.market_cap.insert(sym.to_string(), cap);
            snap.volume_24h.insert(sym.to_string(), vol);
        }
        snap
    }
}

// ---- Analysis kind & request ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind { Portfolio, Market, Trading }

impl AnalysisKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "portfolio" => Some(AnalysisKind::Portfolio),
            "market" => Some(AnalysisKind::Market),
            "trading" => Some(AnalysisKind::Trading),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Portfolio => "portfolio",
            AnalysisKind::Market => "market",
            AnalysisKind::Trading => "trading",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One analysis job. Market and trading kinds carry their market snapshot,
/// so a request without the data it needs cannot be built.
#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    Portfolio(PortfolioSnapshot),
    Market { portfolio: PortfolioSnapshot, market: MarketSnapshot },
    Trading { portfolio: PortfolioSnapshot, market: MarketSnapshot },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Market data is required for market analysis")]
    MissingMarketForInsights,
    #[error("Market data is required for trading recommendations")]
    MissingMarketForTrading,
}

impl RequestError {
    /// The error a request of `kind` gets when it arrives without market data.
    pub fn missing_market(kind: AnalysisKind) -> Option<Self> {
        match kind {
            AnalysisKind::Portfolio => None,
            AnalysisKind::Market => Some(RequestError::MissingMarketForInsights),
            AnalysisKind::Trading => Some(RequestError::MissingMarketForTrading),
        }
    }
}

impl AnalysisRequest {
    pub fn new(
        kind: AnalysisKind,
        portfolio: PortfolioSnapshot,
        market: Option<MarketSnapshot>,
    ) -> Result<Self, RequestError> {
        match (kind, market) {
            (AnalysisKind::Portfolio, _) => Ok(AnalysisRequest::Portfolio(portfolio)),
            (AnalysisKind::Market, Some(market)) => Ok(AnalysisRequest::Market { portfolio, market }),
            (AnalysisKind::Trading, Some(market)) => Ok(AnalysisRequest::Trading { portfolio, market }),
            (AnalysisKind::Market, None) => Err(RequestError::MissingMarketForInsights),
            (AnalysisKind::Trading, None) => Err(RequestError::MissingMarketForTrading),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisRequest::Portfolio(_) => AnalysisKind::Portfolio,
            AnalysisRequest::Market { .. } => AnalysisKind::Market,
            AnalysisRequest::Trading { .. } => AnalysisKind::Trading,
        }
    }

    pub fn portfolio(&self) -> &PortfolioSnapshot {
        match self {
            AnalysisRequest::Portfolio(p) => p,
            AnalysisRequest::Market { portfolio, .. } | AnalysisRequest::Trading { portfolio, .. } => portfolio,
        }
    }
}

// ---- Results (output) ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel { Low, Medium, High }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend { Bullish, Bearish, Neutral }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction { Buy, Sell, Hold }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority { High, Medium, Low }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalysis {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub diversification_score: u8,
    pub recommendations: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInsights {
    pub trend: Trend,
    pub confidence: u8,
    pub insights: Vec<String>,
    pub top_opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIdea { pub action: TradeAction, pub token: String, pub reasoning: String, pub priority: Priority }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPlan { pub recommendations: Vec<TradeIdea>, pub strategy: String }

/// Whatever the gateway hands back; serialized without a discriminator so the
/// body matches the per-kind shape exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisReport {
    Portfolio(PortfolioAnalysis),
    Market(MarketInsights),
    Trading(TradingPlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source { Model, Fallback }

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self { Source::Model => "model", Source::Fallback => "fallback" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis { pub report: AnalysisReport, pub source: Source }

// ---- Journal events ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub ts: DateTime<Utc>,
    pub kind: AnalysisKind,
    pub source: Source,
    pub reason: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { Analysis(AnalysisEvent), Note(String) }
