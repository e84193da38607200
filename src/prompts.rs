// ===============================
// src/prompts.rs
// ===============================
//
// Prompt per jenis analisis: satu pesan system (schema output + arahan domain)
// dan satu pesan user (snapshot dalam bentuk teks).
//
use indexmap::IndexMap;

use crate::domain::{AnalysisRequest, MarketSnapshot, PortfolioSnapshot};
use crate::llm::ChatMessage;

const PORTFOLIO_SYSTEM: &str = r#"You are a professional Solana DeFi portfolio analyst. Analyze the provided portfolio data and provide:
1. Risk score (0-100, where 100 is highest risk)
2. Risk level (Low/Medium/High)
3. Diversification score (0-100, where 100 is perfectly diversified)
4. 3-5 specific recommendations
5. A brief summary

Focus on Solana ecosystem tokens and DeFi best practices. Be concise and actionable.

Respond in this exact JSON format:
{
  "riskScore": number,
  "riskLevel": "Low" | "Medium" | "High",
  "diversificationScore": number,
  "recommendations": ["recommendation1", "recommendation2", ...],
  "summary": "brief analysis summary"
}"#;

const MARKET_SYSTEM: &str = r#"You are a Solana ecosystem market analyst. Analyze market data and provide:
1. Overall trend (Bullish/Bearish/Neutral)
2. Confidence level (0-100)
3. 3-5 market insights
4. Top 3 opportunities in Solana ecosystem

Focus on actionable insights for Solana investors.

Respond in this exact JSON format:
{
  "trend": "Bullish" | "Bearish" | "Neutral",
  "confidence": number,
  "insights": ["insight1", "insight2", ...],
  "topOpportunities": ["opportunity1", "opportunity2", "opportunity3"]
}"#;

const TRADING_SYSTEM: &str = r#"You are a Solana DeFi trading advisor. Based on portfolio and market data, provide:
1. 3-5 trading recommendations with actions (Buy/Sell/Hold)
2. Overall trading strategy

Consider risk management, diversification, and Solana ecosystem trends.

Respond in this exact JSON format:
{
  "recommendations": [
    {
      "action": "Buy" | "Sell" | "Hold",
      "token": "token_symbol",
      "reasoning": "explanation",
      "priority": "High" | "Medium" | "Low"
    }
  ],
  "strategy": "overall strategy description"
}"#;

pub fn build(req: &AnalysisRequest) -> Vec<ChatMessage> {
    match req {
        AnalysisRequest::Portfolio(p) => vec![
            ChatMessage::system(PORTFOLIO_SYSTEM),
            ChatMessage::user(portfolio_text(p)),
        ],
        AnalysisRequest::Market { market, .. } => vec![
            ChatMessage::system(MARKET_SYSTEM),
            ChatMessage::user(market_text(market)),
        ],
        AnalysisRequest::Trading { portfolio, market } => vec![
            ChatMessage::system(TRADING_SYSTEM),
            ChatMessage::user(trading_text(portfolio, market)),
        ],
    }
}

fn portfolio_text(p: &PortfolioSnapshot) -> String {
    let tokens = if p.tokens.is_empty() {
        "None".to_string()
    } else {
        p.tokens
            .iter()
            .map(|t| format!("{}: {} (${:.2})", t.symbol, t.amount, t.value))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Analyze this Solana portfolio:\n- SOL Balance: {} SOL\n- Total Portfolio Value: ${:.2}\n- Tokens: {}\n- Token Count: {}",
        p.balance,
        p.total_value,
        tokens,
        p.tokens.len()
    )
}

fn market_text(m: &MarketSnapshot) -> String {
    format!(
        "Analyze this Solana market data:\n- Token Prices: {}\n- Market Caps: {}\n- 24h Volumes: {}",
        dollar_list(&m.prices, |v| v.to_string()),
        dollar_list(&m.market_cap, group_thousands),
        dollar_list(&m.volume_24h, group_thousands),
    )
}

fn trading_text(p: &PortfolioSnapshot, m: &MarketSnapshot) -> String {
    let tokens = p
        .tokens
        .iter()
        .map(|t| format!("{}: {}", t.symbol, t.amount))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Provide trading recommendations for this portfolio:\nPortfolio: SOL: {}, Tokens: {}\nMarket: {}",
        p.balance,
        tokens,
        dollar_list(&m.prices, |v| v.to_string()),
    )
}

fn dollar_list(map: &IndexMap<String, f64>, fmt_value: impl Fn(f64) -> String) -> String {
    map.iter()
        .map(|(sym, v)| format!("{sym}: ${}", fmt_value(*v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 65000000000 -> "65,000,000,000"; keeps up to 3 fraction digits.
fn group_thousands(v: f64) -> String {
    let neg = v < 0.0;
    let rounded = (v.abs() * 1_000.0).round() / 1_000.0;
    let int_part = rounded.trunc() as u128;
    let frac = rounded - rounded.trunc();

    let digits = int_part.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if frac > 0.0 {
        let f = format!("{frac:.3}");
        out.push_str(f.trim_start_matches('0').trim_end_matches('0'));
    }
    if neg { format!("-{out}") } else { out }
}
