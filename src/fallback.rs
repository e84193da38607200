// ===============================
// src/fallback.rs
// ===============================
//
// Hasil offline yang deterministik, bentuknya sama dengan balasan model.
//
use crate::domain::{
    AnalysisReport, AnalysisRequest, MarketInsights, PortfolioAnalysis, PortfolioSnapshot, Priority,
    RiskLevel, TradeAction, TradeIdea, TradingPlan, Trend,
};

pub fn for_request(req: &AnalysisRequest) -> AnalysisReport {
    match req {
        AnalysisRequest::Portfolio(p) => AnalysisReport::Portfolio(portfolio(p)),
        AnalysisRequest::Market { .. } => AnalysisReport::Market(market()),
        AnalysisRequest::Trading { .. } => AnalysisReport::Trading(trading()),
    }
}

pub fn portfolio(p: &PortfolioSnapshot) -> PortfolioAnalysis {
    let n = p.tokens.len();
    let (risk_score, risk_level) = match n {
        0 => (100, RiskLevel::High),
        1 | 2 => (70, RiskLevel::Medium),
        _ => (40, RiskLevel::Low),
    };
    PortfolioAnalysis {
        risk_score,
        risk_level,
        diversification_score: n.saturating_mul(20).min(100) as u8,
        recommendations: vec![
            "Consider diversifying across different Solana projects".to_string(),
            "Add stablecoins like USDC for risk management".to_string(),
            "Research top Solana DeFi protocols for yield opportunities".to_string(),
        ],
        summary: "Portfolio analysis temporarily unavailable. Consider diversifying your holdings.".to_string(),
    }
}

pub fn market() -> MarketInsights {
    MarketInsights {
        trend: Trend::Neutral,
        confidence: 50,
        insights: vec![
            "Market analysis temporarily unavailable".to_string(),
            "Consider dollar-cost averaging for long-term positions".to_string(),
            "Monitor Solana network developments".to_string(),
        ],
        top_opportunities: vec![
            "Research high-TVL Solana DeFi protocols".to_string(),
            "Consider liquid staking options".to_string(),
            "Explore NFT opportunities on Solana".to_string(),
        ],
    }
}

pub fn trading() -> TradingPlan {
    TradingPlan {
        recommendations: vec![TradeIdea {
            action: TradeAction::Hold,
            token: "SOL".to_string(),
            reasoning: "Maintain SOL position as network utility token".to_string(),
            priority: Priority::Medium,
        }],
        strategy: "Trading recommendations temporarily unavailable. Consider holding current positions and researching Solana ecosystem developments.".to_string(),
    }
}
