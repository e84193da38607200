// ===============================
// src/schema.rs
// ===============================
//
// Parse + validate teks balasan model menjadi hasil bertipe.
// Tipe & enum dijaga serde; rentang skor dicek di sini.
//
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{MarketInsights, PortfolioAnalysis, TradingPlan};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("reply is not the expected JSON shape: {0}")]
    Malformed(String),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

pub trait Validate {
    fn validate(&self) -> Result<(), SchemaError>;
}

fn score(field: &'static str, value: u8) -> Result<(), SchemaError> {
    if value > 100 {
        return Err(SchemaError::OutOfRange { field, value: value as u64 });
    }
    Ok(())
}

impl Validate for PortfolioAnalysis {
    fn validate(&self) -> Result<(), SchemaError> {
        score("riskScore", self.risk_score)?;
        score("diversificationScore", self.diversification_score)
    }
}

impl Validate for MarketInsights {
    fn validate(&self) -> Result<(), SchemaError> {
        score("confidence", self.confidence)
    }
}

impl Validate for TradingPlan {
    fn validate(&self) -> Result<(), SchemaError> { Ok(()) }
}

/// Models like to wrap JSON in ```json fences; take what is inside.
fn strip_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else { return t };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_reply<T: DeserializeOwned + Validate>(text: &str) -> Result<T, SchemaError> {
    let value: T = serde_json::from_str(strip_fence(text)).map_err(|e| SchemaError::Malformed(e.to_string()))?;
    value.validate()?;
    Ok(value)
}
