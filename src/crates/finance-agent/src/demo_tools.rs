//! A small set of offline demo tools.
//!
//! Concrete vendor bindings (market-data APIs, filing databases, web
//! search) are out of scope for this engine (spec §6: "the specific
//! vendor bindings are external"). These tools exist so the binary has
//! something to register and exercise DATA steps against without a
//! network call or a credential.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use finance_graph::tool::{ParamSpec, ParamType, Tool, ToolCategory, ToolError};

/// Returns a fixed quote for a small catalog of tickers, `None` for
/// anything else rather than a real lookup failure.
pub struct CurrentPriceTool {
    catalog: HashMap<&'static str, f64>,
}

impl Default for CurrentPriceTool {
    fn default() -> Self {
        let catalog = [
            ("AAPL", 189.25),
            ("MSFT", 417.10),
            ("AMZN", 178.40),
            ("GOOGL", 152.80),
        ]
        .into_iter()
        .collect();
        CurrentPriceTool { catalog }
    }
}

#[async_trait]
impl Tool for CurrentPriceTool {
    fn name(&self) -> &str {
        "get_current_price"
    }

    fn description(&self) -> &str {
        "current market price for a ticker"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::MarketQuotes
    }

    fn parameter_schema(&self) -> &[ParamSpec] {
        static SCHEMA: std::sync::OnceLock<Vec<ParamSpec>> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| vec![ParamSpec::required("ticker", ParamType::String, "ticker symbol")])
    }

    async fn invoke(&self, parameters: HashMap<String, Value>) -> Result<Value, ToolError> {
        let ticker = parameters
            .get("ticker")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::MissingRequired {
                tool: self.name().to_string(),
                parameter: "ticker".to_string(),
            })?;

        match self.catalog.get(ticker) {
            Some(price) => Ok(json!({ "ticker": ticker, "price": price, "currency": "USD" })),
            None => Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("no quote available for '{}'", ticker),
            }),
        }
    }
}

/// A handful of daily closes, most recent last. Same fixed catalog as
/// [`CurrentPriceTool`]; tickers outside it fail rather than fabricate data.
pub struct HistoricalPricesTool {
    catalog: HashMap<&'static str, Vec<f64>>,
}

impl Default for HistoricalPricesTool {
    fn default() -> Self {
        let catalog = [
            ("AAPL", vec![182.10, 184.40, 186.90, 188.00, 189.25]),
            ("MSFT", vec![402.50, 408.00, 411.75, 415.20, 417.10]),
        ]
        .into_iter()
        .collect();
        HistoricalPricesTool { catalog }
    }
}

#[async_trait]
impl Tool for HistoricalPricesTool {
    fn name(&self) -> &str {
        "get_historical_prices"
    }

    fn description(&self) -> &str {
        "recent daily closing prices for a ticker"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::HistoricalPrices
    }

    fn parameter_schema(&self) -> &[ParamSpec] {
        static SCHEMA: std::sync::OnceLock<Vec<ParamSpec>> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            vec![
                ParamSpec::required("ticker", ParamType::String, "ticker symbol"),
                ParamSpec::optional("days", ParamType::Integer, json!(5), "number of trailing closes"),
            ]
        })
    }

    async fn invoke(&self, parameters: HashMap<String, Value>) -> Result<Value, ToolError> {
        let ticker = parameters
            .get("ticker")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::MissingRequired {
                tool: self.name().to_string(),
                parameter: "ticker".to_string(),
            })?;
        let days = parameters.get("days").and_then(Value::as_u64).unwrap_or(5) as usize;

        match self.catalog.get(ticker) {
            Some(closes) => {
                let take = days.min(closes.len());
                let recent = &closes[closes.len() - take..];
                Ok(json!({ "ticker": ticker, "closes": recent }))
            }
            None => Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("no history available for '{}'", ticker),
            }),
        }
    }
}

/// A single canned headline per ticker, standing in for a news/web-search
/// vendor binding.
pub struct CompanyNewsTool {
    catalog: HashMap<&'static str, &'static str>,
}

impl Default for CompanyNewsTool {
    fn default() -> Self {
        let catalog = [
            ("AAPL", "Apple announces new product lineup ahead of holiday quarter"),
            ("MSFT", "Microsoft reports strong cloud segment growth"),
        ]
        .into_iter()
        .collect();
        CompanyNewsTool { catalog }
    }
}

#[async_trait]
impl Tool for CompanyNewsTool {
    fn name(&self) -> &str {
        "get_company_news"
    }

    fn description(&self) -> &str {
        "most recent headline for a ticker"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CompanyNews
    }

    fn parameter_schema(&self) -> &[ParamSpec] {
        static SCHEMA: std::sync::OnceLock<Vec<ParamSpec>> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| vec![ParamSpec::required("ticker", ParamType::String, "ticker symbol")])
    }

    async fn invoke(&self, parameters: HashMap<String, Value>) -> Result<Value, ToolError> {
        let ticker = parameters
            .get("ticker")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::MissingRequired {
                tool: self.name().to_string(),
                parameter: "ticker".to_string(),
            })?;

        match self.catalog.get(ticker) {
            Some(headline) => Ok(json!({ "ticker": ticker, "headline": headline })),
            None => Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("no news available for '{}'", ticker),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_price_known_ticker() {
        let tool = CurrentPriceTool::default();
        let mut params = HashMap::new();
        params.insert("ticker".to_string(), json!("AAPL"));
        let result = tool.invoke(params).await.unwrap();
        assert_eq!(result["ticker"], json!("AAPL"));
    }

    #[tokio::test]
    async fn current_price_unknown_ticker_fails() {
        let tool = CurrentPriceTool::default();
        let mut params = HashMap::new();
        params.insert("ticker".to_string(), json!("ZZZZ"));
        let err = tool.invoke(params).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn historical_prices_respects_days() {
        let tool = HistoricalPricesTool::default();
        let mut params = HashMap::new();
        params.insert("ticker".to_string(), json!("AAPL"));
        params.insert("days".to_string(), json!(2));
        let result = tool.invoke(params).await.unwrap();
        assert_eq!(result["closes"].as_array().unwrap().len(), 2);
    }
}
