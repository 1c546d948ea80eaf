use serde::{Deserialize, Serialize};

/// On-disk portfolio file: `{"portfolio": {"stocks": [...]}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub portfolio: PortfolioSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSection {
    #[serde(default)]
    pub stocks: Vec<String>,
}

impl PortfolioConfig {
    pub fn stocks(&self) -> &[String] {
        &self.portfolio.stocks
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.portfolio.stocks.iter().any(|t| t == ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shape() {
        let json = serde_json::to_value(PortfolioConfig::default()).unwrap();
        assert_eq!(json, serde_json::json!({"portfolio": {"stocks": []}}));
    }
}
