use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentComponentKind {
    MarketMomentum,
    Volatility,
    SafeHavenDemand,
    JunkBondDemand,
    PortfolioBreadth,
}

impl SentimentComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            SentimentComponentKind::MarketMomentum => "Market momentum",
            SentimentComponentKind::Volatility => "Volatility",
            SentimentComponentKind::SafeHavenDemand => "Safe-haven demand",
            SentimentComponentKind::JunkBondDemand => "Junk-bond demand",
            SentimentComponentKind::PortfolioBreadth => "Portfolio breadth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            SentimentLabel::ExtremeFear
        } else if score < 45.0 {
            SentimentLabel::Fear
        } else if score <= 55.0 {
            SentimentLabel::Neutral
        } else if score <= 75.0 {
            SentimentLabel::Greed
        } else {
            SentimentLabel::ExtremeGreed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::ExtremeFear => "Extreme Fear",
            SentimentLabel::Fear => "Fear",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Greed => "Greed",
            SentimentLabel::ExtremeGreed => "Extreme Greed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentComponent {
    pub kind: SentimentComponentKind,
    /// Indicator value before scaling
    pub raw: f64,
    /// 0-100, higher is greedier
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub as_of: String,
    pub score: f64,
    pub label: SentimentLabel,
    pub components: Vec<SentimentComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentHistoryPoint {
    pub date: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_bands() {
        assert_eq!(SentimentLabel::from_score(10.0), SentimentLabel::ExtremeFear);
        assert_eq!(SentimentLabel::from_score(25.0), SentimentLabel::Fear);
        assert_eq!(SentimentLabel::from_score(45.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(55.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(70.0), SentimentLabel::Greed);
        assert_eq!(SentimentLabel::from_score(75.1), SentimentLabel::ExtremeGreed);
    }
}
