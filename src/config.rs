use crate::error::{MappingError, Result};
use crate::schema::StatementType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Categories used when an account matches no keyword and only the sign of
/// its first amount is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignFallback {
    pub positive_category: String,
    pub negative_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignFallbackPolicy {
    pub profit_loss: SignFallback,
    pub cash_flow: SignFallback,
}

impl SignFallbackPolicy {
    pub fn for_statement(&self, statement_type: StatementType) -> &SignFallback {
        match statement_type {
            StatementType::ProfitLoss => &self.profit_loss,
            StatementType::CashFlow => &self.cash_flow,
        }
    }
}

impl Default for SignFallbackPolicy {
    fn default() -> Self {
        Self {
            profit_loss: SignFallback {
                positive_category: "other_income".to_string(),
                negative_category: "other_expenses".to_string(),
            },
            cash_flow: SignFallback {
                positive_category: "operating_inflows".to_string(),
                negative_category: "operating_outflows".to_string(),
            },
        }
    }
}

/// A user-supplied keyword rule, evaluated before the built-in tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeywordRule {
    #[schemars(description = "Terms matched at word starts, case and accent insensitive")]
    pub keywords: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub is_inflow: bool,
    pub confidence: u8,
    #[serde(default)]
    #[schemars(description = "Restricts the rule to one statement type; applies to both when omitted")]
    pub statement_type: Option<StatementType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of leading rows searched for the period header.
    pub max_scan_rows: usize,
    /// Periods at or above this confidence are pre-selected for review.
    pub auto_select_threshold: u8,
    /// Labels (or label prefixes/words) that mark aggregate columns.
    pub excluded_period_labels: Vec<String>,
    pub default_currency: String,
    pub sign_fallback: SignFallbackPolicy,
    pub extra_rules: Vec<KeywordRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_scan_rows: 10,
            auto_select_threshold: 80,
            excluded_period_labels: vec!["total".to_string(), "ytd".to_string()],
            default_currency: "USD".to_string(),
            sign_fallback: SignFallbackPolicy::default(),
            extra_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_scan_rows == 0 {
            return Err(MappingError::InvalidConfig(
                "max_scan_rows must be at least 1".to_string(),
            ));
        }

        if self.auto_select_threshold > 100 {
            return Err(MappingError::InvalidConfig(format!(
                "auto_select_threshold {} exceeds 100",
                self.auto_select_threshold
            )));
        }

        if self.default_currency.trim().is_empty() {
            return Err(MappingError::InvalidConfig(
                "default_currency must not be empty".to_string(),
            ));
        }

        for (idx, rule) in self.extra_rules.iter().enumerate() {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(MappingError::InvalidConfig(format!(
                    "Rule #{} has no keywords",
                    idx
                )));
            }
            if rule.confidence > 100 {
                return Err(MappingError::InvalidConfig(format!(
                    "Rule #{} confidence {} exceeds 100",
                    idx, rule.confidence
                )));
            }
        }

        Ok(())
    }
}
