//! Keyword-rule account classification with a numeric-sign fallback.
//!
//! Rules are plain data evaluated top-down; the first rule with a keyword
//! found in the account name wins. English and Spanish terms live side by
//! side in the same rule. More specific rules (multi-word phrases, cost of
//! sales) come before broad ones so that "Costo de Ventas" is not read as
//! revenue.

use crate::config::{EngineConfig, KeywordRule, SignFallbackPolicy};
use crate::schema::{AccountClassification, ClassificationSource, StatementType};
use crate::utils::{contains_term, normalize_text};
use log::debug;

pub const KEYWORD_PHRASE_CONFIDENCE: u8 = 95;
pub const KEYWORD_TERM_CONFIDENCE: u8 = 90;
pub const SIGN_FALLBACK_CONFIDENCE: u8 = 60;
pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const DEFAULT_CATEGORY: &str = "other";

/// Built-in rule row: (keywords, category, subcategory, is_inflow, confidence).
type RuleRow = (
    &'static [&'static str],
    &'static str,
    Option<&'static str>,
    bool,
    u8,
);

const PROFIT_LOSS_RULES: &[RuleRow] = &[
    (
        &[
            "cost of goods sold",
            "cost of sales",
            "cost of revenue",
            "costo de ventas",
            "costo de venta",
            "costos de ventas",
            "costo de lo vendido",
            "mano de obra directa",
            "materia prima",
            "direct labor",
            "raw materials",
        ],
        "cogs",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &["cogs", "cmv", "costos", "costo"],
        "cogs",
        None,
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "income tax",
            "tax expense",
            "impuesto sobre la renta",
            "impuesto a la renta",
            "impuestos a las ganancias",
        ],
        "taxes",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &["taxes", "tax", "impuestos", "impuesto", "isr"],
        "taxes",
        None,
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "interest expense",
            "financial expense",
            "gastos financieros",
            "intereses pagados",
            "bank charges",
            "comisiones bancarias",
        ],
        "other_expenses",
        Some("financial"),
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "other expenses",
            "otros gastos",
            "otros egresos",
            "non-operating expense",
        ],
        "other_expenses",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "other income",
            "otros ingresos",
            "interest income",
            "ingresos financieros",
            "intereses ganados",
            "non-operating income",
        ],
        "other_income",
        None,
        true,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &["depreciation", "amortization", "depreciacion", "amortizacion"],
        "opex",
        Some("depreciation"),
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "salaries",
            "salary",
            "wages",
            "payroll",
            "sueldos",
            "salarios",
            "nomina",
            "cargas sociales",
        ],
        "opex",
        Some("payroll"),
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &["rent", "lease", "alquiler", "alquileres", "arriendo", "renta de local"],
        "opex",
        Some("rent"),
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &["marketing", "advertising", "publicidad", "mercadeo", "promocion"],
        "opex",
        Some("marketing"),
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "operating expenses",
            "operating expense",
            "gastos operativos",
            "gastos operacionales",
            "gastos de operacion",
            "general & administrative",
            "general and administrative",
            "gastos de administracion",
            "gastos administrativos",
            "research & development",
            "research and development",
        ],
        "opex",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "administrative",
            "administracion",
            "utilities",
            "insurance",
            "seguros",
            "honorarios",
            "professional fees",
            "software",
            "travel",
            "viaticos",
            "gastos",
            "expenses",
            "expense",
            "opex",
        ],
        "opex",
        None,
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "sales revenue",
            "net sales",
            "ventas netas",
            "servicios prestados",
            "ingresos operacionales",
            "ingresos por ventas",
        ],
        "revenue",
        None,
        true,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "revenue",
            "revenues",
            "sales",
            "turnover",
            "ventas",
            "venta",
            "ingresos",
            "ingreso",
            "facturacion",
        ],
        "revenue",
        None,
        true,
        KEYWORD_TERM_CONFIDENCE,
    ),
];

const CASH_FLOW_RULES: &[RuleRow] = &[
    (
        &[
            "beginning balance",
            "opening balance",
            "ending balance",
            "closing balance",
            "lowest balance",
            "saldo inicial",
            "saldo final",
            "saldo minimo",
            "saldo",
        ],
        "cash_balance",
        None,
        true,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &["net cash flow", "flujo neto", "net change in cash"],
        "net_cash_flow",
        None,
        true,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &["taxes", "tax", "impuestos", "impuesto", "isr", "iva"],
        "taxes",
        None,
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "loan proceeds",
            "prestamo recibido",
            "prestamos recibidos",
            "capital contribution",
            "aporte de capital",
            "aportes de socios",
        ],
        "financing_inflows",
        None,
        true,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "loan repayment",
            "pago de prestamo",
            "pago de prestamos",
            "dividends",
            "dividendos",
            "intereses pagados",
            "interest paid",
        ],
        "financing_outflows",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "capex",
            "capital expenditure",
            "purchase of equipment",
            "compra de activos",
            "compra de equipo",
            "inversiones",
        ],
        "investing_outflows",
        None,
        false,
        KEYWORD_PHRASE_CONFIDENCE,
    ),
    (
        &[
            "suppliers",
            "proveedores",
            "payroll",
            "salaries",
            "sueldos",
            "salarios",
            "rent",
            "alquiler",
            "gastos",
            "egresos",
            "expenses",
            "payments",
            "pagos",
        ],
        "operating_outflows",
        None,
        false,
        KEYWORD_TERM_CONFIDENCE,
    ),
    (
        &[
            "otros ingresos",
            "other income",
            "cobros",
            "collections",
            "receipts",
            "ventas",
            "sales",
            "ingresos",
            "income",
        ],
        "operating_inflows",
        None,
        true,
        KEYWORD_TERM_CONFIDENCE,
    ),
];

fn builtin_rules(statement_type: StatementType) -> Vec<KeywordRule> {
    let rows = match statement_type {
        StatementType::ProfitLoss => PROFIT_LOSS_RULES,
        StatementType::CashFlow => CASH_FLOW_RULES,
    };

    rows.iter()
        .map(
            |(keywords, category, subcategory, is_inflow, confidence)| KeywordRule {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                category: category.to_string(),
                subcategory: subcategory.map(str::to_string),
                is_inflow: *is_inflow,
                confidence: *confidence,
                statement_type: Some(statement_type),
            },
        )
        .collect()
}

/// Inflow polarity implied by a category when nothing else says otherwise.
pub fn default_inflow_for_category(category: &str) -> bool {
    let category = normalize_text(category);
    const OUTFLOW_MARKERS: &[&str] = &[
        "cogs",
        "cost",
        "opex",
        "expense",
        "expenses",
        "outflow",
        "outflows",
        "tax",
        "taxes",
        "gasto",
        "gastos",
        "egreso",
        "egresos",
    ];

    !category
        .split(|c: char| !c.is_alphanumeric())
        .any(|part| OUTFLOW_MARKERS.contains(&part))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationContext {
    pub statement_type: StatementType,
}

impl ClassificationContext {
    pub fn new(statement_type: StatementType) -> Self {
        Self { statement_type }
    }
}

/// A compiled rule with its keywords already normalized.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: KeywordRule,
    normalized_keywords: Vec<String>,
}

impl CompiledRule {
    fn new(rule: KeywordRule) -> Self {
        let normalized_keywords = rule
            .keywords
            .iter()
            .map(|k| normalize_text(k))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            rule,
            normalized_keywords,
        }
    }

    fn applies_to(&self, statement_type: StatementType) -> bool {
        self.rule
            .statement_type
            .map_or(true, |t| t == statement_type)
    }

    fn first_match(&self, normalized_name: &str) -> Option<&str> {
        self.normalized_keywords
            .iter()
            .find(|k| contains_term(normalized_name, k))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct AccountClassifier {
    profit_loss_rules: Vec<CompiledRule>,
    cash_flow_rules: Vec<CompiledRule>,
    sign_fallback: SignFallbackPolicy,
}

impl Default for AccountClassifier {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl AccountClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        let compile = |statement_type: StatementType| -> Vec<CompiledRule> {
            config
                .extra_rules
                .iter()
                .cloned()
                .chain(builtin_rules(statement_type))
                .map(CompiledRule::new)
                .filter(|r| r.applies_to(statement_type))
                .collect()
        };

        Self {
            profit_loss_rules: compile(StatementType::ProfitLoss),
            cash_flow_rules: compile(StatementType::CashFlow),
            sign_fallback: config.sign_fallback.clone(),
        }
    }

    fn rules_for(&self, statement_type: StatementType) -> &[CompiledRule] {
        match statement_type {
            StatementType::ProfitLoss => &self.profit_loss_rules,
            StatementType::CashFlow => &self.cash_flow_rules,
        }
    }

    /// Classifies one account. Never fails: with no keyword hit and no usable
    /// amount the result is `other` / inflow / 50.
    pub fn classify(
        &self,
        account_name: &str,
        first_period_value: Option<f64>,
        context: &ClassificationContext,
    ) -> AccountClassification {
        let normalized = normalize_text(account_name);

        for compiled in self.rules_for(context.statement_type) {
            if let Some(keyword) = compiled.first_match(&normalized) {
                debug!(
                    "Account '{}' matched keyword '{}' -> {}",
                    account_name, keyword, compiled.rule.category
                );
                return AccountClassification {
                    account_name: account_name.to_string(),
                    category: compiled.rule.category.clone(),
                    subcategory: compiled.rule.subcategory.clone(),
                    confidence: compiled.rule.confidence.min(100),
                    is_inflow: compiled.rule.is_inflow,
                    source: ClassificationSource::Local,
                    reasoning: Some(format!(
                        "Matched keyword '{}' for category {}",
                        keyword, compiled.rule.category
                    )),
                    line_item_type: None,
                };
            }
        }

        let fallback = self.sign_fallback.for_statement(context.statement_type);
        match first_period_value.filter(|v| v.is_finite() && *v != 0.0) {
            Some(value) => {
                let positive = value > 0.0;
                let category = if positive {
                    &fallback.positive_category
                } else {
                    &fallback.negative_category
                };
                debug!(
                    "Account '{}' classified by sign of {} -> {}",
                    account_name, value, category
                );
                AccountClassification {
                    account_name: account_name.to_string(),
                    category: category.clone(),
                    subcategory: None,
                    confidence: SIGN_FALLBACK_CONFIDENCE,
                    is_inflow: positive,
                    source: ClassificationSource::Local,
                    reasoning: Some(format!(
                        "No keyword matched; {} first amount suggests {}",
                        if positive { "positive" } else { "negative" },
                        if positive { "an inflow" } else { "an outflow" }
                    )),
                    line_item_type: None,
                }
            }
            None => AccountClassification {
                account_name: account_name.to_string(),
                category: DEFAULT_CATEGORY.to_string(),
                subcategory: None,
                confidence: DEFAULT_CONFIDENCE,
                is_inflow: true,
                source: ClassificationSource::Local,
                reasoning: Some("No keyword or numeric signal".to_string()),
                line_item_type: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pnl() -> ClassificationContext {
        ClassificationContext::new(StatementType::ProfitLoss)
    }

    fn cash() -> ClassificationContext {
        ClassificationContext::new(StatementType::CashFlow)
    }

    #[test]
    fn test_spanish_revenue_keyword() {
        let classifier = AccountClassifier::default();
        let result = classifier.classify("Ventas", None, &pnl());
        assert_eq!(result.category, "revenue");
        assert!(result.is_inflow);
        assert!(result.confidence >= 90);
        assert_eq!(result.source, ClassificationSource::Local);
    }

    #[test]
    fn test_cost_of_sales_beats_revenue() {
        let classifier = AccountClassifier::default();
        for name in ["Costo de Ventas", "Cost of Goods Sold", "COSTO DE VENTAS", "Materia Prima"] {
            let result = classifier.classify(name, Some(500.0), &pnl());
            assert_eq!(result.category, "cogs", "{}", name);
            assert!(!result.is_inflow);
            assert_eq!(result.confidence, 95);
        }
    }

    #[test]
    fn test_profit_loss_categories() {
        let classifier = AccountClassifier::default();
        let cases = [
            ("Revenue", "revenue", true),
            ("Sales & Marketing", "opex", false),
            ("General & Administrative", "opex", false),
            ("Sueldos y Cargas", "opex", false),
            ("Depreciation & Amortization", "opex", false),
            ("Interest Expense", "other_expenses", false),
            ("Tax Expense", "taxes", false),
            ("Impuestos", "taxes", false),
            ("Otros Ingresos", "other_income", true),
            ("Servicios Prestados", "revenue", true),
            ("Administración", "opex", false),
        ];

        for (name, category, inflow) in cases {
            let result = classifier.classify(name, None, &pnl());
            assert_eq!(result.category, category, "{}", name);
            assert_eq!(result.is_inflow, inflow, "{}", name);
        }
    }

    #[test]
    fn test_cash_flow_categories() {
        let classifier = AccountClassifier::default();
        let cases = [
            ("Ventas Contado", "operating_inflows", true),
            ("Cobros a Crédito", "operating_inflows", true),
            ("Proveedores", "operating_outflows", false),
            ("Gastos Operativos", "operating_outflows", false),
            ("Impuestos", "taxes", false),
            ("SALDO INICIAL", "cash_balance", true),
            ("Saldo Mínimo", "cash_balance", true),
            ("FLUJO NETO DEL MES", "net_cash_flow", true),
            ("Total Income", "operating_inflows", true),
            ("Total Expenses", "operating_outflows", false),
        ];

        for (name, category, inflow) in cases {
            let result = classifier.classify(name, None, &cash());
            assert_eq!(result.category, category, "{}", name);
            assert_eq!(result.is_inflow, inflow, "{}", name);
        }
    }

    #[test]
    fn test_numeric_sign_fallback() {
        let classifier = AccountClassifier::default();

        let positive = classifier.classify("Misc adjustment", Some(1200.0), &pnl());
        assert_eq!(positive.category, "other_income");
        assert!(positive.is_inflow);
        assert_eq!(positive.confidence, 60);

        let negative = classifier.classify("Misc adjustment", Some(-80.0), &pnl());
        assert_eq!(negative.category, "other_expenses");
        assert!(!negative.is_inflow);

        let cash_negative = classifier.classify("Misc adjustment", Some(-80.0), &cash());
        assert_eq!(cash_negative.category, "operating_outflows");
    }

    #[test]
    fn test_no_signal_default() {
        let classifier = AccountClassifier::default();
        for value in [None, Some(0.0), Some(f64::NAN)] {
            let result = classifier.classify("Zzyzx", value, &pnl());
            assert_eq!(result.category, "other");
            assert!(result.is_inflow);
            assert_eq!(result.confidence, 50);
        }
    }

    #[test]
    fn test_extra_rules_take_precedence() {
        let config = EngineConfig {
            extra_rules: vec![KeywordRule {
                keywords: vec!["Ventas".to_string()],
                category: "opex".to_string(),
                subcategory: Some("selling".to_string()),
                is_inflow: false,
                confidence: 92,
                statement_type: Some(StatementType::ProfitLoss),
            }],
            ..EngineConfig::default()
        };
        let classifier = AccountClassifier::new(&config);

        let result = classifier.classify("Gastos de Ventas", None, &pnl());
        assert_eq!(result.category, "opex");
        assert_eq!(result.subcategory.as_deref(), Some("selling"));
        assert_eq!(result.confidence, 92);

        // Scoped to P&L only.
        let cash_result = classifier.classify("Ventas", None, &cash());
        assert_eq!(cash_result.category, "operating_inflows");
    }

    #[test]
    fn test_configurable_sign_fallback() {
        let mut config = EngineConfig::default();
        config.sign_fallback.profit_loss.positive_category = "revenue".to_string();
        let classifier = AccountClassifier::new(&config);

        let result = classifier.classify("Unlabelled", Some(10.0), &pnl());
        assert_eq!(result.category, "revenue");
    }

    #[test]
    fn test_default_inflow_for_category() {
        assert!(default_inflow_for_category("revenue"));
        assert!(default_inflow_for_category("other_income"));
        assert!(default_inflow_for_category("other"));
        assert!(default_inflow_for_category("operating_inflows"));
        assert!(!default_inflow_for_category("cogs"));
        assert!(!default_inflow_for_category("opex"));
        assert!(!default_inflow_for_category("other_expenses"));
        assert!(!default_inflow_for_category("operating_outflows"));
        assert!(!default_inflow_for_category("taxes"));
    }
}
