use crate::schema::{LineItemRecord, LineItemType, StatementType};
use crate::utils::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    pub code: String,
    pub category: String,
    pub is_inflow: bool,
    pub line_item_type: LineItemType,
}

/// Review summary of the distinct accounts found in an upload, grouped by
/// category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub company_id: String,
    pub statement_type: StatementType,
    pub categories: BTreeMap<String, Vec<AccountEntry>>,
}

impl ChartOfAccounts {
    /// Accounts repeated across periods or rows are listed once, keeping the
    /// first occurrence in display order.
    pub fn from_line_items(
        company_id: &str,
        statement_type: StatementType,
        line_items: &[LineItemRecord],
    ) -> Self {
        let mut ordered: Vec<&LineItemRecord> = line_items.iter().collect();
        ordered.sort_by_key(|item| item.display_order);

        let mut categories: BTreeMap<String, Vec<AccountEntry>> = BTreeMap::new();
        let mut seen = Vec::new();

        for item in ordered {
            let key = normalize_text(&item.account_name);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            categories
                .entry(item.category.clone())
                .or_default()
                .push(AccountEntry {
                    name: item.account_name.clone(),
                    code: item.account_code.clone(),
                    category: item.category.clone(),
                    is_inflow: item.is_inflow,
                    line_item_type: item.line_item_type,
                });
        }

        Self {
            company_id: company_id.to_string(),
            statement_type,
            categories,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Category,Account Code,Account Name,Is Inflow,Line Item Type\n");

        for (category, accounts) in &self.categories {
            for account in accounts {
                output.push_str(&format!(
                    "{},{},{},{},{:?}\n",
                    category,
                    account.code,
                    csv_field(&account.name),
                    account.is_inflow,
                    account.line_item_type
                ));
            }
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Chart of Accounts - {}\n\n", self.company_id));
        output.push_str(&format!("**Statement:** {}\n\n", self.statement_type));

        for (category, accounts) in &self.categories {
            output.push_str(&format!("## {}\n\n", category));
            for account in accounts {
                let direction = if account.is_inflow { "inflow" } else { "outflow" };
                let marker = match account.line_item_type {
                    LineItemType::Detail => "",
                    LineItemType::Subtotal => " **[SUBTOTAL]**",
                    LineItemType::Total => " **[TOTAL]**",
                    LineItemType::Calculated => " **[CALCULATED]**",
                };
                output.push_str(&format!(
                    "- {} `{}` ({}){}\n",
                    account.name, account.code, direction, marker
                ));
            }
            output.push('\n');
        }

        output
    }

    pub fn total_accounts(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn find(&self, account_name: &str) -> Option<&AccountEntry> {
        let wanted = normalize_text(account_name);
        self.categories
            .values()
            .flatten()
            .find(|a| normalize_text(&a.name) == wanted)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ClassificationSource;

    fn item(order: usize, name: &str, category: &str, is_inflow: bool) -> LineItemRecord {
        LineItemRecord {
            account_code: format!("ROW-{:04}", order),
            account_name: name.to_string(),
            category: category.to_string(),
            subcategory: None,
            is_inflow,
            line_item_type: LineItemType::Detail,
            parent_section: None,
            periods: BTreeMap::new(),
            display_order: order,
            confidence_score: 0.9,
            classification_source: ClassificationSource::Local,
            classification_agreement: true,
        }
    }

    fn sample() -> Vec<LineItemRecord> {
        let mut total = item(4, "Total Gastos", "opex", false);
        total.line_item_type = LineItemType::Total;
        vec![
            item(1, "Ventas", "revenue", true),
            item(2, "Sueldos y Salarios", "opex", false),
            item(3, "Renta, oficina", "opex", false),
            total,
            item(5, "ventas", "revenue", true),
        ]
    }

    #[test]
    fn test_chart_groups_by_category() {
        let chart = ChartOfAccounts::from_line_items("acme", StatementType::ProfitLoss, &sample());

        assert_eq!(chart.total_accounts(), 4);
        assert_eq!(chart.categories["opex"].len(), 3);
        assert_eq!(chart.categories["revenue"].len(), 1);
        assert_eq!(chart.find("VENTAS").unwrap().code, "ROW-0001");
        assert!(chart.find("Utilidad").is_none());
    }

    #[test]
    fn test_chart_to_csv() {
        let chart = ChartOfAccounts::from_line_items("acme", StatementType::ProfitLoss, &sample());
        let csv = chart.to_csv();

        assert!(csv.starts_with("Category,Account Code,Account Name"));
        assert!(csv.contains("revenue,ROW-0001,Ventas,true,Detail"));
        assert!(csv.contains("\"Renta, oficina\""));
    }

    #[test]
    fn test_chart_to_markdown() {
        let chart = ChartOfAccounts::from_line_items("acme", StatementType::CashFlow, &sample());
        let markdown = chart.to_markdown();

        assert!(markdown.contains("# Chart of Accounts - acme"));
        assert!(markdown.contains("**Statement:** cash_flow"));
        assert!(markdown.contains("## opex"));
        assert!(markdown.contains("[TOTAL]"));
    }

    #[test]
    fn test_chart_to_json() {
        let chart = ChartOfAccounts::from_line_items("acme", StatementType::ProfitLoss, &sample());
        let json = chart.to_json().unwrap();
        assert!(json.contains("\"statement_type\": \"profit_loss\""));
    }
}
