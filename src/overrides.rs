use crate::classifier::default_inflow_for_category;
use crate::schema::{
    AccountClassification, ClassificationSource, ConceptColumn, ConceptColumnType, DataRange,
    LineItemType, MappedPeriodColumn, MatrixMapping, PeriodDefinition,
};
use crate::utils::normalize_text;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reviewer edits collected in the confirmation step, applied in order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct MappingOverrides {
    #[serde(default)]
    pub modifications: Vec<MappingModification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MappingModification {
    /// Add (or re-add) a period column the detector missed or scored low.
    SelectPeriod {
        column_index: usize,
        label: String,
        #[serde(default)]
        definition: Option<PeriodDefinition>,
    },

    /// Exclude a period. Its label is remembered so it never reaches output.
    VoidPeriod { label: String },

    /// Correct a period label, e.g. "Ene-24" -> "Jan 2024".
    RelabelPeriod { label: String, new_label: String },

    /// Override the category of an account. Polarity defaults from the
    /// category when not given.
    SetCategory {
        account_name: String,
        category: String,
        #[serde(default)]
        subcategory: Option<String>,
        #[serde(default)]
        is_inflow: Option<bool>,
    },

    /// Flag an account as detail, subtotal, total or calculated.
    SetLineItemType {
        account_name: String,
        line_item_type: LineItemType,
    },

    /// Declare or retype a concept column.
    SetConceptColumn {
        column_index: usize,
        column_type: ConceptColumnType,
    },

    SetDataRange { start_row: usize, end_row: usize },
}

impl MappingOverrides {
    /// Applies the overrides to a base mapping, returning a new mapping.
    /// The base mapping is left untouched.
    pub fn apply(&self, base: &MatrixMapping) -> MatrixMapping {
        let mut mapping = base.clone();
        for modification in &self.modifications {
            apply_single_modification(&mut mapping, modification);
        }
        mapping
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MappingOverrides)
    }
}

fn same_label(a: &str, b: &str) -> bool {
    normalize_text(a) == normalize_text(b)
}

fn apply_single_modification(mapping: &mut MatrixMapping, modification: &MappingModification) {
    debug!("Applying mapping override: {:?}", modification);

    match modification {
        MappingModification::SelectPeriod {
            column_index,
            label,
            definition,
        } => {
            mapping.voided_periods.retain(|v| !same_label(v, label));
            mapping
                .period_columns
                .retain(|p| p.column_index != *column_index);
            mapping.period_columns.push(MappedPeriodColumn {
                column_index: *column_index,
                period_label: label.clone(),
                definition: definition.clone(),
            });
            mapping.period_columns.sort_by_key(|p| p.column_index);
        }

        MappingModification::VoidPeriod { label } => {
            if !mapping.is_voided(label) {
                mapping.voided_periods.push(label.clone());
            }
        }

        MappingModification::RelabelPeriod { label, new_label } => {
            if let Some(column) = mapping
                .period_columns
                .iter_mut()
                .find(|p| same_label(&p.period_label, label))
            {
                column.period_label = new_label.clone();
            }
        }

        MappingModification::SetCategory {
            account_name,
            category,
            subcategory,
            is_inflow,
        } => {
            let is_inflow = is_inflow.unwrap_or_else(|| default_inflow_for_category(category));
            let entry = find_or_insert_classification(mapping, account_name, category);
            entry.category = category.clone();
            entry.subcategory = subcategory.clone();
            entry.is_inflow = is_inflow;
            entry.confidence = 100;
            entry.reasoning = Some("Set by reviewer".to_string());
        }

        MappingModification::SetLineItemType {
            account_name,
            line_item_type,
        } => {
            if let Some(entry) = mapping
                .account_classifications
                .iter_mut()
                .find(|c| c.matches_account(account_name))
            {
                entry.line_item_type = Some(*line_item_type);
            } else {
                debug!(
                    "No classification for '{}'; line item type override ignored",
                    account_name
                );
            }
        }

        MappingModification::SetConceptColumn {
            column_index,
            column_type,
        } => {
            mapping
                .concept_columns
                .retain(|c| c.column_index != *column_index);
            mapping.concept_columns.push(ConceptColumn {
                column_index: *column_index,
                column_type: *column_type,
            });
            mapping.concept_columns.sort_by_key(|c| c.column_index);
            mapping
                .period_columns
                .retain(|p| p.column_index != *column_index);
        }

        MappingModification::SetDataRange { start_row, end_row } => {
            mapping.data_range = DataRange {
                start_row: *start_row,
                end_row: *end_row,
            };
        }
    }
}

fn find_or_insert_classification<'a>(
    mapping: &'a mut MatrixMapping,
    account_name: &str,
    category: &str,
) -> &'a mut AccountClassification {
    let position = mapping
        .account_classifications
        .iter()
        .position(|c| c.matches_account(account_name));

    let index = match position {
        Some(index) => index,
        None => {
            mapping.account_classifications.push(AccountClassification {
                account_name: account_name.to_string(),
                category: category.to_string(),
                subcategory: None,
                confidence: 100,
                is_inflow: default_inflow_for_category(category),
                source: ClassificationSource::External,
                reasoning: None,
                line_item_type: None,
            });
            mapping.account_classifications.len() - 1
        }
    };

    &mut mapping.account_classifications[index]
}
