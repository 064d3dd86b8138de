use crate::classifier::default_inflow_for_category;
use crate::schema::{AccountClassification, ClassificationSource, ExternalClassification};
use crate::utils::{clamp_confidence, normalize_text};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// No external classification was available.
    LocalOnly,
    /// Both sources name compatible categories.
    Agreement,
    /// The external category won but differs from the local one.
    Disagreement,
}

/// The classification to use plus everything needed to audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledClassification {
    pub resolved: AccountClassification,
    pub local: AccountClassification,
    pub external: Option<AccountClassification>,
    pub outcome: ReconciliationOutcome,
}

impl ReconciledClassification {
    pub fn source(&self) -> ClassificationSource {
        self.resolved.source
    }

    /// False only when both sources exist and their categories conflict.
    pub fn agrees(&self) -> bool {
        self.outcome != ReconciliationOutcome::Disagreement
    }

    pub fn warning(&self) -> Option<String> {
        let external = self.external.as_ref()?;
        (self.outcome == ReconciliationOutcome::Disagreement).then(|| {
            format!(
                "Account '{}': external category '{}' overrides local '{}' ({}% local confidence)",
                self.resolved.account_name,
                external.category,
                self.local.category,
                self.local.confidence
            )
        })
    }
}

/// Case-insensitive containment in either direction counts as agreement, so
/// "revenue" and "Operating Revenue" agree.
pub fn categories_agree(a: &str, b: &str) -> bool {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    a.contains(&b) || b.contains(&a)
}

/// Converts the external service payload into an [`AccountClassification`].
/// A missing polarity is derived from the category.
pub fn external_to_classification(external: &ExternalClassification) -> AccountClassification {
    let category = external.suggested_category.trim().to_string();
    AccountClassification {
        account_name: external.account_name.clone(),
        is_inflow: external
            .is_inflow
            .unwrap_or_else(|| default_inflow_for_category(&category)),
        category,
        subcategory: external.suggested_subcategory.clone(),
        confidence: clamp_confidence(external.confidence),
        source: ClassificationSource::External,
        reasoning: external.reasoning.clone(),
        line_item_type: external.line_item_type,
    }
}

/// Looks up the external classification for an account by normalized name.
pub fn find_external<'a>(
    account_name: &str,
    externals: &'a [AccountClassification],
) -> Option<&'a AccountClassification> {
    let needle = normalize_text(account_name);
    externals
        .iter()
        .find(|c| normalize_text(&c.account_name) == needle)
}

/// Merges the local heuristic result with an optional external one. The
/// external result is authoritative for category and polarity; the local
/// result is always retained. Disagreement is reported, never fatal.
pub fn reconcile(
    local: AccountClassification,
    external: Option<&AccountClassification>,
) -> ReconciledClassification {
    let Some(external) = external else {
        return ReconciledClassification {
            resolved: local.clone(),
            local,
            external: None,
            outcome: ReconciliationOutcome::LocalOnly,
        };
    };

    let outcome = if categories_agree(&local.category, &external.category) {
        ReconciliationOutcome::Agreement
    } else {
        ReconciliationOutcome::Disagreement
    };

    let mut resolved = external.clone();
    resolved.account_name = local.account_name.clone();
    resolved.source = ClassificationSource::External;
    if resolved.reasoning.is_none() {
        resolved.reasoning = local.reasoning.clone();
    }

    let reconciled = ReconciledClassification {
        resolved,
        local,
        external: Some(external.clone()),
        outcome,
    };

    if let Some(message) = reconciled.warning() {
        warn!("{}", message);
    }

    reconciled
}
