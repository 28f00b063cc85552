use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tally_core::FinalizedTransaction;

/// Field names used in the correction change map. String keys rather than an
/// enum so the log can absorb fields added later without a schema migration.
pub mod fields {
    pub const TRANSACTION_TYPE: &str = "transaction_type";
    pub const CATEGORY: &str = "category";
    pub const PAYMENT_METHOD: &str = "payment_method";
    pub const INCOME_SOURCE: &str = "income_source";
    pub const VENDOR: &str = "vendor";
    pub const DESCRIPTION: &str = "description";
    pub const AMOUNT: &str = "amount";
    pub const DATE: &str = "date";
    pub const NOTES: &str = "notes";
}

/// One field's before/after values, both rendered as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Immutable record of one user edit — the sole input to the learning loop
/// and the source of truth from which the pattern store is derived. The full
/// store must be reconstructible by replaying these from empty state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorizationCorrection {
    pub id: Uuid,
    pub transaction_id: i64,
    pub timestamp: DateTime<Utc>,
    pub vendor: String,
    pub amount_cents: i64,
    /// `BTreeMap` for stable serialization order.
    pub changes: BTreeMap<String, FieldChange>,
    pub notes: Option<String>,
    /// True when the edit touched type, category, payment method, or income
    /// source. Incidental edits (date, notes) are logged but not learned from.
    pub is_categorization_correction: bool,
}

impl CategorizationCorrection {
    /// Diff two snapshots of the same transaction. Returns `None` when
    /// nothing changed.
    pub fn from_edit(
        before: &FinalizedTransaction,
        after: &FinalizedTransaction,
    ) -> Option<Self> {
        let mut changes: BTreeMap<String, FieldChange> = BTreeMap::new();

        let mut push = |field: &str, from: Option<String>, to: Option<String>| {
            if from != to {
                changes.insert(field.to_string(), FieldChange { from, to });
            }
        };

        push(
            fields::TRANSACTION_TYPE,
            Some(before.transaction_type.to_string()),
            Some(after.transaction_type.to_string()),
        );
        push(
            fields::CATEGORY,
            Some(before.category.clone()),
            Some(after.category.clone()),
        );
        push(
            fields::PAYMENT_METHOD,
            before.payment_method.as_ref().map(|m| m.to_string()),
            after.payment_method.as_ref().map(|m| m.to_string()),
        );
        push(
            fields::INCOME_SOURCE,
            before.income_source.clone(),
            after.income_source.clone(),
        );
        push(
            fields::VENDOR,
            Some(before.vendor.clone()),
            Some(after.vendor.clone()),
        );
        push(
            fields::DESCRIPTION,
            Some(before.description.clone()),
            Some(after.description.clone()),
        );
        push(
            fields::AMOUNT,
            Some(before.amount_cents.to_string()),
            Some(after.amount_cents.to_string()),
        );
        push(
            fields::DATE,
            Some(before.date.to_string()),
            Some(after.date.to_string()),
        );
        push(fields::NOTES, before.notes.clone(), after.notes.clone());

        if changes.is_empty() {
            return None;
        }

        let is_categorization_correction = [
            fields::TRANSACTION_TYPE,
            fields::CATEGORY,
            fields::PAYMENT_METHOD,
            fields::INCOME_SOURCE,
        ]
        .iter()
        .any(|f| changes.contains_key(*f));

        Some(Self {
            id: Uuid::new_v4(),
            transaction_id: after.id,
            timestamp: Utc::now(),
            vendor: after.vendor.clone(),
            amount_cents: after.amount_cents,
            changes,
            notes: after.notes.clone(),
            is_categorization_correction,
        })
    }

    pub fn change(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// The post-edit value of a field, when the edit touched it.
    pub fn new_value(&self, field: &str) -> Option<&str> {
        self.changes.get(field).and_then(|c| c.to.as_deref())
    }

    /// The pre-edit value of a field, when the edit touched it.
    pub fn old_value(&self, field: &str) -> Option<&str> {
        self.changes.get(field).and_then(|c| c.from.as_deref())
    }
}
