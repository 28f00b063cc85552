use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::payment::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Income => write!(f, "income"),
            TransactionType::Expense => write!(f, "expense"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub amount_cents: Option<i64>,
}

/// The transaction as the categorization engine first sees it: the structured
/// output of the OCR/extraction collaborator plus whatever the bank feed or
/// manual entry supplied. This is the only OCR-derived data the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCandidate {
    pub description: String,
    pub vendor: String,
    pub amount_cents: i64,
    pub line_items: Vec<LineItem>,
    /// Payment method string as reported by the extraction layer, verbatim.
    pub ocr_payment_method: Option<String>,
}

impl TransactionCandidate {
    pub fn new(description: &str, vendor: &str, amount_cents: i64) -> Self {
        Self {
            description: description.to_string(),
            vendor: vendor.to_string(),
            amount_cents,
            line_items: Vec::new(),
            ocr_payment_method: None,
        }
    }

    /// Lowercased description + vendor + line items, the haystack for the
    /// category indicator families.
    pub fn combined_text(&self) -> String {
        let mut text = String::with_capacity(self.description.len() + self.vendor.len() + 16);
        text.push_str(&self.description);
        text.push(' ');
        text.push_str(&self.vendor);
        for item in &self.line_items {
            text.push(' ');
            text.push_str(&item.description);
        }
        text.to_lowercase()
    }

    /// Lowercased vendor + description only. The deposit indicator scans this
    /// narrower text so a line item mentioning "deposit" (e.g. a bottle
    /// deposit) does not flip the whole transaction to income.
    pub fn header_text(&self) -> String {
        format!("{} {}", self.vendor, self.description).to_lowercase()
    }
}

/// A transaction after the user has reviewed or saved it. Corrections are
/// computed by diffing two of these snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalizedTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub vendor: String,
    pub description: String,
    pub amount_cents: i64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: Option<PaymentMethod>,
    pub income_source: Option<String>,
    pub notes: Option<String>,
}
