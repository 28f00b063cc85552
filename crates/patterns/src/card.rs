use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardPaymentType {
    Credit,
    Debit,
}

impl std::fmt::Display for CardPaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardPaymentType::Credit => write!(f, "Credit"),
            CardPaymentType::Debit => write!(f, "Debit"),
        }
    }
}

impl std::str::FromStr for CardPaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" => Ok(CardPaymentType::Credit),
            "debit" => Ok(CardPaymentType::Debit),
            other => Err(format!("Unknown card payment type: '{other}'")),
        }
    }
}

/// Where a confirmation came from, kept for audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationContext {
    pub receipt_id: Option<String>,
    pub vendor: Option<String>,
    pub amount_cents: Option<i64>,
}

/// What we know about one card, keyed by its last four digits.
///
/// Callers must treat a missing mapping as "no opinion", never as "debit by
/// default".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardPaymentTypeMapping {
    pub last_four: String,
    pub payment_type: CardPaymentType,
    pub confidence: f32,
    pub times_confirmed: u32,
    pub last_context: ConfirmationContext,
    pub updated_at: DateTime<Utc>,
}

impl CardPaymentTypeMapping {
    pub fn first_confirmation(
        last_four: &str,
        payment_type: CardPaymentType,
        context: ConfirmationContext,
        config: &LearningConfig,
    ) -> Self {
        Self {
            last_four: last_four.to_string(),
            payment_type,
            confidence: config.card_initial_confidence,
            times_confirmed: 1,
            last_context: context,
            updated_at: Utc::now(),
        }
    }

    /// Apply a user confirmation. Same value again: reinforce, capped at 1.0.
    /// Contradiction: overwrite and reset to the (lower) reset baseline with
    /// the confirmation count starting over.
    pub fn confirm(
        &mut self,
        payment_type: CardPaymentType,
        context: ConfirmationContext,
        config: &LearningConfig,
    ) {
        if self.payment_type == payment_type {
            self.times_confirmed += 1;
            self.confidence = (self.confidence + config.card_reinforce_step).min(1.0);
        } else {
            self.payment_type = payment_type;
            self.times_confirmed = 1;
            self.confidence = config.card_reset_confidence;
        }
        self.last_context = context;
        self.updated_at = Utc::now();
    }
}
