use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Generic card when debit/credit cannot be distinguished.
    Card,
    Credit,
    Debit,
    Cash,
    Check,
    Deposit,
    Other(String),
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Credit => write!(f, "Credit"),
            PaymentMethod::Debit => write!(f, "Debit"),
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Check => write!(f, "Check"),
            PaymentMethod::Deposit => write!(f, "Deposit"),
            PaymentMethod::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = std::convert::Infallible;

    /// Parsing never fails — unrecognized strings become `Other`, so callers
    /// can feed user- or OCR-supplied text straight through.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "card" => PaymentMethod::Card,
            "credit" | "credit card" => PaymentMethod::Credit,
            "debit" | "debit card" => PaymentMethod::Debit,
            "cash" => PaymentMethod::Cash,
            "check" | "cheque" => PaymentMethod::Check,
            "deposit" => PaymentMethod::Deposit,
            _ => PaymentMethod::Other(s.trim().to_string()),
        })
    }
}
