//! The category taxonomy the engine decides over.
//!
//! Categories are stored as lowercase strings rather than an enum because the
//! learning loop must be able to absorb user-defined categories it has never
//! seen before. The constants below are the Schedule C buckets the decision
//! rules emit; user corrections may introduce anything else.

/// Income categories recognized by the invariant check: a result with
/// `TransactionType::Income` must carry one of these.
pub const INCOME_CATEGORIES: &[&str] = &[
    "gross receipts",
    "returns and allowances",
    "other income",
    "interest income",
];

/// Expense categories the deterministic rules emit. Not exhaustive — learned
/// vendor patterns may carry any category string.
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "car and truck expenses",
    "repairs and maintenance",
    "meals",
    "supplies",
    "office expense",
    "other expenses",
];

pub const DEFAULT_INCOME_CATEGORY: &str = "gross receipts";
pub const DEFAULT_EXPENSE_CATEGORY: &str = "other expenses";

// Canonical names used by the decision rules.
pub const CAR_AND_TRUCK: &str = "car and truck expenses";
pub const REPAIRS_AND_MAINTENANCE: &str = "repairs and maintenance";
pub const MEALS: &str = "meals";
pub const SUPPLIES: &str = "supplies";
pub const OFFICE_EXPENSE: &str = "office expense";

/// Case-insensitive membership test against the recognized income set.
pub fn is_income_category(category: &str) -> bool {
    let c = category.trim().to_lowercase();
    INCOME_CATEGORIES.contains(&c.as_str())
}
