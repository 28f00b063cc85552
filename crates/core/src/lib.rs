pub mod category;
pub mod payment;
pub mod result;
pub mod transaction;

pub use category::{
    is_income_category, DEFAULT_EXPENSE_CATEGORY, DEFAULT_INCOME_CATEGORY, EXPENSE_CATEGORIES,
    INCOME_CATEGORIES,
};
pub use payment::PaymentMethod;
pub use result::CategorizationResult;
pub use transaction::{FinalizedTransaction, LineItem, TransactionCandidate, TransactionType};
