pub mod card;
pub mod category;
pub mod config;
pub mod correction;
pub mod payment;
pub mod recorder;
pub mod store;
pub mod vendor;

pub use card::{CardPaymentType, CardPaymentTypeMapping, ConfirmationContext};
pub use category::{tokenize, CategoryPattern};
pub use config::LearningConfig;
pub use correction::{fields, CategorizationCorrection, FieldChange};
pub use payment::PaymentPattern;
pub use recorder::record_edit;
pub use store::{PatternStore, StoreStats};
pub use vendor::{normalize_vendor, VendorPattern};
