mod coordinator;
mod error;
mod subscriptions;

pub use coordinator::{AnalysisOutcome, RequestCoordinator};
pub use error::AnalysisError;
pub use subscriptions::{ConfigSubscriptionStore, SubscriptionStore};
