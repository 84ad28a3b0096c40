pub mod classifier;
pub mod enrichment;
pub mod handlers;
pub mod matcher;
pub mod orchestrator;
pub mod persistence;
pub mod validation;

pub use classifier::{classify, Classification, OrderKind};
pub use orchestrator::{OrderOrchestrator, ProcessingStage};
pub use persistence::InvoicePersistence;
pub use validation::{OrderTypeAllowList, ValidationOutcome};
