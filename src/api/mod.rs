//! The API layer, containing web handlers and routing.

pub mod buffered;
pub mod handlers;
pub mod retry;
pub mod router;

pub use buffered::BufferedResponse;
pub use handlers::{ApiDoc, PaymentNotification};
pub use retry::{TransactionalHandler, run_with_retry};
pub use router::create_router;
