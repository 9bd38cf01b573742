// Public modules
pub mod chat_request;
pub mod message;
pub mod model;
pub mod validation_status;

// Re-exports
pub use chat_request::ChatRequest;
pub use message::{Message, Role};
pub use model::{KnownModel, Model};
pub use validation_status::ValidationStatus;
