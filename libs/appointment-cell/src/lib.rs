pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export the booking models and services for external use
pub use models::*;
pub use services::*;
