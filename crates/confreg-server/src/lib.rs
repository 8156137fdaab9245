// Confreg server - HTTP surface for the versioned configuration registry

// Module declarations
pub mod api; // API handlers and routes
pub mod error; // HTTP error mapping
pub mod metrics; // Metrics and observability
pub mod middleware; // Admission control and request metrics
pub mod model; // Application state, configuration and responses
pub mod startup; // Logging, server and shutdown setup

pub use error::{AppError, AppResult};
pub use model::{AppConfiguration, AppState};
