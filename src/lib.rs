// Library target: everything the binary wires together, exposed for integration tests.
pub mod analysis;
pub mod app;
pub mod backend;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod server;
pub mod timeexpr;
pub mod tools;

// Re-export commonly used types for tests
pub use analysis::{AlertDetail, AnalysisRequest, AnalysisResult};
pub use app::AppContext;
pub use backend::{Monitor, MonitorState, MonitoringBackend, Priority};
pub use error::{BackendError, ToolError};
pub use tools::{ToolResponse, call_tool};
