pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ApplyReport, ConfigError};
pub use schema::{EngineConfig, EventBinding, QueryConfig, ValidationError, ValidationIssue};
