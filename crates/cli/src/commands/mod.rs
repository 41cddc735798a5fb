//! Command handlers for the ragvault CLI.
//!
//! Each command builds a `RagSystem` from the merged configuration, runs
//! one operation and shuts the system down again.

pub mod delete;
pub mod ingest;
pub mod query;
pub mod sources;
pub mod status;

pub use delete::DeleteCommand;
pub use ingest::IngestCommand;
pub use query::QueryCommand;
pub use sources::SourcesCommand;
pub use status::StatusCommand;
