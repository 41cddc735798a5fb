//! Scenario tests spanning the orchestrator, backends and collaborators.

mod ingest;
mod support;
