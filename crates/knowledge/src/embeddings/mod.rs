//! Embedding providers.
//!
//! Text goes in, a fixed-length `f32` vector comes out. The provider decides
//! the dimensionality `D` that the storage backend is then created with.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};
