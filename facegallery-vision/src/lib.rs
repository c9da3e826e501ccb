pub mod embedder;
pub mod face;
pub mod manifest;

// Re-export commonly used types
pub use embedder::{Embedder, SourceImage};
pub use face::{BoundingBox, Detection, Embedding};
pub use manifest::ManifestEmbedder;
