pub mod config;
pub mod dataset;
pub mod enroll;
pub mod error;
pub mod evaluate;
pub mod gallery;
pub mod matcher;
pub mod recognize;

pub use error::{Error, Result};
pub use gallery::{EmbeddingRecord, Gallery};
pub use matcher::{MatchResult, Matcher, UNKNOWN};

// Re-export vision types for convenience
pub use facegallery_vision::{
    BoundingBox, Detection, Embedder, Embedding, ManifestEmbedder, SourceImage,
};
