use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::face::Detection;

/// A decoded image together with where it came from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl SourceImage {
    /// Decode an image file. Fails for unreadable or corrupt files.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    pub fn new(path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }
}

/// Face detector + encoder.
///
/// Implementations must be deterministic for a fixed image and must return
/// detections in a stable order; every embedding shares one dimensionality.
pub trait Embedder {
    fn detect_and_embed(&mut self, source: &SourceImage) -> Result<Vec<Detection>>;
}

impl<E: Embedder + ?Sized> Embedder for &mut E {
    fn detect_and_embed(&mut self, source: &SourceImage) -> Result<Vec<Detection>> {
        (**self).detect_and_embed(source)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn detect_and_embed(&mut self, source: &SourceImage) -> Result<Vec<Detection>> {
        (**self).detect_and_embed(source)
    }
}
