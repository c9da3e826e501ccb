use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::embedder::{Embedder, SourceImage};
use crate::face::{BoundingBox, Detection, Embedding};

/// On-disk layout of a detections manifest:
///
/// ```json
/// {
///   "images": {
///     "alice/01.jpg": [
///       { "bbox": { "top": 12, "right": 98, "bottom": 110, "left": 20 },
///         "embedding": [0.013, -0.087, ...] }
///     ],
///     "random/street.jpg": []
///   }
/// }
/// ```
///
/// Relative keys are resolved against the manifest's own directory.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    images: BTreeMap<String, Vec<ManifestFace>>,
}

#[derive(Debug, Deserialize)]
struct ManifestFace {
    bbox: BoundingBox,
    embedding: Vec<f32>,
}

/// Replays detections that an external face model computed offline.
///
/// Lookups are keyed by image path, so the image itself still has to decode
/// but its pixels are not inspected.
#[derive(Debug, Default)]
pub struct ManifestEmbedder {
    entries: HashMap<PathBuf, Vec<Detection>>,
    dim: Option<usize>,
}

impl ManifestEmbedder {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading detections manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&raw, base)
            .with_context(|| format!("parsing detections manifest {}", path.display()))
    }

    pub fn from_json(raw: &str, base: &Path) -> Result<Self> {
        let file: ManifestFile = serde_json::from_str(raw)?;
        let mut embedder = Self::default();

        for (key, faces) in file.images {
            let mut detections = Vec::with_capacity(faces.len());
            for face in faces {
                if face.embedding.is_empty() {
                    anyhow::bail!("empty embedding for {}", key);
                }
                match embedder.dim {
                    Some(dim) if dim != face.embedding.len() => anyhow::bail!(
                        "embedding for {} has {} components, expected {}",
                        key,
                        face.embedding.len(),
                        dim
                    ),
                    _ => embedder.dim = Some(face.embedding.len()),
                }
                detections.push(Detection {
                    bbox: face.bbox,
                    embedding: Embedding::new(face.embedding),
                });
            }
            embedder.entries.insert(normalize(&base.join(&key)), detections);
        }

        log::debug!(
            "loaded detections for {} image(s), dim={:?}",
            embedder.entries.len(),
            embedder.dim
        );
        Ok(embedder)
    }

    /// Number of images with recorded detections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensionality, if any face was recorded.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }
}

impl Embedder for ManifestEmbedder {
    fn detect_and_embed(&mut self, source: &SourceImage) -> Result<Vec<Detection>> {
        self.entries
            .get(&normalize(&source.path))
            .cloned()
            .with_context(|| format!("no detections recorded for {}", source.path.display()))
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
