use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::Embedding;

const GALLERY_MAGIC: [u8; 4] = *b"FGAL";
const GALLERY_VERSION: u16 = 1;

/// One enrolled sample: an identity label and the embedding of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    identity: String,
    embedding: Embedding,
}

impl EmbeddingRecord {
    pub fn new(identity: impl Into<String>, embedding: impl Into<Embedding>) -> Self {
        Self {
            identity: identity.into(),
            embedding: embedding.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

/// Persisted form: labels and vectors stored as parallel, index-aligned lists.
#[derive(Debug, Serialize, Deserialize)]
struct GalleryFile {
    magic: [u8; 4],
    version: u16,
    identities: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Read-only collection of enrolled embeddings.
///
/// Row `i` of the embedding matrix belongs to `identities[i]`; an identity may
/// own any number of rows. All rows share one dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
    identities: Vec<String>,
    embeddings: Array2<f32>,
}

impl Default for Gallery {
    fn default() -> Self {
        Self::empty()
    }
}

impl Gallery {
    pub fn empty() -> Self {
        Self {
            identities: Vec::new(),
            embeddings: Array2::zeros((0, 0)),
        }
    }

    pub fn build(records: impl IntoIterator<Item = EmbeddingRecord>) -> Result<Self> {
        let mut identities = Vec::new();
        let mut flat = Vec::new();
        let mut dim = None;

        for (idx, record) in records.into_iter().enumerate() {
            if record.identity.trim().is_empty() {
                return Err(Error::Validation(format!("record {} has an empty identity", idx)));
            }
            let len = record.embedding.dim();
            if len == 0 {
                return Err(Error::Validation(format!(
                    "record {} ({}) has an empty embedding",
                    idx, record.identity
                )));
            }
            if !record.embedding.is_finite() {
                return Err(Error::Validation(format!(
                    "record {} ({}) has non-finite components",
                    idx, record.identity
                )));
            }
            match dim {
                Some(d) if d != len => {
                    return Err(Error::Validation(format!(
                        "record {} ({}) has {} components, expected {}",
                        idx, record.identity, len, d
                    )))
                }
                _ => dim = Some(len),
            }
            flat.extend(record.embedding.vector.iter().copied());
            identities.push(record.identity);
        }

        Self::from_parts(identities, flat, dim.unwrap_or(0))
    }

    fn from_parts(identities: Vec<String>, flat: Vec<f32>, dim: usize) -> Result<Self> {
        if identities.is_empty() {
            return Ok(Self::empty());
        }
        let embeddings = Array2::from_shape_vec((identities.len(), dim), flat)
            .map_err(|e| Error::Validation(format!("embedding matrix: {}", e)))?;
        Ok(Self {
            identities,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Shared embedding dimensionality; `None` for an empty gallery.
    pub fn dim(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.embeddings.ncols())
    }

    pub fn identity(&self, idx: usize) -> Option<&str> {
        self.identities.get(idx).map(String::as_str)
    }

    pub fn embedding(&self, idx: usize) -> Option<ArrayView1<'_, f32>> {
        (idx < self.len()).then(|| self.embeddings.row(idx))
    }

    /// Rows in gallery order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f32>)> + '_ {
        self.identities
            .iter()
            .map(String::as_str)
            .zip(self.embeddings.rows())
    }

    pub fn records(&self) -> impl Iterator<Item = EmbeddingRecord> + '_ {
        self.rows()
            .map(|(identity, row)| EmbeddingRecord::new(identity, row.to_vec()))
    }

    /// Distinct enrolled identities, sorted.
    pub fn identities(&self) -> BTreeSet<&str> {
        self.identities.iter().map(String::as_str).collect()
    }

    pub fn count_for(&self, identity: &str) -> usize {
        self.identities.iter().filter(|i| *i == identity).count()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = GalleryFile {
            magic: GALLERY_MAGIC,
            version: GALLERY_VERSION,
            identities: self.identities.clone(),
            embeddings: self.embeddings.rows().into_iter().map(|r| r.to_vec()).collect(),
        };
        postcard::to_allocvec(&file)
            .map_err(|e| Error::Validation(format!("serializing gallery: {}", e)))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let file: GalleryFile = postcard::from_bytes(data)
            .map_err(|e| Error::CorruptData(format!("decoding: {}", e)))?;

        if file.magic != GALLERY_MAGIC {
            return Err(Error::CorruptData("not a gallery artifact".into()));
        }
        if file.version != GALLERY_VERSION {
            return Err(Error::CorruptData(format!(
                "unsupported format version {}",
                file.version
            )));
        }
        if file.identities.len() != file.embeddings.len() {
            return Err(Error::CorruptData(format!(
                "{} identities for {} embeddings",
                file.identities.len(),
                file.embeddings.len()
            )));
        }
        if let Some(idx) = file.identities.iter().position(|i| i.trim().is_empty()) {
            return Err(Error::CorruptData(format!("record {} has an empty identity", idx)));
        }

        let dim = file.embeddings.first().map_or(0, Vec::len);
        if dim == 0 && !file.embeddings.is_empty() {
            return Err(Error::CorruptData("zero-length embedding".into()));
        }
        if let Some(bad) = file.embeddings.iter().find(|e| e.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: bad.len(),
            });
        }

        let flat = file.embeddings.into_iter().flatten().collect();
        Self::from_parts(file.identities, flat, dim)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::CorruptData(format!("reading {}: {}", path.display(), e)))?;
        let gallery = Self::from_bytes(&data).map_err(|e| match e {
            Error::CorruptData(reason) => {
                Error::CorruptData(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;
        log::debug!(
            "loaded gallery {}: {} record(s), dim={:?}",
            path.display(),
            gallery.len(),
            gallery.dim()
        );
        Ok(gallery)
    }

    /// Replace the artifact at `path`. Written to a sibling file first and
    /// renamed into place so readers never see a partial gallery.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_bytes()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::resource(parent, e))?;
        }

        let tmp = staging_path(path);
        let written = std::fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(&data)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|_| std::fs::rename(&tmp, path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::resource(path, e));
        }

        log::debug!("saved gallery {} ({} bytes)", path.display(), data.len());
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gallery".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Gallery {
        Gallery::build(vec![
            EmbeddingRecord::new("alice", vec![0.1, 0.2, 0.3]),
            EmbeddingRecord::new("bob", vec![-0.5, 0.25, 1.0e-7]),
            EmbeddingRecord::new("alice", vec![0.15, 0.22, 0.31]),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_keeps_order_and_duplicates() {
        let g = sample();
        assert_eq!(g.len(), 3);
        assert_eq!(g.dim(), Some(3));
        assert_eq!(g.identity(0), Some("alice"));
        assert_eq!(g.identity(1), Some("bob"));
        assert_eq!(g.count_for("alice"), 2);
        assert_eq!(g.identities().into_iter().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert_eq!(g.embedding(1).unwrap().to_vec(), vec![-0.5, 0.25, 1.0e-7]);
        assert!(g.embedding(3).is_none());
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let err = Gallery::build(vec![
            EmbeddingRecord::new("alice", vec![0.1, 0.2]),
            EmbeddingRecord::new("bob", vec![0.1, 0.2, 0.3]),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_build_rejects_bad_records() {
        assert!(matches!(
            Gallery::build(vec![EmbeddingRecord::new("", vec![0.1])]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Gallery::build(vec![EmbeddingRecord::new("alice", Vec::new())]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Gallery::build(vec![EmbeddingRecord::new("alice", vec![f32::INFINITY])]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_empty_gallery() {
        let g = Gallery::build(Vec::new()).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.dim(), None);
        assert_eq!(g, Gallery::empty());
        assert_eq!(Gallery::from_bytes(&g.to_bytes().unwrap()).unwrap(), g);
    }

    #[test]
    fn test_bytes_round_trip_is_exact() {
        let g = sample();
        let restored = Gallery::from_bytes(&g.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, g);
        assert_eq!(restored.records().collect::<Vec<_>>(), g.records().collect::<Vec<_>>());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Gallery::from_bytes(b"definitely not a gallery"),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(Gallery::from_bytes(&[]), Err(Error::CorruptData(_))));
    }

    #[test]
    fn test_from_bytes_detects_ragged_vectors() {
        let file = GalleryFile {
            magic: GALLERY_MAGIC,
            version: GALLERY_VERSION,
            identities: vec!["alice".into(), "bob".into()],
            embeddings: vec![vec![0.1, 0.2], vec![0.3]],
        };
        let data = postcard::to_allocvec(&file).unwrap();
        assert!(matches!(
            Gallery::from_bytes(&data),
            Err(Error::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_from_bytes_detects_misaligned_labels() {
        let file = GalleryFile {
            magic: GALLERY_MAGIC,
            version: GALLERY_VERSION,
            identities: vec!["alice".into()],
            embeddings: vec![vec![0.1], vec![0.3]],
        };
        let data = postcard::to_allocvec(&file).unwrap();
        assert!(matches!(Gallery::from_bytes(&data), Err(Error::CorruptData(_))));
    }

    #[test]
    fn test_save_overwrites_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/encodings.gallery");

        Gallery::build(vec![EmbeddingRecord::new("carol", vec![1.0, 2.0, 3.0])])
            .unwrap()
            .save(&path)
            .unwrap();
        let g = sample();
        g.save(&path).unwrap();

        assert_eq!(Gallery::load(&path).unwrap(), g);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_failed_save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir_all(path.join("inside")).unwrap();

        let err = sample().save(&path).unwrap_err();
        assert!(matches!(err, Error::Resource { .. }));
        assert!(!staging_path(&path).exists());
        assert!(path.join("inside").is_dir());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Gallery::load(dir.path().join("absent.gallery")),
            Err(Error::CorruptData(_))
        ));
    }
}
