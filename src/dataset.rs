use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Error, Result};
use crate::Embedding;

/// All images of one label, e.g. one person's folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub label: String,
    pub images: Vec<PathBuf>,
}

/// Labeled image collection laid out as `root/<label>/<image>`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    partitions: Vec<Partition>,
}

impl Dataset {
    /// Walk `root`. Partitions and images come back sorted by name; hidden
    /// entries and loose files at the top level are ignored.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::Configuration(format!(
                "dataset directory {} does not exist",
                root.display()
            )));
        }

        let mut partitions = Vec::new();
        for dir in sorted_entries(root)? {
            if !dir.is_dir() {
                continue;
            }
            if let Some(partition) = read_partition(&dir) {
                partitions.push(partition);
            }
        }

        Ok(Self { partitions })
    }

    pub fn from_partitions(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Total image count across partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.images.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An unreadable folder is skipped with a warning rather than failing the walk.
fn read_partition(dir: &Path) -> Option<Partition> {
    let label = dir.file_name()?.to_string_lossy().into_owned();
    match sorted_entries(dir) {
        Ok(entries) => Some(Partition {
            label,
            images: entries.into_iter().filter(|p| p.is_file()).collect(),
        }),
        Err(e) => {
            warn!("Skipping folder {}: {}", label, e);
            None
        }
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::resource(dir, e))? {
        let path = entry.map_err(|e| Error::resource(dir, e))?.path();
        let hidden = path
            .file_name()
            .map_or(true, |n| n.to_string_lossy().starts_with('.'));
        if !hidden {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Labels that mark impostor partitions, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ImpostorLabels(Vec<String>);

impl ImpostorLabels {
    pub fn new<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self(
            labels
                .into_iter()
                .map(|l| l.as_ref().to_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.0.iter().any(|l| *l == label)
    }
}

/// Why a batch run left an image out.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Unreadable(String),
    Embedder(String),
    NoFace,
    MultipleFaces(usize),
    InvalidEmbedding(String),
    Impostor,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable image: {}", e),
            SkipReason::Embedder(e) => write!(f, "embedder failed: {}", e),
            SkipReason::NoFace => write!(f, "no face found"),
            SkipReason::MultipleFaces(n) => write!(f, "{} faces found, expected exactly one", n),
            SkipReason::InvalidEmbedding(e) => write!(f, "invalid embedding: {}", e),
            SkipReason::Impostor => write!(f, "impostor partition"),
        }
    }
}

/// Embeddings must be non-empty and finite to take part in matching.
pub(crate) fn check_embedding(embedding: &Embedding) -> std::result::Result<(), SkipReason> {
    if embedding.dim() == 0 {
        return Err(SkipReason::InvalidEmbedding("no components".into()));
    }
    if !embedding.is_finite() {
        return Err(SkipReason::InvalidEmbedding("non-finite components".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: SkipReason,
}
