use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::dataset::{check_embedding, Dataset, ImpostorLabels, SkipReason, SkippedImage};
use crate::error::Result;
use crate::gallery::{EmbeddingRecord, Gallery};
use crate::{Embedder, SourceImage};

/// What to do with a training image that yields more than one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiFacePolicy {
    /// Leave the image out of the gallery.
    #[default]
    #[serde(rename = "skip")]
    SkipImage,
    /// Enroll the first detection only.
    #[serde(rename = "first")]
    FirstFace,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollOptions {
    pub multi_face: MultiFacePolicy,
    /// Partitions with these labels are never enrolled.
    pub impostors: ImpostorLabels,
}

#[derive(Debug)]
pub struct EnrollmentReport {
    pub gallery: Gallery,
    pub skipped: Vec<SkippedImage>,
}

/// Embed every image of `dataset` and collect one record per usable image.
///
/// Per-image failures are logged and listed in the report; only an
/// inconsistent embedding dimensionality fails the run.
pub fn build_gallery(
    dataset: &Dataset,
    embedder: &mut dyn Embedder,
    options: &EnrollOptions,
) -> Result<EnrollmentReport> {
    info!("Quantifying faces in {} image(s)...", dataset.len());

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for partition in dataset.partitions() {
        if options.impostors.contains(&partition.label) {
            info!("Skipping impostor folder: {}", partition.label);
            skipped.extend(partition.images.iter().map(|path| SkippedImage {
                path: path.clone(),
                reason: SkipReason::Impostor,
            }));
            continue;
        }
        info!("Processing folder for: {}", partition.label);

        for path in &partition.images {
            match embed_one(path, embedder, options.multi_face) {
                Ok(embedding) => records.push(EmbeddingRecord::new(&partition.label, embedding)),
                Err(reason) => {
                    match &reason {
                        SkipReason::MultipleFaces(n) => warn!(
                            "{} faces in training image {}, not enrolling it for {}",
                            n,
                            path.display(),
                            partition.label
                        ),
                        other => warn!("Skipping {}: {}", path.display(), other),
                    }
                    skipped.push(SkippedImage {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }
    }

    let gallery = Gallery::build(records)?;
    info!(
        "Enrolled {} face(s) for {} identities, skipped {} image(s)",
        gallery.len(),
        gallery.identities().len(),
        skipped.len()
    );
    Ok(EnrollmentReport { gallery, skipped })
}

fn embed_one(
    path: &Path,
    embedder: &mut dyn Embedder,
    policy: MultiFacePolicy,
) -> std::result::Result<crate::Embedding, SkipReason> {
    let source = SourceImage::open(path).map_err(|e| SkipReason::Unreadable(format!("{:#}", e)))?;
    let detections = embedder
        .detect_and_embed(&source)
        .map_err(|e| SkipReason::Embedder(format!("{:#}", e)))?;

    match (detections.len(), policy) {
        (0, _) => Err(SkipReason::NoFace),
        (n, MultiFacePolicy::SkipImage) if n > 1 => Err(SkipReason::MultipleFaces(n)),
        (n, _) => {
            if n > 1 {
                warn!("{} faces in {}, keeping the first", n, path.display());
            }
            let embedding = detections
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or(SkipReason::NoFace)?;
            check_embedding(&embedding)?;
            Ok(embedding)
        }
    }
}

/// Build the gallery and replace the artifact at `output`.
pub fn enroll_and_save(
    dataset: &Dataset,
    embedder: &mut dyn Embedder,
    options: &EnrollOptions,
    output: impl AsRef<Path>,
) -> Result<EnrollmentReport> {
    let report = build_gallery(dataset, embedder, options)?;
    info!("Serializing encodings...");
    report.gallery.save(output.as_ref())?;
    info!("Gallery saved to {}", output.as_ref().display());
    Ok(report)
}
