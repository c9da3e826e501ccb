use serde::Serialize;

use crate::error::Result;
use crate::matcher::Matcher;
use crate::{BoundingBox, Embedder, SourceImage};

/// One face as reported to callers of the recognition entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedFace {
    pub identity: String,
    pub distance: Option<f32>,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResponse {
    pub num_faces: usize,
    pub faces: Vec<RecognizedFace>,
}

/// Detect every face in `source` and identify each one against the matcher's
/// gallery. Faces keep the embedder's order.
pub fn recognize(
    embedder: &mut dyn Embedder,
    matcher: &Matcher<'_>,
    source: &SourceImage,
) -> anyhow::Result<RecognitionResponse> {
    let detections = embedder.detect_and_embed(source)?;
    let faces = detections
        .into_iter()
        .map(|d| -> Result<RecognizedFace> {
            let result = matcher.match_embedding(&d.embedding)?;
            Ok(RecognizedFace {
                identity: result.label().to_string(),
                distance: result.distance,
                bounding_box: d.bbox,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!("recognized {} face(s) in {}", faces.len(), source.path.display());
    Ok(RecognitionResponse {
        num_faces: faces.len(),
        faces,
    })
}
