use ndarray::ArrayView1;

use crate::error::{Error, Result};
use crate::gallery::Gallery;
use crate::Embedding;

/// Identity reported when nothing in the gallery is close enough.
pub const UNKNOWN: &str = "Unknown";

/// Accepted distances are reported with this many decimals.
const REPORT_DECIMALS: i32 = 4;

/// Outcome of matching one query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Nearest enrolled identity, `None` when rejected or the gallery is empty.
    pub identity: Option<String>,
    /// Distance to the nearest record, also kept for rejected queries.
    pub distance: Option<f32>,
}

impl MatchResult {
    fn unknown(distance: Option<f32>) -> Self {
        Self {
            identity: None,
            distance,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_some()
    }

    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN)
    }
}

/// L2 norm of the component-wise difference.
pub fn euclidean_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

fn round_distance(distance: f32) -> f32 {
    let scale = 10f64.powi(REPORT_DECIMALS);
    ((f64::from(distance) * scale).round() / scale) as f32
}

/// Exact nearest-neighbour search over a borrowed gallery with a fixed
/// acceptance threshold.
///
/// Holds no mutable state, so one matcher can be shared across threads.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'g> {
    gallery: &'g Gallery,
    threshold: f32,
}

impl<'g> Matcher<'g> {
    pub fn new(gallery: &'g Gallery, threshold: f32) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        Ok(Self { gallery, threshold })
    }

    pub fn gallery(&self) -> &'g Gallery {
        self.gallery
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Index and distance of the closest record. Ties go to the earliest
    /// record in gallery order.
    pub fn nearest(&self, query: &Embedding) -> Result<Option<(usize, f32)>> {
        let Some(dim) = self.gallery.dim() else {
            return Ok(None);
        };
        if query.dim() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: query.dim(),
            });
        }
        if !query.is_finite() {
            return Err(Error::Validation(
                "query embedding has non-finite components".into(),
            ));
        }

        let mut best: Option<(usize, f32)> = None;
        for (idx, (_, row)) in self.gallery.rows().enumerate() {
            let distance = euclidean_distance(row, query.vector.view());
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        Ok(best)
    }

    pub fn match_embedding(&self, query: &Embedding) -> Result<MatchResult> {
        let Some((idx, distance)) = self.nearest(query)? else {
            return Ok(MatchResult::unknown(None));
        };

        if distance <= self.threshold {
            Ok(MatchResult {
                identity: self.gallery.identity(idx).map(str::to_string),
                distance: Some(round_distance(distance)),
            })
        } else {
            Ok(MatchResult::unknown(Some(distance)))
        }
    }

    /// One result per query, in input order.
    pub fn match_many(&self, queries: &[Embedding]) -> Result<Vec<MatchResult>> {
        queries.iter().map(|q| self.match_embedding(q)).collect()
    }
}
