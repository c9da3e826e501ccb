use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::dataset::{check_embedding, Dataset, ImpostorLabels, SkipReason, SkippedImage};
use crate::error::Result;
use crate::matcher::{Matcher, UNKNOWN};
use crate::{Embedder, SourceImage};

/// Prediction reported when the embedder finds no face at all.
pub const NO_FACE: &str = "NoFace";

/// Ground truth or predicted class of one sample.
///
/// `NoFace` only ever appears as a prediction, so it never equals a true
/// label, even for a folder that happens to be named "NoFace".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Known(String),
    Unknown,
    NoFace,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Known(name) => f.pad(name),
            Label::Unknown => f.pad(UNKNOWN),
            Label::NoFace => f.pad(NO_FACE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSample {
    pub path: PathBuf,
    pub true_label: Label,
    pub predicted_label: Label,
    pub distance: Option<f32>,
}

impl EvaluationSample {
    pub fn is_correct(&self) -> bool {
        self.predicted_label != Label::NoFace && self.predicted_label == self.true_label
    }
}

/// Counts indexed `[true][predicted]` over the sorted union of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<Label>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_samples(samples: &[EvaluationSample]) -> Self {
        let labels: Vec<Label> = samples
            .iter()
            .flat_map(|s| [s.true_label.clone(), s.predicted_label.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for s in samples {
            let (Some(t), Some(p)) = (
                labels.binary_search(&s.true_label).ok(),
                labels.binary_search(&s.predicted_label).ok(),
            ) else {
                continue;
            };
            counts[t][p] += 1;
        }
        Self { labels, counts }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn count(&self, true_label: &Label, predicted: &Label) -> usize {
        match (
            self.labels.binary_search(true_label),
            self.labels.binary_search(predicted),
        ) {
            (Ok(t), Ok(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    fn row_total(&self, idx: usize) -> usize {
        self.counts[idx].iter().sum()
    }

    fn column_total(&self, idx: usize) -> usize {
        self.counts.iter().map(|row| row[idx]).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn weighted_mean(
    classes: &[ClassMetrics],
    total: usize,
    metric: impl Fn(&ClassMetrics) -> f64,
) -> f64 {
    if total == 0 {
        return 0.0;
    }
    classes
        .iter()
        .map(|c| metric(c) * c.support as f64)
        .sum::<f64>()
        / total as f64
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub samples: Vec<EvaluationSample>,
    pub skipped: Vec<SkippedImage>,
    pub confusion: ConfusionMatrix,
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// Fraction of correct samples; 0.0 when nothing was evaluated.
    pub accuracy: f64,
}

impl EvaluationReport {
    pub fn from_samples(samples: Vec<EvaluationSample>, skipped: Vec<SkippedImage>) -> Self {
        let confusion = ConfusionMatrix::from_samples(&samples);

        let classes: Vec<ClassMetrics> = confusion
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let tp = confusion.counts[i][i];
                let support = confusion.row_total(i);
                let precision = ratio(tp, confusion.column_total(i));
                let recall = ratio(tp, support);
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1: f1_score(precision, recall),
                    support,
                }
            })
            .collect();

        let total = samples.len();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };
        let weighted_avg = AverageMetrics {
            precision: weighted_mean(&classes, total, |c| c.precision),
            recall: weighted_mean(&classes, total, |c| c.recall),
            f1: weighted_mean(&classes, total, |c| c.f1),
            support: total,
        };

        let correct = samples.iter().filter(|s| s.is_correct()).count();
        let accuracy = ratio(correct, total);

        Self {
            samples,
            skipped,
            confusion,
            classes,
            macro_avg,
            weighted_avg,
            accuracy,
        }
    }

    /// Impostor samples correctly rejected.
    pub fn true_negatives(&self) -> usize {
        self.confusion.count(&Label::Unknown, &Label::Unknown)
    }

    /// Impostor samples accepted as some enrolled identity.
    pub fn false_accepts(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| {
                s.true_label == Label::Unknown && matches!(s.predicted_label, Label::Known(_))
            })
            .count()
    }

    pub fn no_face_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.predicted_label == Label::NoFace)
            .count()
    }

    pub fn class(&self, label: &Label) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| &c.label == label)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.to_string().len())
            .chain([12])
            .max()
            .unwrap_or(12);

        writeln!(f, "Classification Report:")?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.samples.len()
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Confusion Matrix (rows: true, columns: predicted):")?;
        write!(f, "{:>width$}", "")?;
        for label in &self.confusion.labels {
            write!(f, " {:>9}", label)?;
        }
        writeln!(f)?;
        for (label, row) in self.confusion.labels.iter().zip(&self.confusion.counts) {
            write!(f, "{:>width$}", label)?;
            for n in row {
                write!(f, " {:>9}", n)?;
            }
            writeln!(f)?;
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped {} unreadable image(s)", self.skipped.len())?;
        }
        writeln!(f)?;
        write!(f, "Accuracy: {:.2}", self.accuracy)
    }
}

/// Replay `dataset` through the embedder and matcher and score predictions
/// against the folder labels. Impostor partitions carry the `Unknown` truth.
pub fn evaluate(
    matcher: &Matcher<'_>,
    dataset: &Dataset,
    embedder: &mut dyn Embedder,
    impostors: &ImpostorLabels,
) -> Result<EvaluationReport> {
    info!(
        "Evaluating {} image(s) at threshold {}",
        dataset.len(),
        matcher.threshold()
    );

    let mut samples = Vec::new();
    let mut skipped = Vec::new();

    for partition in dataset.partitions() {
        let true_label = if impostors.contains(&partition.label) {
            Label::Unknown
        } else {
            Label::Known(partition.label.clone())
        };

        for path in &partition.images {
            let detections = match SourceImage::open(path) {
                Ok(source) => embedder
                    .detect_and_embed(&source)
                    .map_err(|e| SkipReason::Embedder(format!("{:#}", e))),
                Err(e) => Err(SkipReason::Unreadable(format!("{:#}", e))),
            };
            let detections = detections.and_then(|d| {
                for det in &d {
                    check_embedding(&det.embedding)?;
                }
                Ok(d)
            });
            let detections = match detections {
                Ok(d) => d,
                Err(reason) => {
                    warn!("Skipping {}: {}", path.display(), reason);
                    skipped.push(SkippedImage {
                        path: path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if detections.is_empty() {
                debug!(
                    "File: {}, Folder: {}, Prediction: {}",
                    path.display(),
                    partition.label,
                    NO_FACE
                );
                samples.push(EvaluationSample {
                    path: path.clone(),
                    true_label: true_label.clone(),
                    predicted_label: Label::NoFace,
                    distance: None,
                });
                continue;
            }

            for detection in detections {
                let result = matcher.match_embedding(&detection.embedding)?;
                debug!(
                    "File: {}, Folder: {}, Prediction: {}, Distance: {:?}",
                    path.display(),
                    partition.label,
                    result.label(),
                    result.distance
                );
                samples.push(EvaluationSample {
                    path: path.clone(),
                    true_label: true_label.clone(),
                    predicted_label: result.identity.map_or(Label::Unknown, Label::Known),
                    distance: result.distance,
                });
            }
        }
    }

    let report = EvaluationReport::from_samples(samples, skipped);
    info!(
        "Evaluated {} sample(s), accuracy {:.2}",
        report.samples.len(),
        report.accuracy
    );
    Ok(report)
}
