mod common;

use anyhow::Result;
use common::*;
use facegallery::dataset::{Dataset, ImpostorLabels, SkipReason};
use facegallery::enroll::{self, EnrollOptions, MultiFacePolicy};
use facegallery::{Error, Gallery};

fn options() -> EnrollOptions {
    EnrollOptions {
        multi_face: MultiFacePolicy::SkipImage,
        impostors: ImpostorLabels::new(["random"]),
    }
}

/// An image without a detectable face is skipped, not fatal
#[test]
fn test_image_without_face_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_image(dir.path(), "dave", "blank.png", BLACK)?;

    let dataset = Dataset::open(dir.path())?;
    let mut embedder = ColorEmbedder::default();
    let report = enroll::build_gallery(&dataset, &mut embedder, &options())?;

    assert_eq!(report.gallery.count_for("dave"), 0);
    assert!(report.gallery.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, path);
    assert_eq!(report.skipped[0].reason, SkipReason::NoFace);
    Ok(())
}

#[test]
fn test_enroll_dataset_and_save() -> Result<()> {
    let data = tempfile::tempdir()?;
    let root = data.path();
    write_image(root, "alice", "01.png", RED)?;
    write_image(root, "alice", "02.png", GREEN)?;
    write_image(root, "bob", "01.png", BLUE)?;
    let group = write_image(root, "carol", "group.png", GREY)?;
    let broken = write_corrupt(root, "carol", "broken.png")?;
    write_image(root, "Random", "stranger.png", WHITE)?;

    let mut embedder = ColorEmbedder::default()
        .with(RED, vec![vec![0.1, 0.1, 0.1]])
        .with(GREEN, vec![vec![0.12, 0.1, 0.09]])
        .with(BLUE, vec![vec![0.9, -0.4, 0.2]])
        .with(GREY, vec![vec![0.5, 0.5, 0.5], vec![-0.5, 0.5, 0.5]])
        .with(WHITE, vec![vec![0.0, 0.0, 1.0]]);

    let out = tempfile::tempdir()?;
    let artifact = out.path().join("encodings.gallery");
    let dataset = Dataset::open(root)?;
    let report = enroll::enroll_and_save(&dataset, &mut embedder, &options(), &artifact)?;

    let g = &report.gallery;
    assert_eq!(g.len(), 3);
    assert_eq!(g.dim(), Some(3));
    assert_eq!(g.identity(0), Some("alice"));
    assert_eq!(g.identity(1), Some("alice"));
    assert_eq!(g.identity(2), Some("bob"));
    assert_eq!(g.count_for("carol"), 0);
    assert_eq!(g.count_for("Random"), 0);
    assert_eq!(g.embedding(1).unwrap().to_vec(), vec![0.12, 0.1, 0.09]);

    // Impostor folder is never handed to the embedder
    assert_eq!(embedder.calls, 4);

    let reasons: Vec<_> = report
        .skipped
        .iter()
        .map(|s| (s.path.clone(), s.reason.clone()))
        .collect();
    assert!(reasons.contains(&(group, SkipReason::MultipleFaces(2))));
    assert!(reasons
        .iter()
        .any(|(p, r)| *p == broken && matches!(r, SkipReason::Unreadable(_))));
    assert!(reasons
        .iter()
        .any(|(_, r)| *r == SkipReason::Impostor));

    let restored = Gallery::load(&artifact)?;
    assert_eq!(&restored, g);
    println!("✓ enrolled {} faces, skipped {}", g.len(), report.skipped.len());
    Ok(())
}

#[test]
fn test_first_face_policy_keeps_first_detection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_image(dir.path(), "erin", "pair.png", GREY)?;
    let mut embedder =
        ColorEmbedder::default().with(GREY, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

    let opts = EnrollOptions {
        multi_face: MultiFacePolicy::FirstFace,
        ..options()
    };
    let report = enroll::build_gallery(&Dataset::open(dir.path())?, &mut embedder, &opts)?;

    assert_eq!(report.gallery.len(), 1);
    assert_eq!(report.gallery.embedding(0).unwrap().to_vec(), vec![1.0, 2.0]);
    assert!(report.skipped.is_empty());
    Ok(())
}

#[test]
fn test_inconsistent_embedder_fails_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_image(dir.path(), "alice", "a.png", RED)?;
    write_image(dir.path(), "bob", "b.png", BLUE)?;
    let mut embedder = ColorEmbedder::default()
        .with(RED, vec![vec![0.1, 0.2]])
        .with(BLUE, vec![vec![0.1, 0.2, 0.3]]);

    let result = enroll::build_gallery(&Dataset::open(dir.path())?, &mut embedder, &options());
    assert!(matches!(result, Err(Error::Validation(_))));
    Ok(())
}

#[test]
fn test_rebuild_replaces_artifact() -> Result<()> {
    let data = tempfile::tempdir()?;
    write_image(data.path(), "alice", "a.png", RED)?;
    let out = tempfile::tempdir()?;
    let artifact = out.path().join("nested/encodings.gallery");

    let mut first = ColorEmbedder::default().with(RED, vec![vec![0.1, 0.2]]);
    let dataset = Dataset::open(data.path())?;
    enroll::enroll_and_save(&dataset, &mut first, &options(), &artifact)?;

    let mut second = ColorEmbedder::default().with(RED, vec![vec![0.7, 0.8]]);
    enroll::enroll_and_save(&dataset, &mut second, &options(), &artifact)?;

    let g = Gallery::load(&artifact)?;
    assert_eq!(g.len(), 1);
    assert_eq!(g.embedding(0).unwrap().to_vec(), vec![0.7, 0.8]);
    Ok(())
}

/// A non-finite embedding costs only its own image
#[test]
fn test_non_finite_embedding_is_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_image(dir.path(), "alice", "a.png", RED)?;
    let bad = write_image(dir.path(), "bob", "b.png", BLUE)?;
    let mut embedder = ColorEmbedder::default()
        .with(RED, vec![vec![0.1, 0.2]])
        .with(BLUE, vec![vec![f32::NAN, 0.2]]);

    let report = enroll::build_gallery(&Dataset::open(dir.path())?, &mut embedder, &options())?;

    assert_eq!(report.gallery.len(), 1);
    assert_eq!(report.gallery.identity(0), Some("alice"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, bad);
    assert!(matches!(report.skipped[0].reason, SkipReason::InvalidEmbedding(_)));
    Ok(())
}
