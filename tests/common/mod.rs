#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use facegallery::{BoundingBox, Detection, Embedder, Embedding, SourceImage};
use image::{Rgb, RgbImage};

/// Deterministic stand-in for a face model: the colour of the top-left pixel
/// selects which detections an image "contains".
#[derive(Default)]
pub struct ColorEmbedder {
    faces: HashMap<[u8; 3], Vec<Detection>>,
    pub calls: usize,
}

impl ColorEmbedder {
    pub fn with(mut self, color: [u8; 3], embeddings: Vec<Vec<f32>>) -> Self {
        let detections = embeddings
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let offset = i as u32 * 20;
                Detection {
                    bbox: BoundingBox::new(offset, offset + 10, offset + 10, offset),
                    embedding: Embedding::new(v),
                }
            })
            .collect();
        self.faces.insert(color, detections);
        self
    }
}

impl Embedder for ColorEmbedder {
    fn detect_and_embed(&mut self, source: &SourceImage) -> Result<Vec<Detection>> {
        self.calls += 1;
        let pixel = source.image.to_rgb8().get_pixel(0, 0).0;
        Ok(self.faces.get(&pixel).cloned().unwrap_or_default())
    }
}

/// Write a tiny solid-colour PNG at `root/label/name`.
pub fn write_image(root: &Path, label: &str, name: &str, color: [u8; 3]) -> Result<PathBuf> {
    let dir = root.join(label);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    RgbImage::from_pixel(4, 4, Rgb(color)).save(&path)?;
    Ok(path)
}

pub fn write_corrupt(root: &Path, label: &str, name: &str) -> Result<PathBuf> {
    let dir = root.join(label);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    std::fs::write(&path, b"this is not a png")?;
    Ok(path)
}

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];
pub const GREY: [u8; 3] = [128, 128, 128];
pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];
