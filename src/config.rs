use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::dataset::ImpostorLabels;
use crate::enroll::{EnrollOptions, MultiFacePolicy};
use crate::error::Error;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(
        option_env!("FACEGALLERY_CONFIG_PATH").unwrap_or("/usr/local/etc/facegallery/config.toml"),
    )
});

/// Looser acceptance used when nothing is configured.
pub const DEFAULT_THRESHOLD: f32 = 0.6;
/// Stricter acceptance for deployments that prefer false rejects.
pub const STRICT_THRESHOLD: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub threshold: f32,
    pub gallery: PathBuf,
    pub dataset: PathBuf,
    pub impostor_labels: Vec<String>,
    pub multi_face: MultiFacePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            gallery: PathBuf::from("encodings.gallery"),
            dataset: PathBuf::from("dataset"),
            impostor_labels: vec!["random".to_string()],
            multi_face: MultiFacePolicy::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> crate::Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        if self.gallery.as_os_str().is_empty() {
            return Err(Error::Configuration("gallery path is empty".into()));
        }
        if self.dataset.as_os_str().is_empty() {
            return Err(Error::Configuration("dataset path is empty".into()));
        }
        Ok(())
    }

    pub fn impostors(&self) -> ImpostorLabels {
        ImpostorLabels::new(&self.impostor_labels)
    }

    pub fn enroll_options(&self) -> EnrollOptions {
        EnrollOptions {
            multi_face: self.multi_face,
            impostors: self.impostors(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
