use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegallery::config::{self, Config};
use facegallery::dataset::Dataset;
use facegallery::{enroll, evaluate, recognize, Gallery, ManifestEmbedder, Matcher, SourceImage};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facegallery")]
#[command(
    version,
    about = "Face recognition against an enrolled embedding gallery"
)]
struct Cli {
    /// Config file (defaults to the compiled-in location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a gallery from a labeled dataset
    Enroll {
        /// Dataset root laid out as <root>/<person>/<images>
        #[arg(short, long)]
        dataset: Option<PathBuf>,
        /// Where to write the gallery
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Detections manifest produced by the face model
        #[arg(long)]
        detections: PathBuf,
    },
    /// Score a gallery against a labeled dataset
    Evaluate {
        #[arg(short, long)]
        dataset: Option<PathBuf>,
        #[arg(short, long)]
        gallery: Option<PathBuf>,
        #[arg(long)]
        detections: PathBuf,
        /// Override the configured distance threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Identify every face in one image and print JSON
    Recognize {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        gallery: Option<PathBuf>,
        #[arg(long)]
        detections: PathBuf,
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Summarize a gallery artifact
    Info {
        #[arg(short, long)]
        gallery: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file, creating the file if needed
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Enroll {
            dataset,
            output,
            detections,
        } => {
            let dataset = dataset.unwrap_or_else(|| cfg.dataset.clone());
            let output = output.unwrap_or_else(|| cfg.gallery.clone());
            run_enroll(&cfg, &dataset, &output, &detections)
        }
        Commands::Evaluate {
            dataset,
            gallery,
            detections,
            threshold,
        } => {
            apply_threshold(&mut cfg, threshold)?;
            let dataset = dataset.unwrap_or_else(|| cfg.dataset.clone());
            let gallery = gallery.unwrap_or_else(|| cfg.gallery.clone());
            run_evaluate(&cfg, &dataset, &gallery, &detections)
        }
        Commands::Recognize {
            image,
            gallery,
            detections,
            threshold,
        } => {
            apply_threshold(&mut cfg, threshold)?;
            let gallery = gallery.unwrap_or_else(|| cfg.gallery.clone());
            run_recognize(&cfg, &image, &gallery, &detections)
        }
        Commands::Info { gallery } => {
            let gallery = gallery.unwrap_or_else(|| cfg.gallery.clone());
            show_info(&gallery)
        }
        Commands::Config { write } => {
            print!("{}", toml::to_string_pretty(&cfg)?);
            if write {
                let path = cli.config.as_deref().unwrap_or(&config::CONFIG_PATH);
                config::save_config(&cfg, Some(path))
                    .with_context(|| format!("Failed to write config to {}", path.display()))?;
                info!("✓ Config written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn apply_threshold(cfg: &mut Config, threshold: Option<f32>) -> Result<()> {
    if let Some(t) = threshold {
        cfg.threshold = t;
    }
    cfg.validate().context("invalid threshold")?;
    Ok(())
}

fn run_enroll(cfg: &Config, dataset: &Path, output: &Path, detections: &Path) -> Result<()> {
    info!("Enrolling from dataset: {}", dataset.display());

    let dataset = Dataset::open(dataset).context("Failed to open dataset")?;
    let mut embedder =
        ManifestEmbedder::load(detections).context("Failed to load detections manifest")?;

    let report = enroll::enroll_and_save(&dataset, &mut embedder, &cfg.enroll_options(), output)
        .context("Failed to build gallery")?;

    if !report.skipped.is_empty() {
        warn!("{} image(s) were not enrolled", report.skipped.len());
    }
    info!(
        "✓ Gallery with {} face(s) saved to {}",
        report.gallery.len(),
        output.display()
    );
    Ok(())
}

fn run_evaluate(cfg: &Config, dataset: &Path, gallery: &Path, detections: &Path) -> Result<()> {
    let gallery = Gallery::load(gallery).context("Failed to load gallery")?;
    let matcher = Matcher::new(&gallery, cfg.threshold)?;
    let dataset = Dataset::open(dataset).context("Failed to open dataset")?;
    let mut embedder =
        ManifestEmbedder::load(detections).context("Failed to load detections manifest")?;

    let report = evaluate::evaluate(&matcher, &dataset, &mut embedder, &cfg.impostors())
        .context("Evaluation failed")?;

    println!("{}", report);
    Ok(())
}

fn run_recognize(cfg: &Config, image: &Path, gallery: &Path, detections: &Path) -> Result<()> {
    let gallery = Gallery::load(gallery).context("Failed to load gallery")?;
    if gallery.is_empty() {
        warn!("Gallery is empty, every face will be Unknown");
    }
    let matcher = Matcher::new(&gallery, cfg.threshold)?;
    let mut embedder =
        ManifestEmbedder::load(detections).context("Failed to load detections manifest")?;
    let source = SourceImage::open(image).context("Failed to read image")?;

    let response = recognize::recognize(&mut embedder, &matcher, &source)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let gallery = Gallery::load(path).context("Failed to load gallery")?;

    println!("Gallery: {}", path.display());
    println!("Records: {}", gallery.len());
    match gallery.dim() {
        Some(dim) => println!("Dimensions: {}", dim),
        None => println!("Dimensions: -"),
    }
    for identity in gallery.identities() {
        println!("  {:<24} {}", identity, gallery.count_for(identity));
    }
    Ok(())
}
