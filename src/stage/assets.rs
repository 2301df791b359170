// src/stage/assets.rs

//! Incremental copy of static assets; PNG and JPEG files are re-encoded and
//! the smaller of original and re-encoded bytes is kept.

use std::path::Path;
use std::time::SystemTime;

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::stage::paths::{PathSet, SourceFile};
use crate::stage::{FileResult, Stage, StageContext, StageFuture, StageReport, ensure_parent, names};

#[derive(Debug, Clone)]
pub struct AssetsStage {
    paths: PathSet,
    jpeg_quality: u8,
}

impl AssetsStage {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            paths: PathSet::from_config(names::ASSETS, &cfg.paths().assets)?,
            jpeg_quality: cfg.assets().jpeg_quality,
        })
    }

    async fn build(&self, ctx: &StageContext) -> Result<StageReport> {
        let dest_root = ctx.resolve(self.paths.dest());
        let mut report = StageReport::default();

        for file in self.paths.expand(&ctx.root)? {
            let dest = dest_root.join(&file.rel);

            if is_up_to_date(&file.path, &dest) {
                debug!(file = %file.path.display(), "asset up to date");
                report.push(FileResult::Skipped { src: file.path });
                continue;
            }

            match self.copy_optimized(&file, &dest).await {
                Ok(()) => report.push(FileResult::Written {
                    src: file.path,
                    dest,
                }),
                Err(err) => {
                    tracing::error!(file = %file.path.display(), error = %format!("{err:#}"), "asset copy failed");
                    report.push(FileResult::Failed {
                        src: file.path,
                        cause: format!("{err:#}"),
                    });
                }
            }
        }

        info!(
            written = report.written_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "assets stage finished"
        );
        Ok(report)
    }

    async fn copy_optimized(&self, file: &SourceFile, dest: &Path) -> anyhow::Result<()> {
        let original = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("reading {}", file.path.display()))?;

        let bytes = match image_format(&file.path) {
            Some(format) => {
                let quality = self.jpeg_quality;
                let src = file.path.clone();
                tokio::task::spawn_blocking(move || match optimize_image(&original, format, quality) {
                    Ok(optimized) if optimized.len() < original.len() => optimized,
                    Ok(_) => original,
                    Err(err) => {
                        warn!(file = %src.display(), error = %err, "image decode failed; copying as-is");
                        original
                    }
                })
                .await
                .context("image worker panicked")?
            }
            None => original,
        };

        ensure_parent(dest).await?;
        tokio::fs::write(dest, bytes)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
        Ok(())
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// The destination exists and is not older than the source.
pub fn is_up_to_date(src: &Path, dest: &Path) -> bool {
    match (mtime(src), mtime(dest)) {
        (Some(src_time), Some(dest_time)) => dest_time >= src_time,
        _ => false,
    }
}

fn image_format(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Re-encode an image: PNG at best compression with adaptive filtering,
/// JPEG at `jpeg_quality`.
pub fn optimize_image(bytes: &[u8], format: ImageFormat, jpeg_quality: u8) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, format)?;
    let mut out = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, jpeg_quality))?;
        }
        _ => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))?;
        }
    }

    Ok(out)
}

impl Stage for AssetsStage {
    fn name(&self) -> &str {
        names::ASSETS
    }

    fn run<'a>(&'a self, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(self.build(ctx))
    }
}
