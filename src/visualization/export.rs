//! Export unit: rasterizes the full scene and hands the bytes to a sink.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tiny_skia::Pixmap;

use crate::config::ExportConfig;
use crate::error::AppError;
use crate::models::{Point, ViewportState};

use super::constants::parse_hex_color;
use super::surface::Surface;

/// World-space margin kept around the scene bounds.
const EXPORT_MARGIN: f64 = 20.0;
/// Largest pixel dimension an export may reach; the scale shrinks to fit.
const MAX_EXPORT_DIMENSION: f64 = 8192.0;
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unsupported image format '{}' (png, jpeg)", other)),
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An encoded export, ready for delivery.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub filename: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Destination for exported images.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver the image, returning where it ended up.
    async fn deliver(&self, image: &ExportedImage) -> Result<PathBuf, AppError>;
}

/// Writes exports into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, image: &ExportedImage) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&image.filename);
        tokio::fs::write(&path, &image.bytes).await?;
        tracing::info!(path = %path.display(), bytes = image.bytes.len(), "Image exported");
        Ok(path)
    }
}

/// Renders the whole scene, independent of the current viewport.
#[derive(Debug, Clone)]
pub struct ExportUnit {
    config: ExportConfig,
}

impl ExportUnit {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn render(
        &self,
        surface: &Surface,
        format: ImageFormat,
        project: &str,
        at: NaiveDateTime,
    ) -> Result<ExportedImage, AppError> {
        let bounds = surface.bounds(None).ok_or(AppError::EmptyScene)?;
        let world_w = bounds.width() + 2.0 * EXPORT_MARGIN;
        let world_h = bounds.height() + 2.0 * EXPORT_MARGIN;

        let mut scale = if self.config.scale > 0.0 { self.config.scale } else { 1.0 };
        let largest = world_w.max(world_h) * scale;
        if largest > MAX_EXPORT_DIMENSION {
            scale *= MAX_EXPORT_DIMENSION / largest;
        }

        let width = (world_w * scale).ceil() as u32;
        let height = (world_h * scale).ceil() as u32;
        let view = ViewportState {
            zoom: scale,
            pan: Point::new(
                (EXPORT_MARGIN - bounds.min.x) * scale,
                (EXPORT_MARGIN - bounds.min.y) * scale,
            ),
        };

        let pixmap = surface.draw(width, height, view, &opaque_background(&self.config.background))?;
        let bytes = match format {
            ImageFormat::Png => pixmap
                .encode_png()
                .map_err(|e| AppError::ExportEncode(e.to_string()))?,
            ImageFormat::Jpeg => encode_jpeg(&pixmap)?,
        };

        tracing::debug!(width, height, %format, "Scene rasterized");
        Ok(ExportedImage {
            filename: export_filename(project, format, at),
            format,
            width: pixmap.width(),
            height: pixmap.height(),
            bytes,
        })
    }
}

/// `graph-<project>-<timestamp>.<ext>`, with the project reduced to filename-safe characters.
pub fn export_filename(project: &str, format: ImageFormat, at: NaiveDateTime) -> String {
    let slug: String = project
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let slug = if slug.is_empty() { "export".to_string() } else { slug };
    format!(
        "graph-{}-{}.{}",
        slug,
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// The configured background with alpha dropped. Exports always get a solid fill.
fn opaque_background(color: &str) -> String {
    let [r, g, b, _] = parse_hex_color(color).unwrap_or([255, 255, 255, 255]);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

fn encode_jpeg(pixmap: &Pixmap) -> Result<Vec<u8>, AppError> {
    let (w, h) = (pixmap.width(), pixmap.height());

    // The background is opaque, so premultiplied RGBA equals plain RGB here.
    let mut rgb = Vec::with_capacity((w as usize) * (h as usize) * 3);
    for px in pixmap.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }

    let mut out = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    enc.encode(&rgb, w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| AppError::ExportEncode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::models::{Entity, Relation, VisualOverrides};
    use crate::visualization::layout::LayoutOrchestrator;
    use crate::visualization::scene::build_scene;
    use crate::visualization::surface::{HeadlessMount, StyleSheet};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    fn surface(mount: &Arc<HeadlessMount>) -> Surface {
        let scene = Arc::new(build_scene(
            &[Entity::new("1", "Alice", "Person"), Entity::new("2", "Acme", "Org")],
            &[Relation::new("r1", "1", "2", "works_for")],
            &VisualOverrides::default(),
            &SceneConfig::default(),
        ));
        let mut surface = Surface::create(mount.clone(), scene, StyleSheet::default()).unwrap();
        LayoutOrchestrator::default().apply(&mut surface, "grid");
        surface
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>(), Ok(ImageFormat::Png));
        assert_eq!("jpg".parse::<ImageFormat>(), Ok(ImageFormat::Jpeg));
        assert_eq!("jpeg".parse::<ImageFormat>(), Ok(ImageFormat::Jpeg));
        assert!("svg".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_filename() {
        assert_eq!(
            export_filename("acme corp", ImageFormat::Png, timestamp()),
            "graph-acme-corp-20240309-140507.png"
        );
        assert_eq!(
            export_filename("", ImageFormat::Jpeg, timestamp()),
            "graph-export-20240309-140507.jpg"
        );
    }

    #[test]
    fn test_png_export_covers_full_scene() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut surface = surface(&mount);
        // Zoomed far in; export must not depend on it.
        surface.set_viewport(ViewportState {
            zoom: 10.0,
            pan: Point::new(-5000.0, -5000.0),
        });

        let unit = ExportUnit::new(ExportConfig::default());
        let image = unit.render(&surface, ImageFormat::Png, "demo", timestamp()).unwrap();
        assert_eq!(&image.bytes[..8], b"\x89PNG\r\n\x1a\n");

        let bounds = surface.bounds(None).unwrap();
        let expected_w = ((bounds.width() + 2.0 * EXPORT_MARGIN) * 2.0).ceil() as u32;
        assert_eq!(image.width, expected_w);
    }

    #[test]
    fn test_jpeg_export_uses_opaque_background() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let surface = surface(&mount);
        let unit = ExportUnit::new(ExportConfig {
            background: "#00000000".to_string(),
            ..ExportConfig::default()
        });

        let image = unit.render(&surface, ImageFormat::Jpeg, "demo", timestamp()).unwrap();
        assert_eq!(&image.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(opaque_background("#12345678"), "#123456");
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let image = ExportedImage {
            filename: "graph-demo.png".to_string(),
            format: ImageFormat::Png,
            width: 1,
            height: 1,
            bytes: vec![1, 2, 3],
        };

        let path = sink.deliver(&image).await.unwrap();
        assert_eq!(path, dir.path().join("out").join("graph-demo.png"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![1, 2, 3]);
    }
}
