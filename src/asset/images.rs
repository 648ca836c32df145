//! Image optimization.
//!
//! | Format     | Method                                         |
//! |------------|------------------------------------------------|
//! | PNG        | lossless re-encode, best compression           |
//! | JPEG       | re-encode at the configured quality            |
//! | SVG        | usvg normalization, no indentation             |
//! | other      | copied through                                 |
//!
//! The smaller of original and optimized bytes is written, so output never
//! grows. A file that fails is reported and its original bytes are copied,
//! keeping the output set complete.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;

use crate::error::BuildError;
use crate::logger::ProgressLine;
use crate::utils::fs::{relative_key, write_atomic};

/// Optimizer settings.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub jpeg_quality: u8,
}

/// Result for one image.
#[derive(Debug)]
pub enum ImageOutcome {
    Optimized { before: u64, after: u64 },
    Unchanged { size: u64 },
    Failed(BuildError),
}

/// Per-file results of one batch, in input order.
#[derive(Debug, Default)]
pub struct ImageReport {
    pub entries: Vec<(String, ImageOutcome)>,
    /// Output files written (optimized, unchanged or fallback copies).
    pub written: Vec<PathBuf>,
}

impl ImageReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &BuildError)> {
        self.entries.iter().filter_map(|(key, outcome)| match outcome {
            ImageOutcome::Failed(err) => Some((key.as_str(), err)),
            _ => None,
        })
    }

    pub fn optimized_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, ImageOutcome::Optimized { .. }))
            .count()
    }

    pub fn saved_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|(_, outcome)| match outcome {
                ImageOutcome::Optimized { before, after } => before.saturating_sub(*after),
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        write!(
            f,
            "{} image(s), {} optimized, {} failed, {} KiB saved",
            self.entries.len(),
            self.optimized_count(),
            failed,
            self.saved_bytes() / 1024
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Png,
    Jpeg,
    Svg,
    Other,
}

impl Kind {
    fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "svg" => Self::Svg,
            _ => Self::Other,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
            Self::Other => "other",
        }
    }
}

/// Optimize `files` (under `source_root`) into `out_root`, in parallel.
pub fn optimize_images(
    files: &[PathBuf],
    source_root: &Path,
    out_root: &Path,
    options: ImageOptions,
) -> ImageReport {
    let count = |kind: Kind| files.iter().filter(|f| Kind::of(f) == kind).count();
    let progress = ProgressLine::new(
        "images:minify",
        &[
            ("png", count(Kind::Png)),
            ("jpeg", count(Kind::Jpeg)),
            ("svg", count(Kind::Svg)),
            ("other", count(Kind::Other)),
        ],
    );

    let results: Vec<_> = files
        .par_iter()
        .map(|file| {
            let key = relative_key(source_root, file)
                .unwrap_or_else(|| file.to_string_lossy().into_owned());
            let target = out_root.join(&key);
            let (outcome, written) = process_one(file, &target, options);
            progress.inc(Kind::of(file).label());
            (key, outcome, written)
        })
        .collect();
    progress.finish();

    let mut report = ImageReport::default();
    for (key, outcome, written) in results {
        report.entries.push((key, outcome));
        report.written.extend(written);
    }
    report
}

/// Optimize one file; on failure fall back to copying the original.
fn process_one(file: &Path, target: &Path, options: ImageOptions) -> (ImageOutcome, Option<PathBuf>) {
    let failed = |reason: String| BuildError::Optimization {
        path: file.to_path_buf(),
        reason,
    };

    let original = match fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => return (ImageOutcome::Failed(failed(e.to_string())), None),
    };
    let before = original.len() as u64;

    let (outcome, bytes) = match optimize_bytes(Kind::of(file), &original, options) {
        Ok(Some(optimized)) if optimized.len() < original.len() => (
            ImageOutcome::Optimized {
                before,
                after: optimized.len() as u64,
            },
            optimized,
        ),
        Ok(_) => (ImageOutcome::Unchanged { size: before }, original),
        Err(reason) => (ImageOutcome::Failed(failed(reason)), original),
    };

    match write_atomic(target, &bytes) {
        Ok(()) => (outcome, Some(target.to_path_buf())),
        Err(e) => (ImageOutcome::Failed(failed(format!("{e:#}"))), None),
    }
}

/// `Ok(None)` means the format is copied through.
fn optimize_bytes(kind: Kind, data: &[u8], options: ImageOptions) -> Result<Option<Vec<u8>>, String> {
    match kind {
        Kind::Png => {
            let img = decode(data, ImageFormat::Png)?;
            let mut buf = Vec::new();
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
            img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
            Ok(Some(buf))
        }
        Kind::Jpeg => {
            let img = decode(data, ImageFormat::Jpeg)?;
            let mut buf = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut buf, options.jpeg_quality);
            img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
            Ok(Some(buf))
        }
        Kind::Svg => optimize_svg(data),
        Kind::Other => Ok(None),
    }
}

fn decode(data: &[u8], format: ImageFormat) -> Result<DynamicImage, String> {
    image::load(Cursor::new(data), format).map_err(|e| e.to_string())
}

/// Normalize an SVG with usvg.
///
/// Text needs font data to survive the conversion, so SVGs with `<text`
/// are copied through.
fn optimize_svg(data: &[u8]) -> Result<Option<Vec<u8>>, String> {
    if data.windows(5).any(|w| w == b"<text") {
        return Ok(None);
    }
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).map_err(|e| e.to_string())?;
    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };
    Ok(Some(tree.to_string(&write_options).into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    const OPTIONS: ImageOptions = ImageOptions { jpeg_quality: 90 };

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(48, 48, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, 90]));
        let mut buf = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::NoFilter);
        DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
        buf
    }

    fn setup(files: &[(&str, Vec<u8>)]) -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (name, bytes) in files {
            let path = dir.path().join("app/images").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, bytes).unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    #[test]
    fn test_png_never_grows_and_keeps_layout() {
        let original = png_bytes();
        let (dir, files) = setup(&[("icons/grad.png", original.clone())]);
        let out = dir.path().join("dist/images");

        let report = optimize_images(&files, &dir.path().join("app/images"), &out, OPTIONS);
        let written = fs::read(out.join("icons/grad.png")).unwrap();

        assert!(written.len() <= original.len());
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 48));
        assert_eq!(report.entries[0].0, "icons/grad.png");
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn test_failure_is_reported_and_batch_continues() {
        let (dir, files) = setup(&[
            ("broken.png", b"\x89PNG not really".to_vec()),
            ("anim.gif", b"GIF89a....".to_vec()),
            ("ok.png", png_bytes()),
        ]);
        let out = dir.path().join("dist/images");

        let report = optimize_images(&files, &dir.path().join("app/images"), &out, OPTIONS);

        let failures: Vec<_> = report.failures().map(|(key, _)| key).collect();
        assert_eq!(failures, vec!["broken.png"]);
        // original copied so the output set stays complete
        assert_eq!(fs::read(out.join("broken.png")).unwrap(), b"\x89PNG not really");
        assert_eq!(fs::read(out.join("anim.gif")).unwrap(), b"GIF89a....");
        assert!(out.join("ok.png").is_file());
        assert_eq!(report.written.len(), 3);
        assert!(report.to_string().contains("1 failed"));
    }

    #[test]
    fn test_svg_optimized() {
        let svg = br##"<?xml version="1.0"?>
<!-- exported by an editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10">
    <metadata>lots of editor metadata that is not rendered</metadata>
    <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
</svg>
"##;
        let (dir, files) = setup(&[("logo.svg", svg.to_vec())]);
        let out = dir.path().join("dist/images");

        let report = optimize_images(&files, &dir.path().join("app/images"), &out, OPTIONS);
        let written = fs::read(out.join("logo.svg")).unwrap();

        assert!(written.len() < svg.len());
        assert!(matches!(report.entries[0].1, ImageOutcome::Optimized { .. }));
        assert!(usvg::Tree::from_data(&written, &usvg::Options::default()).is_ok());
    }

    #[test]
    fn test_svg_with_text_copied() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><text x="1" y="1">Hi</text></svg>"#;
        assert_eq!(optimize_svg(svg), Ok(None));
    }
}
