//! Asset optimization: minification, stylesheet URL rewriting, image
//! recompression and verbatim copies.
//!
//! Stage entry points read the compiled artifacts from the source tree and
//! write into the output tree:
//!
//! | Stage           | Reads                 | Writes                     |
//! |-----------------|-----------------------|----------------------------|
//! | `css:minify`    | `app/css/index.css`   | `dist/css/index.min.css`   |
//! | `js:minify`     | `app/js/bundle.js`    | `dist/js/bundle.min.js`    |
//! | `images:minify` | `app/images/**`       | `dist/images/**`           |
//! | `copy:static`   | `[[copy]]` rules      | `dist/...`                 |
//! | `vendor`        | `node_modules/...`    | `vendor/<name>/...`        |

mod copy;
mod images;
pub mod minify;
pub mod urls;

pub use copy::{copy_static, copy_vendor};
pub use images::{ImageOptions, ImageOutcome, ImageReport, optimize_images};
pub use minify::{MinifyError, minify_css, minify_js};
pub use urls::{CdnRewriter, UrlRewriter, rewrite_urls};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::core::{ArtifactTag, BuildArtifact};
use crate::error::BuildError;
use crate::utils::fs::{collect_files, write_atomic};

fn read_artifact(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Rewrite rooted URLs onto the CDN (when configured), then minify.
pub fn minify_stylesheet(css: &str, rewriter: Option<&dyn UrlRewriter>) -> Result<String, MinifyError> {
    match rewriter {
        Some(rewriter) => minify_css(&rewrite_urls(css, rewriter)),
        None => minify_css(css),
    }
}

/// `css:minify`
pub fn build_min_styles(config: &Config) -> Result<BuildArtifact> {
    let input = config.source_dir().join(&config.styles.output);
    let output = config.output_dir().join(&config.styles.minified);

    let css = read_artifact(&input)?;
    let rewriter = config
        .cdn_base()
        .map(|base| CdnRewriter::new(config.cdn.root_prefix.clone(), &base));
    let minified = minify_stylesheet(&css, rewriter.as_ref().map(|r| r as &dyn UrlRewriter))
        .map_err(|e| BuildError::compile(&input, e.to_string()))?;

    write_atomic(&output, &minified)?;
    Ok(BuildArtifact::from_bytes(&output, ArtifactTag::Minified, minified.as_bytes()))
}

/// `js:minify`
pub fn build_min_scripts(config: &Config) -> Result<BuildArtifact> {
    let input = config.source_dir().join(&config.scripts.bundle);
    let output = config.output_dir().join(&config.scripts.minified);

    let js = read_artifact(&input)?;
    let minified = minify_js(&js).map_err(|e| BuildError::compile(&input, e.to_string()))?;

    write_atomic(&output, &minified)?;
    Ok(BuildArtifact::from_bytes(&output, ArtifactTag::Minified, minified.as_bytes()))
}

/// `images:minify`
pub fn build_images(config: &Config) -> ImageReport {
    let source = config.source_dir().join(&config.images.dir);
    let output = config.output_dir().join(&config.images.dir);

    let files: Vec<_> = collect_files(&source)
        .into_iter()
        .filter(|file| {
            file.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    config
                        .images
                        .extensions
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
                })
        })
        .collect();

    optimize_images(
        &files,
        &source,
        &output,
        ImageOptions {
            jpeg_quality: config.images.jpeg_quality,
        },
    )
}
