//! Asset sections: `[cdn]`, `[styles]`, `[scripts]`, `[images]`, `[[copy]]`
//! and `[[vendor]]`.
//!
//! # Example
//!
//! ```toml
//! [cdn]
//! base = "https://assets.example.com/"
//! root_prefix = "../"                 # stylesheet urls starting here go to the CDN
//!
//! [styles]
//! entry = "scss/index.scss"
//! output = "css/index.css"            # compiled, inside the source tree
//! minified = "css/index.min.css"      # inside the output tree
//!
//! [scripts]
//! entry = "js/index.js"
//! bundle = "js/bundle.js"
//! minified = "js/bundle.min.js"
//!
//! [images]
//! dir = "images"
//! extensions = ["png", "jpg", "jpeg", "gif", "svg"]
//! jpeg_quality = 90
//!
//! [[copy]]
//! from = "fonts"
//! include = ["**/*"]
//! to = "fonts"
//!
//! [[vendor]]
//! name = "jquery"
//! from = "jquery/dist"
//! include = ["*"]
//! exclude = ["core.js"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[cdn]`: where published static assets are served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    /// Absolute URL prefix. `None` disables CDN rewriting.
    pub base: Option<String>,
    /// Stylesheet url prefix that denotes the source tree root.
    pub root_prefix: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            base: None,
            root_prefix: "../".into(),
        }
    }
}

/// `[styles]`: Sass entry and stylesheet artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Entry file, relative to the source tree.
    pub entry: PathBuf,
    /// Compiled stylesheet, relative to the source tree.
    pub output: PathBuf,
    /// Minified stylesheet, relative to the output tree.
    pub minified: PathBuf,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: "scss/index.scss".into(),
            output: "css/index.css".into(),
            minified: "css/index.min.css".into(),
        }
    }
}

/// `[scripts]`: script entry and bundle artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Entry module, relative to the source tree.
    pub entry: PathBuf,
    /// Bundle, relative to the source tree (served directly by `serve`).
    pub bundle: PathBuf,
    /// Minified bundle, relative to the output tree.
    pub minified: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "js/index.js".into(),
            bundle: "js/bundle.js".into(),
            minified: "js/bundle.min.js".into(),
        }
    }
}

/// `[images]`: raster/vector optimization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Image directory, relative to both source and output trees.
    pub dir: PathBuf,
    /// File extensions (lowercase) picked up by `images:minify`.
    pub extensions: Vec<String>,
    /// JPEG re-encode quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: "images".into(),
            extensions: ["png", "jpg", "jpeg", "gif", "svg"]
                .map(String::from)
                .to_vec(),
            jpeg_quality: 90,
        }
    }
}

/// `[[copy]]`: verbatim copy from the source tree to the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    /// Directory relative to the source tree (`""` = source root).
    #[serde(default)]
    pub from: PathBuf,
    /// Glob patterns relative to `from`.
    pub include: Vec<String>,
    /// Directory relative to the output tree.
    #[serde(default)]
    pub to: PathBuf,
}

impl CopyRule {
    /// Favicons, manifests and fonts.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                from: PathBuf::new(),
                include: ["*.png", "*.xml", "*.ico", "*.webmanifest", "*.svg"]
                    .map(String::from)
                    .to_vec(),
                to: PathBuf::new(),
            },
            Self {
                from: "fonts".into(),
                include: vec!["**/*".into()],
                to: "fonts".into(),
            },
        ]
    }
}

/// `[[vendor]]`: a package subset copied from the dependency cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPackage {
    /// Directory name under the vendor dir.
    pub name: String,
    /// Directory relative to the dependency cache.
    pub from: PathBuf,
    #[serde(default = "match_everything")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn match_everything() -> Vec<String> {
    vec!["**/*".into()]
}
