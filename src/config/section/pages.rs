//! `[pages]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [pages]
//! include = ["*.html"]   # top-level pages in the source tree
//! suffix = ".min"        # index.html -> index.min.html
//!
//! [pages.manifest]
//! css = "css/index.min.css"
//! js = { path = "js/bundle.min.js", tpl = "<script src=\"%s\" defer></script>" }
//! ```
//!
//! Each manifest key names a `<!-- build:KEY -->...<!-- endbuild -->` block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::page::ManifestEntry;

/// Page assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Glob patterns relative to the source root.
    pub include: Vec<String>,
    /// Inserted before the extension of each output page.
    pub suffix: String,
    /// Placeholder key -> artifact.
    pub manifest: BTreeMap<String, ManifestEntry>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        let manifest = BTreeMap::from([
            ("css".to_string(), ManifestEntry::Path("css/index.min.css".into())),
            ("js".to_string(), ManifestEntry::Path("js/bundle.min.js".into())),
        ]);
        Self {
            include: vec!["*.html".into()],
            suffix: ".min".into(),
            manifest,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::page::ManifestEntry;

    #[test]
    fn test_pages_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.pages.suffix, ".min");
        assert_eq!(
            config.pages.manifest.get("css"),
            Some(&ManifestEntry::Path("css/index.min.css".into()))
        );
    }

    #[test]
    fn test_manifest_with_template() {
        let config = test_parse_config(
            r#"
[pages.manifest]
js = { path = "js/app.min.js", tpl = "<script async src=\"%s\"></script>" }
"#,
        );
        assert_eq!(config.pages.manifest.len(), 1);
        assert_eq!(
            config.pages.manifest.get("js"),
            Some(&ManifestEntry::Template {
                path: "js/app.min.js".into(),
                tpl: "<script async src=\"%s\"></script>".into(),
            })
        );
    }
}
