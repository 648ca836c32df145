//! Rewrite `src`/`href` attributes that name files under the asset root
//! to absolute CDN URLs.

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s(?:src|href)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Rewrite asset references in `markup` to `cdn_base + path`.
///
/// A value is rewritten only if it is relative, stays inside `asset_root`,
/// and names an existing file there. Query strings and fragments are kept.
pub fn rewrite_asset_refs(markup: &str, cdn_base: &str, asset_root: &Path) -> String {
    ATTR.replace_all(markup, |caps: &Captures| {
        let (value, quote) = match (caps.get(2), caps.get(3)) {
            (Some(m), _) => (m.as_str(), '"'),
            (_, Some(m)) => (m.as_str(), '\''),
            _ => return caps[0].to_string(),
        };
        match cdn_url(value, cdn_base, asset_root) {
            Some(url) => format!("{}{quote}{url}{quote}", &caps[1]),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

fn cdn_url(value: &str, cdn_base: &str, asset_root: &Path) -> Option<String> {
    let value = value.trim();
    if value.is_empty()
        || value.starts_with(['#', '?', '/', '\\'])
        || value.contains(':')
    {
        return None;
    }

    let relative = value.strip_prefix("./").unwrap_or(value);
    let path_part = relative.split(['?', '#']).next().unwrap_or_default();
    let path = Path::new(path_part);
    if path_part.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    if !asset_root.join(path).is_file() {
        return None;
    }

    Some(format!("{cdn_base}{relative}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CDN: &str = "https://assets.example.com/";

    fn asset_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/logo.png"), "").unwrap();
        fs::write(dir.path().join("favicon.ico"), "").unwrap();
        dir
    }

    #[test]
    fn test_existing_assets_rewritten() {
        let root = asset_root();
        let markup = r#"<img src="images/logo.png" alt=""><link rel="icon" href='./favicon.ico?v=2'>"#;
        assert_eq!(
            rewrite_asset_refs(markup, CDN, root.path()),
            r#"<img src="https://assets.example.com/images/logo.png" alt=""><link rel="icon" href='https://assets.example.com/favicon.ico?v=2'>"#
        );
    }

    #[test]
    fn test_other_refs_untouched() {
        let root = asset_root();
        let markup = concat!(
            r#"<a href="about.html">"#,
            r##"<a href="#top">"##,
            r#"<a href="mailto:me@example.com">"#,
            r#"<img src="/images/logo.png">"#,
            r#"<img src="//cdn.other.com/x.png">"#,
            r#"<img src="../images/logo.png">"#,
            r#"<img src="data:image/gif;base64,R0lGOD">"#,
            r#"<link href="css/index.min.css">"#,
        );
        assert_eq!(rewrite_asset_refs(markup, CDN, root.path()), markup);
    }
}
