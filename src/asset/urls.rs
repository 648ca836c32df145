//! Stylesheet URL rewriting.
//!
//! [`rewrite_urls`] hands every `url(...)` reference to a [`UrlRewriter`];
//! references the rewriter declines are left byte-for-byte unchanged.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#).unwrap()
});

/// Maps one stylesheet reference to its replacement, or `None` to keep it.
pub trait UrlRewriter {
    fn rewrite(&self, url: &str) -> Option<String>;
}

impl<F> UrlRewriter for F
where
    F: Fn(&str) -> Option<String>,
{
    fn rewrite(&self, url: &str) -> Option<String> {
        self(url)
    }
}

/// Rewrites references rooted at the source tree onto the CDN.
///
/// `../images/bg.png` with `root_prefix = "../"` and
/// `base = "https://cdn.example.com/"` becomes
/// `https://cdn.example.com/images/bg.png`.
#[derive(Debug, Clone)]
pub struct CdnRewriter {
    root_prefix: String,
    base: String,
}

impl CdnRewriter {
    pub fn new(root_prefix: impl Into<String>, base: &str) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Self {
            root_prefix: root_prefix.into(),
            base,
        }
    }
}

impl UrlRewriter for CdnRewriter {
    fn rewrite(&self, url: &str) -> Option<String> {
        if self.root_prefix.is_empty() || url.starts_with("data:") {
            return None;
        }
        let rest = url.strip_prefix(&self.root_prefix)?;
        Some(format!("{}{}", self.base, rest))
    }
}

/// Apply `rewriter` to every `url(...)` in `css`.
pub fn rewrite_urls(css: &str, rewriter: &dyn UrlRewriter) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let (url, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m.as_str(), "\""),
                (_, Some(m), _) => (m.as_str(), "'"),
                (_, _, Some(m)) => (m.as_str(), ""),
                _ => return caps[0].to_string(),
            };
            match rewriter.rewrite(url) {
                Some(new) => format!("url({quote}{new}{quote})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDN: &str = "https://assets.example.com";

    #[test]
    fn test_cdn_rewrites_rooted_urls() {
        let rewriter = CdnRewriter::new("../", CDN);
        let css = r#"a{background:url(../images/bg.png)}b{src:url("../fonts/a.woff2")}c{x:url('../images/c.svg#i')}"#;
        assert_eq!(
            rewrite_urls(css, &rewriter),
            r#"a{background:url(https://assets.example.com/images/bg.png)}b{src:url("https://assets.example.com/fonts/a.woff2")}c{x:url('https://assets.example.com/images/c.svg#i')}"#
        );
    }

    #[test]
    fn test_other_urls_untouched() {
        let rewriter = CdnRewriter::new("../", CDN);
        let css = "a{b:url( images/local.png );c:url(data:image/png;base64,AAAA);d:url(https://x.org/y.png);e:url(/abs.png)}";
        assert_eq!(rewrite_urls(css, &rewriter), css);
    }

    #[test]
    fn test_closure_rewriter() {
        let upper = |url: &str| url.ends_with(".gif").then(|| url.to_uppercase());
        assert_eq!(
            rewrite_urls("a{b:url(x.gif);c:url(y.png)}", &upper),
            "a{b:url(X.GIF);c:url(y.png)}"
        );
    }

    #[test]
    fn test_base_normalized() {
        let rewriter = CdnRewriter::new("../", "https://cdn.example.com/");
        assert_eq!(
            rewriter.rewrite("../a.png").as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }
}
