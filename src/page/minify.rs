//! Markup minification.
//!
//! Whitespace between blocks is dropped and runs inside text collapse to one
//! space. `pre`, `textarea`, `script` and `style` content and comments pass
//! through untouched, so conditional comments survive.

use std::sync::LazyLock;

static CFG: LazyLock<minify_html::Cfg> = LazyLock::new(|| {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = true;
    cfg.minify_css = false;
    cfg.minify_js = false;
    cfg
});

/// Minify one page.
pub fn minify_markup(markup: &str) -> String {
    let out = minify_html::minify(markup.as_bytes(), &CFG);
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_whitespace_removed() {
        let markup = "<!DOCTYPE html>\n<html>\n  <body>\n    <div>\n      <p>Hello   <b>world</b></p>\n    </div>\n  </body>\n</html>\n";
        let out = minify_markup(markup);
        assert!(!out.contains('\n'));
        assert!(out.contains("<div><p>Hello <b>world</b></p></div>"));
        assert!(out.contains("</body></html>"));
    }

    #[test]
    fn test_raw_elements_untouched() {
        let markup = "<div>\n<pre>  a\n   b </pre>\n<script>\n  var s = \"x   y\";\n  if (a < b) {}\n</script>\n<style>\n  a  { color: red }\n</style></div>";
        let out = minify_markup(markup);
        assert!(out.contains("  a\n   b </pre>"));
        assert!(out.contains("\n  var s = \"x   y\";\n  if (a < b) {}\n</script>"));
        assert!(out.contains("\n  a  { color: red }\n</style>"));
    }

    #[test]
    fn test_conditional_comments_kept() {
        let markup = "<head>\n  <!--[if lt IE 9]><script src=\"html5shiv.js\"></script><![endif]-->\n</head>";
        let out = minify_markup(markup);
        assert!(out.contains("<!--[if lt IE 9]><script src=\"html5shiv.js\"></script><![endif]-->"));
    }

    #[test]
    fn test_closing_tags_kept() {
        let out = minify_markup("<ul>\n  <li>one</li>\n  <li>two</li>\n</ul>\n<p>end</p>");
        assert_eq!(out.matches("</li>").count(), 2);
        assert!(out.contains("</p>"));
    }
}
