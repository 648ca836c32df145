//! Sass compilation.
//!
//! The whole `@use`/`@import` graph reachable from one entry file compiles
//! into a single expanded-format stylesheet.

use std::path::Path;

use anyhow::Result;
use grass::{ErrorKind, Options, OutputStyle};

use crate::config::Config;
use crate::core::{ArtifactTag, BuildArtifact};
use crate::error::{BuildError, SourceLocation};
use crate::utils::fs::write_atomic;

/// Compile the stylesheet graph rooted at `entry`.
pub fn compile_styles(entry: &Path) -> Result<String, BuildError> {
    if !entry.is_file() {
        return Err(BuildError::compile(entry, "stylesheet entry not found"));
    }
    let options = Options::default().style(OutputStyle::Expanded);
    grass::from_path(entry, &options).map_err(|e| sass_error(entry, *e))
}

/// Locate a grass error. Parse errors carry the span of the offending file,
/// which may be a partial rather than `entry`.
fn sass_error(entry: &Path, error: grass::Error) -> BuildError {
    match error.kind() {
        ErrorKind::ParseError { message, loc, .. } => BuildError::Compile {
            location: SourceLocation::at(
                Path::new(loc.file.name()),
                loc.begin.line + 1,
                loc.begin.column + 1,
            ),
            message,
        },
        ErrorKind::IoError(e) => BuildError::compile(entry, e.to_string()),
        ErrorKind::FromUtf8Error(e) => BuildError::compile(entry, format!("invalid UTF-8: {e}")),
        _ => BuildError::compile(entry, "stylesheet compilation failed"),
    }
}

/// `css:compile`: compile the configured entry into the source tree.
pub fn build_styles(config: &Config) -> Result<BuildArtifact> {
    let source = config.source_dir();
    let entry = source.join(&config.styles.entry);
    let output = source.join(&config.styles.output);

    let css = compile_styles(&entry)?;
    write_atomic(&output, &css)?;
    Ok(BuildArtifact::from_bytes(&output, ArtifactTag::Compiled, css.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_compile_resolves_partials() {
        let dir = project(&[
            ("scss/_vars.scss", "$accent: #c00;\n"),
            ("scss/index.scss", "@import \"vars\";\n.btn { color: $accent; .icon { margin: 0; } }\n"),
        ]);
        let css = compile_styles(&dir.path().join("scss/index.scss")).unwrap();
        assert!(css.contains(".btn {"));
        assert!(css.contains("color: #c00;"));
        assert!(css.contains(".btn .icon {"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let dir = project(&[(
            "scss/index.scss",
            "$w: 10px;\n@mixin box { width: $w * 2; }\n.a { @include box; }\n.b { @extend .a; }\n",
        )]);
        let entry = dir.path().join("scss/index.scss");
        let first = compile_styles(&entry).unwrap();
        let second = compile_styles(&entry).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("width: 20px;"));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let dir = project(&[("scss/index.scss", "a {\n  color: $undefined;\n}\n")]);
        let err = compile_styles(&dir.path().join("scss/index.scss")).unwrap_err();
        match err {
            BuildError::Compile { message, .. } => assert!(!message.is_empty()),
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("scss/index.scss");
        let err = compile_styles(&entry).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Compile { ref location, .. } if location.path == entry
        ));
    }

    #[test]
    fn test_syntax_error_location() {
        let dir = project(&[("scss/index.scss", "a {\n  color: red;\n  width: 10px +;\n}\n")]);
        let entry = dir.path().join("scss/index.scss");
        match compile_styles(&entry).unwrap_err() {
            BuildError::Compile { location, message } => {
                assert!(!message.starts_with("Error:"));
                assert_eq!(location.path, entry);
                assert_eq!(location.line, Some(3));
                assert_eq!(location.column, Some(10));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_in_partial_names_partial() {
        let dir = project(&[
            ("scss/_nav.scss", ".nav {\n  margin: 0 +;\n}\n"),
            ("scss/index.scss", "@import \"nav\";\n"),
        ]);
        match compile_styles(&dir.path().join("scss/index.scss")).unwrap_err() {
            BuildError::Compile { location, .. } => {
                assert!(location.path.ends_with("_nav.scss"));
                assert_eq!(location.line, Some(2));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_styles_writes_into_source_tree() {
        let dir = project(&[("app/scss/index.scss", "body { margin: 0; }\n")]);
        let config = Config {
            root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let artifact = build_styles(&config).unwrap();
        assert_eq!(artifact.path, dir.path().join("app/css/index.css"));
        assert_eq!(artifact.tag, ArtifactTag::Compiled);
        assert!(fs::read_to_string(&artifact.path).unwrap().contains("margin: 0;"));
    }
}
