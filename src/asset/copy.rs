//! Verbatim copies: static files into the output tree, vendor package
//! subsets out of the dependency cache.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::{Config, CopyRule, VendorPackage};
use crate::utils::fs::{collect_files, copy_atomic, relative_key};
use crate::utils::glob::GlobSet;

/// Copy files under `from` matching `include` but not `exclude` into `to`,
/// preserving relative layout. Returns the written paths, sorted.
pub fn copy_matching(
    from: &Path,
    include: &GlobSet,
    exclude: &GlobSet,
    to: &Path,
) -> Result<Vec<PathBuf>> {
    let selected: Vec<(PathBuf, String)> = collect_files(from)
        .into_iter()
        .filter_map(|file| {
            let key = relative_key(from, &file)?;
            (include.is_match(&key) && !exclude.is_match(&key)).then_some((file, key))
        })
        .collect();

    selected
        .par_iter()
        .map(|(file, key)| -> Result<PathBuf> {
            let target = to.join(key);
            copy_atomic(file, &target)?;
            Ok(target)
        })
        .collect()
}

/// `copy:static`: apply every `[[copy]]` rule.
pub fn copy_static(config: &Config) -> Result<Vec<PathBuf>> {
    let source = config.source_dir();
    let output = config.output_dir();
    let mut written = Vec::new();
    for rule in &config.copy {
        written.extend(copy_rule(rule, &source, &output)?);
    }
    Ok(written)
}

fn copy_rule(rule: &CopyRule, source: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    let include = GlobSet::new(&rule.include)
        .with_context(|| format!("invalid include pattern in copy rule `{}`", rule.from.display()))?;
    copy_matching(
        &source.join(&rule.from),
        &include,
        &GlobSet::default(),
        &output.join(&rule.to),
    )
}

/// `vendor`: copy each configured package subset into `vendor/<name>`.
///
/// A missing package directory is an error: the dependency cache is not
/// installed or the config names the wrong path.
pub fn copy_vendor(config: &Config) -> Result<Vec<PathBuf>> {
    let deps = config.deps_dir();
    let vendor = config.vendor_dir();
    let mut written = Vec::new();
    for package in &config.vendor {
        written.extend(copy_package(package, &deps, &vendor)?);
    }
    Ok(written)
}

fn copy_package(package: &VendorPackage, deps: &Path, vendor: &Path) -> Result<Vec<PathBuf>> {
    let from = deps.join(&package.from);
    anyhow::ensure!(
        from.is_dir(),
        "vendor package `{}`: {} does not exist",
        package.name,
        from.display()
    );
    let include = GlobSet::new(&package.include)
        .with_context(|| format!("invalid include pattern for vendor `{}`", package.name))?;
    let exclude = GlobSet::new(&package.exclude)
        .with_context(|| format!("invalid exclude pattern for vendor `{}`", package.name))?;
    copy_matching(&from, &include, &exclude, &vendor.join(&package.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file.as_bytes()).unwrap();
        }
    }

    fn config_in(dir: &TempDir, toml: &str) -> Config {
        Config {
            root: dir.path().to_path_buf(),
            ..test_parse_config(toml)
        }
    }

    #[test]
    fn test_copy_static_defaults() {
        let dir = TempDir::new().unwrap();
        touch(
            &dir.path().join("app"),
            &[
                "favicon.ico",
                "apple-touch-icon.png",
                "site.webmanifest",
                "browserconfig.xml",
                "index.html",
                "images/logo.png",
                "fonts/inter/inter.woff2",
            ],
        );
        let config = config_in(&dir, "");

        let written = copy_static(&config).unwrap();
        let out = dir.path().join("dist");
        assert!(out.join("favicon.ico").is_file());
        assert!(out.join("site.webmanifest").is_file());
        assert!(out.join("fonts/inter/inter.woff2").is_file());
        // top-level only, pages and images belong to other stages
        assert!(!out.join("index.html").exists());
        assert!(!out.join("images/logo.png").exists());
        assert_eq!(written.len(), 5);
    }

    #[test]
    fn test_copy_vendor_subset() {
        let dir = TempDir::new().unwrap();
        touch(
            &dir.path().join("node_modules/jquery/dist"),
            &["jquery.js", "jquery.min.js", "core.js"],
        );
        let config = config_in(
            &dir,
            "[[vendor]]\nname = \"jquery\"\nfrom = \"jquery/dist\"\ninclude = [\"*.js\"]\nexclude = [\"core.js\"]",
        );

        copy_vendor(&config).unwrap();
        let vendor = dir.path().join("vendor/jquery");
        assert_eq!(fs::read_to_string(vendor.join("jquery.min.js")).unwrap(), "jquery.min.js");
        assert!(vendor.join("jquery.js").is_file());
        assert!(!vendor.join("core.js").exists());
    }

    #[test]
    fn test_copy_vendor_missing_package() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, "[[vendor]]\nname = \"gone\"\nfrom = \"gone\"");
        let err = copy_vendor(&config).unwrap_err();
        assert!(err.to_string().contains("vendor package `gone`"));
    }
}
