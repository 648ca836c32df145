//! The stage registry.
//!
//! | Stage            | Hard deps                                    | After            |
//! |------------------|----------------------------------------------|------------------|
//! | `css:compile`    |                                              |                  |
//! | `js:compile`     |                                              |                  |
//! | `css:minify`     | `css:compile`                                |                  |
//! | `js:minify`      | `js:compile`                                 |                  |
//! | `html:minify`    | `css:minify`, `js:minify`                    |                  |
//! | `images:minify`  |                                              |                  |
//! | `copy:static`    |                                              |                  |
//! | `vendor`         |                                              |                  |
//! | `publish:remote` |                                              | all build stages |
//! | `publish:assets` | minified css/js/html, images, `copy:static`  | `publish:remote` |
//!
//! Composites: `css`, `js`, `build`, `deploy`.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::{GraphError, Stage, StageContext, StageGraph, StageGraphBuilder, StageId, StageOutput};
use crate::asset::{build_images, build_min_scripts, build_min_styles, copy_static, copy_vendor};
use crate::compiler::{build_scripts, build_styles};
use crate::config::Need;
use crate::core::{ArtifactTag, BuildArtifact};
use crate::log;
use crate::page::build_pages;
use crate::publish::{
    AwsCliStore, CachePolicy, ObjectStore, PublishScope, publish_to_filesystem,
    publish_to_object_store, rsync_command,
};

pub const CSS_COMPILE: StageId = StageId::new("css:compile");
pub const JS_COMPILE: StageId = StageId::new("js:compile");
pub const CSS_MINIFY: StageId = StageId::new("css:minify");
pub const JS_MINIFY: StageId = StageId::new("js:minify");
pub const HTML_MINIFY: StageId = StageId::new("html:minify");
pub const IMAGES_MINIFY: StageId = StageId::new("images:minify");
pub const COPY_STATIC: StageId = StageId::new("copy:static");
pub const VENDOR: StageId = StageId::new("vendor");
pub const PUBLISH_REMOTE: StageId = StageId::new("publish:remote");
pub const PUBLISH_ASSETS: StageId = StageId::new("publish:assets");

const BUILD_STAGES: &[StageId] = &[
    CSS_COMPILE,
    JS_COMPILE,
    CSS_MINIFY,
    JS_MINIFY,
    HTML_MINIFY,
    IMAGES_MINIFY,
    COPY_STATIC,
    VENDOR,
];

/// Which object store `publish:assets` talks to.
#[derive(Clone, Default)]
pub enum StoreChoice {
    /// `aws s3api` with the bucket from the environment.
    #[default]
    Aws,
    /// A preconstructed store (tests, alternative backends).
    Fixed(Arc<dyn ObjectStore>),
}

/// A stage backed by a plain function.
struct FnStage {
    id: StageId,
    deps: &'static [StageId],
    after: &'static [StageId],
    needs: Option<Need>,
    run: fn(&StageContext<'_>) -> Result<StageOutput>,
}

impl FnStage {
    const fn new(id: StageId, run: fn(&StageContext<'_>) -> Result<StageOutput>) -> Self {
        Self {
            id,
            deps: &[],
            after: &[],
            needs: None,
            run,
        }
    }

    const fn deps(mut self, deps: &'static [StageId]) -> Self {
        self.deps = deps;
        self
    }

    const fn after(mut self, after: &'static [StageId]) -> Self {
        self.after = after;
        self
    }

    const fn needs(mut self, need: Need) -> Self {
        self.needs = Some(need);
        self
    }
}

impl Stage for FnStage {
    fn id(&self) -> StageId {
        self.id
    }

    fn deps(&self) -> &[StageId] {
        self.deps
    }

    fn after(&self) -> &[StageId] {
        self.after
    }

    fn needs(&self) -> Option<Need> {
        self.needs
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        (self.run)(ctx)
    }
}

fn copied(paths: Vec<std::path::PathBuf>) -> Result<StageOutput> {
    let artifacts = paths
        .iter()
        .map(|path| BuildArtifact::from_file(path, ArtifactTag::Copied))
        .collect::<Result<_>>()?;
    Ok(StageOutput::artifacts(artifacts))
}

fn css_compile(ctx: &StageContext<'_>) -> Result<StageOutput> {
    Ok(StageOutput::artifacts(vec![build_styles(ctx.config)?]))
}

fn js_compile(ctx: &StageContext<'_>) -> Result<StageOutput> {
    Ok(StageOutput::artifacts(vec![build_scripts(ctx.config)?]))
}

fn css_minify(ctx: &StageContext<'_>) -> Result<StageOutput> {
    Ok(StageOutput::artifacts(vec![build_min_styles(ctx.config)?]))
}

fn js_minify(ctx: &StageContext<'_>) -> Result<StageOutput> {
    Ok(StageOutput::artifacts(vec![build_min_scripts(ctx.config)?]))
}

fn html_minify(ctx: &StageContext<'_>) -> Result<StageOutput> {
    Ok(StageOutput::artifacts(build_pages(ctx.config)?))
}

fn images_minify(ctx: &StageContext<'_>) -> Result<StageOutput> {
    let report = build_images(ctx.config);
    log!("images:minify"; "{report}");

    let warnings = report
        .failures()
        .map(|(key, err)| format!("{key}: {err}"))
        .collect();
    let artifacts = report
        .written
        .iter()
        .map(|path| BuildArtifact::from_file(path, ArtifactTag::Optimized))
        .collect::<Result<_>>()?;
    Ok(StageOutput { artifacts, warnings })
}

fn copy_static_stage(ctx: &StageContext<'_>) -> Result<StageOutput> {
    copied(copy_static(ctx.config)?)
}

fn vendor_stage(ctx: &StageContext<'_>) -> Result<StageOutput> {
    copied(copy_vendor(ctx.config)?)
}

fn publish_remote(ctx: &StageContext<'_>) -> Result<StageOutput> {
    let config = ctx.config;
    let target = ctx.credentials.remote_host(config)?;
    let local_root = config.root_join(&config.publish.remote.source);
    let excludes = &config.publish.remote.exclude;

    if ctx.dry_run {
        let cmd = rsync_command(&local_root, &target, excludes);
        log!("publish:remote"; "dry run, would execute: {}", cmd.display());
    } else {
        publish_to_filesystem(&local_root, &target, excludes)?;
    }
    Ok(StageOutput::default())
}

struct PublishAssets {
    store: StoreChoice,
}

impl Stage for PublishAssets {
    fn id(&self) -> StageId {
        PUBLISH_ASSETS
    }

    fn deps(&self) -> &[StageId] {
        &[CSS_MINIFY, JS_MINIFY, HTML_MINIFY, IMAGES_MINIFY, COPY_STATIC]
    }

    fn after(&self) -> &[StageId] {
        &[PUBLISH_REMOTE]
    }

    fn needs(&self) -> Option<Need> {
        Some(Need::Bucket)
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let config = ctx.config;
        let bucket = ctx.credentials.bucket(config)?;
        let store: Arc<dyn ObjectStore> = match &self.store {
            StoreChoice::Aws => Arc::new(AwsCliStore::new(bucket)?),
            StoreChoice::Fixed(store) => Arc::clone(store),
        };
        let scope = PublishScope::new(&config.publish.assets.exclude)
            .context("invalid `[publish.assets] exclude`")?
            .with_prefix(config.asset_prefix().unwrap_or_default());

        publish_to_object_store(
            &config.output_dir(),
            store.as_ref(),
            &scope,
            &CachePolicy::from_config(config),
            ctx.dry_run,
        )?;
        Ok(StageOutput::default())
    }
}

/// Every stage and composite.
pub fn stage_graph(store: StoreChoice) -> Result<StageGraph, GraphError> {
    StageGraphBuilder::new()
        .stage(FnStage::new(CSS_COMPILE, css_compile))
        .stage(FnStage::new(JS_COMPILE, js_compile))
        .stage(FnStage::new(CSS_MINIFY, css_minify).deps(&[CSS_COMPILE]))
        .stage(FnStage::new(JS_MINIFY, js_minify).deps(&[JS_COMPILE]))
        .stage(FnStage::new(HTML_MINIFY, html_minify).deps(&[CSS_MINIFY, JS_MINIFY]))
        .stage(FnStage::new(IMAGES_MINIFY, images_minify))
        .stage(FnStage::new(COPY_STATIC, copy_static_stage))
        .stage(FnStage::new(VENDOR, vendor_stage))
        .stage(
            FnStage::new(PUBLISH_REMOTE, publish_remote)
                .after(BUILD_STAGES)
                .needs(Need::RemoteHost),
        )
        .stage(PublishAssets { store })
        .composite("css", &["css:compile", "css:minify"])
        .composite("js", &["js:compile", "js:minify"])
        .composite(
            "build",
            &["css", "js", "html:minify", "images:minify", "copy:static", "vendor"],
        )
        .composite("deploy", &["build", "publish:remote", "publish:assets"])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials, test_parse_config};
    use crate::error::BuildError;
    use crate::pipeline::PipelineRun;
    use crate::pipeline::run::StageStatus;
    use crate::publish::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn names(graph: &StageGraph, target: &str) -> Vec<Vec<&'static str>> {
        graph
            .plan(&[target])
            .unwrap()
            .layers
            .iter()
            .map(|layer| layer.iter().map(|id| id.as_str()).collect())
            .collect()
    }

    fn credentials() -> Credentials {
        Credentials::from_pairs([
            ("PRODUCTION_HOST", "example.com"),
            ("PRODUCTION_KEY", "~/.ssh/id_ed25519"),
            ("AWS_BUCKET_NAME", "assets"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_KEY", "SECRET"),
        ])
    }

    #[test]
    fn test_deploy_plan() {
        let graph = stage_graph(StoreChoice::Aws).unwrap();
        assert_eq!(
            names(&graph, "deploy"),
            vec![
                vec!["css:compile", "js:compile", "images:minify", "copy:static", "vendor"],
                vec!["css:minify", "js:minify"],
                vec!["html:minify"],
                vec!["publish:remote"],
                vec!["publish:assets"],
            ]
        );
    }

    #[test]
    fn test_publish_stages_independently_invocable() {
        let graph = stage_graph(StoreChoice::Aws).unwrap();
        assert_eq!(names(&graph, "publish:remote"), vec![vec!["publish:remote"]]);

        let assets = names(&graph, "publish:assets");
        assert_eq!(assets.last().unwrap(), &vec!["publish:assets"]);
        assert!(!assets.iter().flatten().any(|name| *name == "publish:remote"));
        assert!(!assets.iter().flatten().any(|name| *name == "vendor"));
    }

    #[test]
    fn test_build_composite() {
        let graph = stage_graph(StoreChoice::Aws).unwrap();
        let plan = graph.plan(&["build"]).unwrap();
        assert_eq!(plan.len(), 8);
        assert!(!plan.stages().any(|id| id == PUBLISH_REMOTE || id == PUBLISH_ASSETS));
    }

    #[test]
    fn test_css_error_stops_before_publish() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(app.join("scss")).unwrap();
        fs::create_dir_all(app.join("js")).unwrap();
        fs::write(app.join("scss/index.scss"), ".a {\n  color: $undefined;\n}\n").unwrap();
        fs::write(app.join("js/index.js"), "module.exports = 1;\n").unwrap();
        fs::write(app.join("index.html"), "<html></html>").unwrap();

        let store = Arc::new(MemoryStore::with_objects([("old.css", "0")]));
        let graph = stage_graph(StoreChoice::Fixed(store.clone())).unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            ..test_parse_config("")
        };
        let creds = credentials();
        let plan = graph.plan(&["deploy"]).unwrap();
        let report = PipelineRun::new(&graph, plan, &config, &creds)
            .execute()
            .unwrap();

        let failure = report.first_failure().unwrap();
        assert_eq!(failure.stage, CSS_COMPILE);
        let error = failure.error.as_ref().unwrap();
        assert!(matches!(
            error.downcast_ref::<BuildError>(),
            Some(BuildError::Compile { .. })
        ));
        for stage in [PUBLISH_REMOTE, PUBLISH_ASSETS] {
            assert_eq!(report.outcome(stage).unwrap().status, StageStatus::Skipped);
        }
        assert!(store.ops.lock().is_empty());
        assert_eq!(store.objects.lock().len(), 1);
        assert!(!dir.path().join("app/css/index.css").exists());
    }

    #[test]
    fn test_assets_sync_with_fixed_store() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(app.join("scss")).unwrap();
        fs::create_dir_all(app.join("js")).unwrap();
        fs::write(app.join("scss/index.scss"), "$c: red;\n.a { color: $c; }\n").unwrap();
        fs::write(app.join("js/index.js"), "var x = require('./x');\nconsole.log(x);\n").unwrap();
        fs::write(app.join("js/x.js"), "module.exports = 42;\n").unwrap();
        fs::write(
            app.join("index.html"),
            "<head><!-- build:css --><!-- endbuild --></head><body><!-- build:js --><!-- endbuild --></body>",
        )
        .unwrap();

        let store = Arc::new(MemoryStore::with_objects([("stale.js", "0")]));
        let graph = stage_graph(StoreChoice::Fixed(store.clone())).unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            ..test_parse_config("")
        };
        let creds = credentials();
        let plan = graph.plan(&["publish:assets"]).unwrap();
        let report = PipelineRun::new(&graph, plan, &config, &creds)
            .execute()
            .unwrap();

        assert!(report.is_success(), "{:?}", report.first_failure());
        let keys: Vec<_> = store.objects.lock().keys().cloned().collect();
        // html is outside the publish scope
        assert_eq!(keys, vec!["css/index.min.css", "js/bundle.min.js"]);
        assert!(dir.path().join("dist/index.min.html").is_file());
    }

    #[test]
    fn test_versioned_assets_sync() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(app.join("scss")).unwrap();
        fs::create_dir_all(app.join("js")).unwrap();
        fs::write(app.join("scss/index.scss"), ".hero { background: url(../images/bg.png); }\n").unwrap();
        fs::write(app.join("js/index.js"), "console.log(1);\n").unwrap();
        fs::write(app.join("index.html"), "<head><!-- build:css --><!-- endbuild --></head>").unwrap();

        let store = Arc::new(MemoryStore::with_objects([
            ("assets/0ld0000/css/index.min.css", "0"),
            ("stale.js", "0"),
        ]));
        let graph = stage_graph(StoreChoice::Fixed(store.clone())).unwrap();
        let mut config = Config {
            root: dir.path().to_path_buf(),
            ..test_parse_config("[cdn]\nbase = \"https://cdn.example.com\"")
        };
        config.asset_version = Some("abc1234".into());
        let creds = credentials();
        let plan = graph.plan(&["publish:assets"]).unwrap();
        let report = PipelineRun::new(&graph, plan, &config, &creds)
            .execute()
            .unwrap();

        assert!(report.is_success(), "{:?}", report.first_failure());
        let keys: Vec<_> = store.objects.lock().keys().cloned().collect();
        // earlier versions and keys outside the prefix stay in place
        assert_eq!(
            keys,
            vec![
                "assets/0ld0000/css/index.min.css",
                "assets/abc1234/css/index.min.css",
                "assets/abc1234/js/bundle.min.js",
                "stale.js",
            ]
        );
        let css = fs::read_to_string(dir.path().join("dist/css/index.min.css")).unwrap();
        assert!(css.contains("https://cdn.example.com/assets/abc1234/images/bg.png"));
    }
}
