//! CommonJS script bundling.
//!
//! Starting from one entry module, every `require("...")` with a literal
//! specifier is resolved and the reachable modules are emitted into one
//! self-contained bundle:
//!
//! ```text
//! (function (modules, entry) { ...loader... })({
//! 0: [function (require, module, exports) { <entry source> }, {"./util":1}],
//! 1: [function (require, module, exports) { <util source> }, {}]
//! }, 0);
//! ```
//!
//! Module ids follow discovery order (breadth-first, requires in source
//! order), so unchanged sources always produce a byte-identical bundle.
//!
//! # Resolution
//!
//! | Specifier            | Candidates                                         |
//! |----------------------|----------------------------------------------------|
//! | `./x`, `../x`, `/x`  | `x`, `x.js`, `x.json`, `x/package.json`, `x/index.js` |
//! | `pkg`, `@scope/pkg`  | nested `node_modules`, then the dependency cache   |
//! | `pkg/sub/file`       | same lookup, then relative to the package root     |
//!
//! A package's entry is its `package.json` `browser` field (when a string),
//! else `main`, else `index.js`.

use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use oxc::allocator::Allocator;
use oxc::ast::ast::{Argument, CallExpression, Expression};
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::config::Config;
use crate::core::{ArtifactTag, BuildArtifact};
use crate::error::{BuildError, SourceLocation};
use crate::utils::fs::write_atomic;

const PRELUDE: &str = r#"(function (modules, entry) {
  var cache = {};
  function load(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var module = (cache[id] = { exports: {} });
    var deps = modules[id][1];
    modules[id][0].call(module.exports, function (name) {
      if (!Object.prototype.hasOwnProperty.call(deps, name)) {
        throw new Error("Cannot find module '" + name + "'");
      }
      return load(deps[name]);
    }, module, module.exports);
    return module.exports;
  }
  load(entry);
})({
"#;

/// Bundle the module graph rooted at `entry`.
///
/// Bare specifiers resolve against `deps_dir` (the dependency cache).
pub fn compile_scripts(entry: &Path, deps_dir: &Path) -> Result<String, BuildError> {
    if !entry.is_file() {
        return Err(BuildError::compile(entry, "script entry not found"));
    }
    Bundler::new(deps_dir).bundle(entry)
}

/// `js:compile`: bundle the configured entry into the source tree.
pub fn build_scripts(config: &Config) -> Result<BuildArtifact> {
    let source = config.source_dir();
    let entry = source.join(&config.scripts.entry);
    let output = source.join(&config.scripts.bundle);

    let bundle = compile_scripts(&entry, &config.deps_dir())?;
    write_atomic(&output, &bundle)?;
    Ok(BuildArtifact::from_bytes(&output, ArtifactTag::Compiled, bundle.as_bytes()))
}

// ============================================================================
// Bundler
// ============================================================================

struct Module {
    path: PathBuf,
    body: String,
    deps: BTreeMap<String, usize>,
}

struct Bundler {
    deps_dir: PathBuf,
    modules: Vec<Module>,
    ids: FxHashMap<PathBuf, usize>,
    queue: VecDeque<usize>,
}

impl Bundler {
    fn new(deps_dir: &Path) -> Self {
        Self {
            deps_dir: canonical(deps_dir.to_path_buf()),
            modules: Vec::new(),
            ids: FxHashMap::default(),
            queue: VecDeque::new(),
        }
    }

    fn bundle(mut self, entry: &Path) -> Result<String, BuildError> {
        let entry_id = self.intern(canonical(entry.to_path_buf()));
        while let Some(id) = self.queue.pop_front() {
            self.load(id)?;
        }
        Ok(self.render(entry_id))
    }

    /// Module id for `path`, queueing it on first sight.
    fn intern(&mut self, path: PathBuf) -> usize {
        if let Some(&id) = self.ids.get(&path) {
            return id;
        }
        let id = self.modules.len();
        self.ids.insert(path.clone(), id);
        self.modules.push(Module {
            path,
            body: String::new(),
            deps: BTreeMap::new(),
        });
        self.queue.push_back(id);
        id
    }

    fn load(&mut self, id: usize) -> Result<(), BuildError> {
        let path = self.modules[id].path.clone();
        let raw = fs::read_to_string(&path)
            .map_err(|e| BuildError::compile(&path, format!("cannot read module: {e}")))?;
        let source = strip_preamble(&raw);
        let source = source.as_ref();

        if is_json(&path) {
            serde_json::from_str::<serde_json::Value>(source).map_err(|e| BuildError::Compile {
                location: SourceLocation::at(&path, e.line(), e.column()),
                message: e.to_string(),
            })?;
            self.modules[id].body = format!("module.exports = {};", source.trim());
            return Ok(());
        }

        let requires = scan_module(&path, source)?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for (specifier, offset) in requires {
            if self.modules[id].deps.contains_key(&specifier) {
                continue;
            }
            let target = self.resolve(&specifier, dir).ok_or_else(|| BuildError::Compile {
                location: SourceLocation::from_offset(&path, source, offset),
                message: format!("cannot resolve module `{specifier}`"),
            })?;
            let dep = self.intern(target);
            self.modules[id].deps.insert(specifier, dep);
        }

        self.modules[id].body = source.to_string();
        Ok(())
    }

    fn resolve(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        let found = if is_relative(specifier) {
            let base = from_dir.join(specifier);
            resolve_file(&base).or_else(|| resolve_dir(&base))
        } else {
            self.resolve_package(specifier, from_dir)
        };
        found.map(canonical)
    }

    fn resolve_package(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        let (package, subpath) = split_package(specifier)?;

        // nested node_modules inside the cache first, then the cache root
        let nested = from_dir
            .ancestors()
            .take_while(|dir| dir.starts_with(&self.deps_dir) && *dir != self.deps_dir.as_path())
            .map(|dir| dir.join("node_modules"));
        let roots: Vec<PathBuf> = nested.chain(std::iter::once(self.deps_dir.clone())).collect();

        roots.iter().find_map(|root| {
            let package_dir = root.join(package);
            if !package_dir.is_dir() {
                return None;
            }
            match subpath {
                Some(sub) => {
                    let base = package_dir.join(sub);
                    resolve_file(&base).or_else(|| resolve_dir(&base))
                }
                None => resolve_dir(&package_dir),
            }
        })
    }

    fn render(&self, entry: usize) -> String {
        let mut out = String::from(PRELUDE);
        for (id, module) in self.modules.iter().enumerate() {
            let deps = serde_json::to_string(&module.deps).unwrap_or_else(|_| "{}".into());
            let separator = if id + 1 < self.modules.len() { "," } else { "" };
            out.push_str(&format!(
                "{id}: [function (require, module, exports) {{\n{}\n}}, {deps}]{separator}\n",
                module.body.trim_end()
            ));
        }
        out.push_str(&format!("}}, {entry});\n"));
        out
    }
}

// ============================================================================
// Resolution helpers
// ============================================================================

#[derive(Deserialize, Default)]
struct PackageJson {
    main: Option<String>,
    browser: Option<serde_json::Value>,
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// `@scope/name/sub` -> (`@scope/name`, Some(`sub`)); `name` -> (`name`, None).
fn split_package(specifier: &str) -> Option<(&str, Option<&str>)> {
    let split_at = if specifier.starts_with('@') {
        let slash = specifier.find('/')?;
        specifier[slash + 1..].find('/').map(|i| slash + 1 + i)
    } else {
        specifier.find('/')
    };
    Some(match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..]).filter(|s| !s.is_empty())),
        None => (specifier, None),
    })
}

fn resolve_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    let name = base.file_name()?.to_string_lossy();
    ["js", "json"]
        .iter()
        .map(|ext| base.with_file_name(format!("{name}.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn resolve_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let manifest = fs::read_to_string(dir.join("package.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<PackageJson>(&s).ok())
        .unwrap_or_default();

    let browser = manifest
        .browser
        .as_ref()
        .and_then(|b| b.as_str())
        .map(str::to_string);
    if let Some(main) = browser.or(manifest.main) {
        let target = dir.join(main);
        let found = resolve_file(&target).or_else(|| resolve_index(&target));
        if found.is_some() {
            return found;
        }
    }
    resolve_index(dir)
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    ["index.js", "index.json"]
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn canonical(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

// ============================================================================
// Source scanning
// ============================================================================

/// Drop a byte-order mark and turn a `#!` line into a comment.
fn strip_preamble(raw: &str) -> Cow<'_, str> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    match raw.strip_prefix("#!") {
        Some(rest) => Cow::Owned(format!("//{rest}")),
        None => Cow::Borrowed(raw),
    }
}

/// Parse a module and collect its literal `require` specifiers with byte
/// offsets, in source order.
fn scan_module(path: &Path, source: &str) -> Result<Vec<(String, usize)>, BuildError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if let Some(error) = ret.errors.first() {
        let location = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or_else(
                || SourceLocation::file(path),
                |label| SourceLocation::from_offset(path, source, label.offset()),
            );
        return Err(BuildError::Compile {
            location,
            message: error.message.to_string(),
        });
    }

    let mut collector = RequireCollector::default();
    collector.visit_program(&ret.program);
    Ok(collector.found)
}

/// `require("...")` calls on the bare identifier with one string argument.
#[derive(Default)]
struct RequireCollector {
    found: Vec<(String, usize)>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let (Expression::Identifier(callee), [Argument::StringLiteral(specifier)]) =
            (&call.callee, &call.arguments[..])
            && callee.name == "require"
        {
            self.found.push((specifier.value.to_string(), call.span.start as usize));
        }
        walk::walk_call_expression(self, call);
    }
}
