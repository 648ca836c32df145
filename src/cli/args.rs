//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// sitepipe: static site asset pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (searched upward from the current directory)
    #[arg(short = 'C', long, default_value = "sitepipe.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run named stages or composites (with their dependencies)
    #[command(visible_alias = "r")]
    Run {
        /// Stage or composite names, e.g. `css:minify`, `js`, `publish:assets`
        #[arg(required = true, value_name = "STAGE")]
        targets: Vec<String>,

        /// Plan object-store sync without uploading or deleting
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Run every build stage (the `build` composite)
    #[command(visible_alias = "b")]
    Build,

    /// Build, then publish to the remote host and the object store
    #[command(visible_alias = "d")]
    Deploy {
        /// Plan object-store sync without uploading or deleting
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Start development server with hot reload
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable file watching for auto-rebuild
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// List stages, their dependencies and composites
    Stages,
}

impl Cli {
    /// Stage targets requested by this command (empty for `serve`/`stages`).
    pub fn targets(&self) -> Vec<String> {
        match &self.command {
            Commands::Run { targets, .. } => targets.clone(),
            Commands::Build => vec!["build".into()],
            Commands::Deploy { .. } => vec!["deploy".into()],
            Commands::Serve { .. } | Commands::Stages => Vec::new(),
        }
    }

    pub const fn dry_run(&self) -> bool {
        matches!(
            self.command,
            Commands::Run { dry_run: true, .. } | Commands::Deploy { dry_run: true }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_targets() {
        let cli = Cli::parse_from(["sitepipe", "run", "css", "publish:assets", "--dry-run"]);
        assert_eq!(cli.targets(), vec!["css".to_string(), "publish:assets".to_string()]);
        assert!(cli.dry_run());
        assert_eq!(cli.config, PathBuf::from("sitepipe.toml"));
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::parse_from(["sitepipe", "-V", "deploy"]);
        assert_eq!(cli.targets(), vec!["deploy".to_string()]);
        assert!(!cli.dry_run());
        assert!(cli.verbose);
    }

    #[test]
    fn test_run_requires_target() {
        assert!(Cli::try_parse_from(["sitepipe", "run"]).is_err());
    }

    #[test]
    fn test_parse_serve_options() {
        let cli = Cli::parse_from(["sitepipe", "serve", "--port", "8080", "--watch", "false"]);
        match cli.command {
            Commands::Serve { port, watch, interface } => {
                assert_eq!(port, Some(8080));
                assert_eq!(watch, Some(false));
                assert_eq!(interface, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
