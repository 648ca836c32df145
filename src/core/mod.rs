//! Core types shared across the codebase.

mod artifact;
mod state;

pub use artifact::{ArtifactLedger, ArtifactTag, BuildArtifact};
pub use state::{INTERRUPTED_EXIT, is_shutdown, register_server, setup_shutdown_handler};
