//! Shared utilities.

pub mod exec;
pub mod fs;
pub mod glob;
pub mod hash;
pub mod mime;
