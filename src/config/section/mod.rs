//! Configuration section definitions.
//!
//! Each module corresponds to one or more sections in `sitepipe.toml`:
//!
//! | Module    | TOML Section                                          |
//! |-----------|-------------------------------------------------------|
//! | `paths`   | `[paths]`                                             |
//! | `assets`  | `[cdn]` `[styles]` `[scripts]` `[images]` `[[copy]]` `[[vendor]]` |
//! | `pages`   | `[pages]`                                             |
//! | `publish` | `[publish.remote]` `[publish.assets]`                 |
//! | `serve`   | `[serve]`                                             |

mod assets;
mod pages;
mod paths;
mod publish;
mod serve;

pub use assets::{CdnConfig, CopyRule, ImagesConfig, ScriptsConfig, StylesConfig, VendorPackage};
pub use pages::PagesConfig;
pub use paths::PathsConfig;
pub use publish::PublishConfig;
pub use serve::ServeConfig;
