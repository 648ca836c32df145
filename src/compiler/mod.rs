//! Asset compilation: Sass to CSS, CommonJS modules to one bundle.
//!
//! Both compilers write into the source tree (`css/index.css`,
//! `js/bundle.js`) so the dev server can serve them without a copy step.

pub mod scripts;
pub mod styles;

pub use scripts::{build_scripts, compile_scripts};
pub use styles::{build_styles, compile_styles};
