//! Core building blocks for edgekit.
//!
//! - [`config`]: `edgekit.toml` loading with `EDGEKIT_*` environment overrides
//! - [`root`]: the configured functions directory, checked before every store operation
//! - [`functions`]: the filesystem-backed edge function store

pub mod config;
pub mod error;
pub mod functions;
pub mod root;

pub use config::EdgekitConfig;
pub use error::{ConfigError, EntryKind, StoreError};
pub use functions::{FunctionDeploy, FunctionStore, ImportMap};
pub use root::StoreRoot;
