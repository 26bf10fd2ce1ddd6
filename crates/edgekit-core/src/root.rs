use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// File name of the shared secret file inside the functions directory.
pub const SECRETS_FILE_NAME: &str = ".env";

/// The configured functions directory.
///
/// Passed into every store at construction time. Each store operation calls
/// [`resolve`](Self::resolve) before touching the filesystem, so a missing or
/// deleted root surfaces as [`StoreError::ConfigurationMissing`] instead of a
/// stray IO error halfway through a write.
#[derive(Debug, Clone, Default)]
pub struct StoreRoot {
    dir: Option<PathBuf>,
}

impl StoreRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn from_option(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn unconfigured() -> Self {
        Self { dir: None }
    }

    pub fn configured_path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Return the root directory if it is configured and exists on disk.
    pub fn resolve(&self) -> Result<&Path, StoreError> {
        let dir = self.dir.as_deref().ok_or_else(|| {
            StoreError::ConfigurationMissing(
                "no functions directory configured (set EDGEKIT_FUNCTIONS_DIR or [functions].dir)"
                    .into(),
            )
        })?;
        if !dir.is_dir() {
            return Err(StoreError::ConfigurationMissing(format!(
                "{} does not exist or is not a directory",
                dir.display()
            )));
        }
        Ok(dir)
    }

    /// Path of the shared secret file. Resolves the root first.
    pub fn secrets_file(&self) -> Result<PathBuf, StoreError> {
        Ok(self.resolve()?.join(SECRETS_FILE_NAME))
    }
}
