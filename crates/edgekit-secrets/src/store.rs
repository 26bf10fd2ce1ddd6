use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use edgekit_core::{StoreError, StoreRoot};
use edgekit_runtime::RuntimeController;
use regex::Regex;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::envfile::{self, EnvMap};

/// Character used to hide secret values in listings.
pub const MASK_CHAR: char = '*';
/// Most mask characters shown for a single value, regardless of its length.
pub const MAX_MASK_LEN: usize = 20;
const VISIBLE_PREFIX: usize = 3;

static SECRET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("secret key pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOutcome {
    pub action: SetAction,
    /// Whether the edge runtime restarted. `false` means the secret is saved
    /// but running functions may still see the old value.
    pub restarted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub restarted: bool,
}

/// A secret as shown to callers: never the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedSecret {
    pub key: String,
    pub masked_value: String,
    /// Length of the real value in characters.
    pub length: usize,
}

/// Read-modify-write store over the shared `.env` file in the functions
/// directory.
///
/// Nothing is cached: every operation re-reads the file. Mutations are
/// serialized by an in-process lock and written through a uniquely named
/// temp file plus rename, so concurrent writers from other processes can
/// lose an update but never leave a partial file. The runtime restart happens after the lock is released.
pub struct SecretStore {
    root: StoreRoot,
    runtime: Arc<dyn RuntimeController>,
    write_lock: Mutex<()>,
}

impl SecretStore {
    pub fn new(root: StoreRoot, runtime: Arc<dyn RuntimeController>) -> Self {
        Self {
            root,
            runtime,
            write_lock: Mutex::new(()),
        }
    }

    /// Create or update a secret, then restart the runtime.
    pub async fn set(&self, key: &str, value: &str) -> Result<SetOutcome, StoreError> {
        validate_secret_key(key)?;
        let path = self.root.secrets_file()?;

        let action = {
            let _guard = self.write_lock.lock().await;
            let mut secrets = read_secrets(&path).await?.unwrap_or_default();
            let action = match secrets.insert(key.to_string(), value.to_string()) {
                Some(_) => SetAction::Updated,
                None => SetAction::Created,
            };
            write_atomic(&path, &envfile::serialize(&secrets)).await?;
            action
        };

        tracing::info!(key = %key, action = ?action, "Secret saved");
        let restarted = self.runtime.restart().await;
        Ok(SetOutcome { action, restarted })
    }

    /// Remove a secret, then restart the runtime.
    pub async fn delete(&self, key: &str) -> Result<DeleteOutcome, StoreError> {
        validate_secret_key(key)?;
        let path = self.root.secrets_file()?;

        {
            let _guard = self.write_lock.lock().await;
            let mut secrets = read_secrets(&path)
                .await?
                .ok_or_else(|| StoreError::secret_not_found(key))?;
            if secrets.shift_remove(key).is_none() {
                return Err(StoreError::secret_not_found(key));
            }
            write_atomic(&path, &envfile::serialize(&secrets)).await?;
        }

        tracing::info!(key = %key, "Secret deleted");
        let restarted = self.runtime.restart().await;
        Ok(DeleteOutcome { restarted })
    }

    /// List every secret with its value masked. A missing file is an empty list.
    pub async fn list(&self) -> Result<Vec<MaskedSecret>, StoreError> {
        let path = self.root.secrets_file()?;
        let secrets = read_secrets(&path).await?.unwrap_or_default();
        Ok(secrets
            .iter()
            .map(|(key, value)| MaskedSecret {
                key: key.clone(),
                masked_value: mask_value(value),
                length: value.chars().count(),
            })
            .collect())
    }

    /// Secret names only, in file order.
    pub async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let path = self.root.secrets_file()?;
        let secrets = read_secrets(&path).await?.unwrap_or_default();
        Ok(secrets.into_keys().collect())
    }

    pub fn secrets_file(&self) -> Result<PathBuf, StoreError> {
        self.root.secrets_file()
    }
}

pub fn validate_secret_key(key: &str) -> Result<(), StoreError> {
    if SECRET_KEY.is_match(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.into()))
    }
}

/// Show at most the first three characters, and only for values longer than
/// three characters. The rest becomes [`MASK_CHAR`], capped at [`MAX_MASK_LEN`].
pub fn mask_value(value: &str) -> String {
    let length = value.chars().count();
    let visible = if length > VISIBLE_PREFIX {
        VISIBLE_PREFIX
    } else {
        0
    };
    let mut masked: String = value.chars().take(visible).collect();
    masked.extend(std::iter::repeat_n(
        MASK_CHAR,
        (length - visible).min(MAX_MASK_LEN),
    ));
    masked
}

/// `Ok(None)` when the file does not exist.
async fn read_secrets(path: &Path) -> Result<Option<EnvMap>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(envfile::parse(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write `content` to a uniquely named temp file next to `path`, sync it,
/// and rename it into place. An existing file's permissions are kept; a new
/// file is created owner-only.
async fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let path = path.to_path_buf();
    let content = content.to_owned();
    tokio::task::spawn_blocking(move || persist_secrets(&path, &content))
        .await
        .map_err(std::io::Error::other)??;
    Ok(())
}

fn persist_secrets(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".env.")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    match std::fs::metadata(path) {
        Ok(existing) => tmp.as_file().set_permissions(existing.permissions())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
