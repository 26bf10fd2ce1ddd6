use thiserror::Error;

/// What kind of store entry a [`StoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Function,
    Secret,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Function => f.write_str("function"),
            EntryKind::Secret => f.write_str("secret"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("functions directory not available: {0}")]
    ConfigurationMissing(String),

    #[error("invalid secret key '{0}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidKey(String),

    #[error("invalid function name '{0}': must match [A-Za-z0-9][A-Za-z0-9_-]* (max 128 chars)")]
    InvalidName(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: EntryKind, name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn function_not_found(name: &str) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Function,
            name: name.into(),
        }
    }

    pub fn secret_not_found(key: &str) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Secret,
            name: key.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
