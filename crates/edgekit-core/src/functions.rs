use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::root::StoreRoot;

pub const IMPORT_MAP_FILE_NAME: &str = "import_map.json";

const DEPLOY_NOTE: &str = "The edge runtime watches the functions directory and picks up \
                           the new source automatically; no restart is required.";

static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("function name pattern is valid")
});

/// Module alias → resolution URL.
pub type ImportMap = BTreeMap<String, String>;

/// On-disk shape of `import_map.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ImportMapFile {
    #[serde(default)]
    imports: ImportMap,
}

/// Input to [`FunctionStore::deploy`].
#[derive(Debug, Clone)]
pub struct FunctionDeploy {
    pub name: String,
    pub source: String,
    pub import_map: Option<ImportMap>,
    /// Advisory only; the store records nothing and enforces nothing.
    pub verify_jwt: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub path: PathBuf,
    #[serde(rename = "verifyJWT")]
    pub verify_jwt: bool,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub name: String,
    pub has_index: bool,
    pub has_import_map: bool,
    /// `None` when the directory has no source file (or it vanished mid-listing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionArtifact {
    pub name: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_map: Option<ImportMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Filesystem-backed registry of deployed edge functions.
///
/// Directory layout under the store root:
/// ```text
/// root/
///   .env                 -- shared secrets (owned by the secret store)
///   <function_name>/
///     index.<ext>        -- function source
///     import_map.json    -- optional {"imports": {alias: url}}
/// ```
///
/// Writes are whole-file overwrites with no rollback. A failed deploy may
/// leave the directory behind; deploying again is the recovery path.
pub struct FunctionStore {
    root: StoreRoot,
    source_file_name: String,
}

impl FunctionStore {
    pub fn new(root: StoreRoot, source_ext: &str) -> Self {
        Self {
            root,
            source_file_name: format!("index.{source_ext}"),
        }
    }

    pub fn source_file_name(&self) -> &str {
        &self.source_file_name
    }

    /// Create or overwrite a function.
    ///
    /// The import map is only written when one is supplied and non-empty; an
    /// existing `import_map.json` is left in place otherwise.
    pub async fn deploy(&self, request: FunctionDeploy) -> Result<DeployOutcome, StoreError> {
        validate_function_name(&request.name)?;
        let function_dir = self.root.resolve()?.join(&request.name);

        tokio::fs::create_dir_all(&function_dir).await?;
        tokio::fs::write(function_dir.join(&self.source_file_name), &request.source).await?;

        let mut wrote_import_map = false;
        if let Some(imports) = request.import_map.filter(|m| !m.is_empty()) {
            let content = serde_json::to_string_pretty(&ImportMapFile { imports })?;
            tokio::fs::write(function_dir.join(IMPORT_MAP_FILE_NAME), content).await?;
            wrote_import_map = true;
        }

        tracing::info!(
            function = %request.name,
            path = %function_dir.display(),
            import_map = wrote_import_map,
            "Function deployed"
        );

        Ok(DeployOutcome {
            path: function_dir,
            verify_jwt: request.verify_jwt.unwrap_or(true),
            note: DEPLOY_NOTE.into(),
        })
    }

    /// List every function directory, sorted by name.
    ///
    /// Plain files (such as `.env`) and hidden directories are skipped.
    pub async fn list(&self) -> Result<Vec<FunctionSummary>, StoreError> {
        let root = self.root.resolve()?;
        let mut functions = Vec::new();

        let mut entries = tokio::fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !path.is_dir() {
                continue;
            }

            let index_path = path.join(&self.source_file_name);
            functions.push(FunctionSummary {
                has_index: index_path.is_file(),
                has_import_map: path.join(IMPORT_MAP_FILE_NAME).is_file(),
                updated_at: modified_at(&index_path).await,
                name,
            });
        }

        functions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(functions)
    }

    /// Read back a deployed function's source and import map.
    pub async fn get(&self, name: &str) -> Result<FunctionArtifact, StoreError> {
        validate_function_name(name)?;
        let function_dir = self.root.resolve()?.join(name);
        let index_path = function_dir.join(&self.source_file_name);

        if !index_path.is_file() {
            return Err(StoreError::function_not_found(name));
        }

        let source = tokio::fs::read_to_string(&index_path).await?;
        let import_map_path = function_dir.join(IMPORT_MAP_FILE_NAME);
        let import_map = if import_map_path.is_file() {
            let content = tokio::fs::read_to_string(&import_map_path).await?;
            let file: ImportMapFile = serde_json::from_str(&content)?;
            Some(file.imports)
        } else {
            None
        };

        Ok(FunctionArtifact {
            name: name.into(),
            source,
            import_map,
            updated_at: modified_at(&index_path).await,
        })
    }

    /// Remove a function directory and everything in it.
    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_function_name(name)?;
        let function_dir = self.root.resolve()?.join(name);

        if !function_dir.is_dir() {
            return Err(StoreError::function_not_found(name));
        }

        tokio::fs::remove_dir_all(&function_dir).await?;
        tracing::info!(function = %name, path = %function_dir.display(), "Function deleted");
        Ok(())
    }
}

/// Reject names that are not a single safe path segment.
pub fn validate_function_name(name: &str) -> Result<(), StoreError> {
    if FUNCTION_NAME.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.into()))
    }
}

async fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (FunctionStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FunctionStore::new(StoreRoot::new(dir.path()), "ts");
        (store, dir)
    }

    fn deploy_request(name: &str, source: &str) -> FunctionDeploy {
        FunctionDeploy {
            name: name.into(),
            source: source.into(),
            import_map: None,
            verify_jwt: None,
        }
    }

    fn imports(pairs: &[(&str, &str)]) -> ImportMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn deploy_writes_source_and_defaults_verify_jwt() {
        let (store, dir) = temp_store();

        let outcome = store
            .deploy(deploy_request("hello", "Deno.serve(() => new Response('hi'))"))
            .await
            .unwrap();

        assert_eq!(outcome.path, dir.path().join("hello"));
        assert!(outcome.verify_jwt);
        assert!(!outcome.note.is_empty());
        let source = std::fs::read_to_string(dir.path().join("hello/index.ts")).unwrap();
        assert_eq!(source, "Deno.serve(() => new Response('hi'))");
        assert!(!dir.path().join("hello").join(IMPORT_MAP_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn deploy_respects_explicit_verify_jwt() {
        let (store, _dir) = temp_store();
        let mut request = deploy_request("public", "x");
        request.verify_jwt = Some(false);
        let outcome = store.deploy(request).await.unwrap();
        assert!(!outcome.verify_jwt);
    }

    #[tokio::test]
    async fn deploy_writes_pretty_import_map() {
        let (store, dir) = temp_store();
        let mut request = deploy_request("with_map", "import x from 'std'");
        request.import_map = Some(imports(&[("std", "https://deno.land/std@0.224.0/")]));
        store.deploy(request).await.unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("with_map").join(IMPORT_MAP_FILE_NAME))
                .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["imports"]["std"], "https://deno.land/std@0.224.0/");
        assert!(content.contains('\n'), "import map should be pretty-printed");
    }

    #[tokio::test]
    async fn empty_import_map_is_not_written() {
        let (store, dir) = temp_store();
        let mut request = deploy_request("empty_map", "x");
        request.import_map = Some(ImportMap::new());
        store.deploy(request).await.unwrap();
        assert!(!dir.path().join("empty_map").join(IMPORT_MAP_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn redeploy_overwrites_source_and_keeps_import_map() {
        let (store, dir) = temp_store();

        let mut first = deploy_request("fn1", "v1");
        first.import_map = Some(imports(&[("lib", "https://esm.sh/lib")]));
        store.deploy(first).await.unwrap();

        store.deploy(deploy_request("fn1", "v2")).await.unwrap();

        let source = std::fs::read_to_string(dir.path().join("fn1/index.ts")).unwrap();
        assert_eq!(source, "v2");
        assert!(dir.path().join("fn1").join(IMPORT_MAP_FILE_NAME).is_file());

        let artifact = store.get("fn1").await.unwrap();
        assert_eq!(
            artifact.import_map.unwrap().get("lib").map(String::as_str),
            Some("https://esm.sh/lib")
        );
    }

    #[tokio::test]
    async fn list_reports_functions_sorted_and_skips_env_file() {
        let (store, dir) = temp_store();
        std::fs::write(dir.path().join(".env"), "A=1\n").unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();

        store.deploy(deploy_request("beta", "b")).await.unwrap();
        let mut alpha = deploy_request("alpha", "a");
        alpha.import_map = Some(imports(&[("x", "https://x")]));
        store.deploy(alpha).await.unwrap();

        let functions = store.list().await.unwrap();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(functions[0].has_index);
        assert!(functions[0].has_import_map);
        assert!(functions[0].updated_at.is_some());
        assert!(!functions[1].has_import_map);
    }

    #[tokio::test]
    async fn list_includes_directory_without_source() {
        let (store, dir) = temp_store();
        std::fs::create_dir(dir.path().join("orphan")).unwrap();

        let functions = store.list().await.unwrap();
        assert_eq!(
            functions,
            vec![FunctionSummary {
                name: "orphan".into(),
                has_index: false,
                has_import_map: false,
                updated_at: None,
            }]
        );

        let json = serde_json::to_value(&functions[0]).unwrap();
        assert!(json.get("updatedAt").is_none());
        assert_eq!(json["hasIndex"], false);
    }

    #[tokio::test]
    async fn delete_then_list_and_second_delete_fails() {
        let (store, dir) = temp_store();
        store.deploy(deploy_request("f", "x")).await.unwrap();

        store.delete("f").await.unwrap();
        assert!(!dir.path().join("f").exists());
        assert!(store.list().await.unwrap().is_empty());

        let err = store.delete("f").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_missing_function_is_not_found() {
        let (store, _dir) = temp_store();
        let err = store.get("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(err.to_string(), "function not found: ghost");
    }

    #[tokio::test]
    async fn rejects_unsafe_names_before_touching_disk() {
        let (store, dir) = temp_store();
        for name in ["", "..", ".env", "a/b", "../escape", "-leading", "has space"] {
            let err = store.deploy(deploy_request(name, "x")).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{name:?} should be rejected");
        }
        assert!(matches!(
            store.delete("../").await,
            Err(StoreError::InvalidName(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_root_fails_every_operation() {
        let store = FunctionStore::new(StoreRoot::unconfigured(), "ts");
        assert!(matches!(
            store.deploy(deploy_request("f", "x")).await,
            Err(StoreError::ConfigurationMissing(_))
        ));
        assert!(matches!(
            store.list().await,
            Err(StoreError::ConfigurationMissing(_))
        ));
        assert!(matches!(
            store.delete("f").await,
            Err(StoreError::ConfigurationMissing(_))
        ));

        let gone = TempDir::new().unwrap();
        let path = gone.path().to_path_buf();
        drop(gone);
        let store = FunctionStore::new(StoreRoot::new(&path), "ts");
        assert!(matches!(
            store.deploy(deploy_request("f", "x")).await,
            Err(StoreError::ConfigurationMissing(_))
        ));
        assert!(!path.exists(), "deploy must not recreate a missing root");
    }

    #[tokio::test]
    async fn custom_source_extension() {
        let dir = TempDir::new().unwrap();
        let store = FunctionStore::new(StoreRoot::new(dir.path()), "js");
        store.deploy(deploy_request("plain", "export {}")).await.unwrap();
        assert!(dir.path().join("plain/index.js").is_file());
        assert!(store.list().await.unwrap()[0].has_index);
    }
}
