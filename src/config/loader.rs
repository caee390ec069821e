use crate::config::schema::{AppConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let config = Self::load_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise starts from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(AppConfig::default()),
        }
    }

    fn load_file(path: &Path) -> Result<AppConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let config: AppConfig = serde_json::from_str(&content)?;
                Ok(config)
            }
            Some("yaml") | Some("yml") => {
                let config: AppConfig = serde_yaml::from_str(&content)?;
                Ok(config)
            }
            Some("toml") => {
                let config: AppConfig = toml::from_str(&content)?;
                Ok(config)
            }
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    /// Applies command-line overrides and re-validates.
    pub fn apply_overrides(
        mut config: AppConfig,
        webhook_url: Option<String>,
        state_path: Option<&Path>,
    ) -> Result<AppConfig> {
        if let Some(url) = webhook_url {
            config.webhook.url = url;
        }
        if let Some(path) = state_path {
            let ext = path.extension().and_then(|ext| ext.to_str());
            let path = path.display().to_string();
            config.storage = match ext {
                Some("db") | Some("sqlite") | Some("sqlite3") => StorageConfig::Sqlite { path },
                _ => StorageConfig::Json { path },
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match storage {
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
            StorageConfig::Json { path } => Arc::new(JsonFileStore::open(path)?),
            StorageConfig::Sqlite { path } => Arc::new(SqliteStore::open(path).await?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "radar.json", "{}");
        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.webhook.timeout_ms, 120_000);
        assert_eq!(config.webhook.rate_limit_cooldown_secs, 86_400);
        assert_eq!(config.limits.min_request_interval_ms, 3_600_000);
        assert_eq!(config.ui.copied_indicator_ms, 2_000);
    }

    #[test]
    fn loads_yaml_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_config(
            &dir,
            "radar.yaml",
            "webhook:\n  url: http://localhost:9000/hook\n  timeout_ms: 5000\nstorage:\n  type: memory\n",
        );
        let config = ConfigLoader::load(&yaml).unwrap();
        assert_eq!(config.webhook.url, "http://localhost:9000/hook");
        assert_eq!(config.webhook.timeout_ms, 5000);
        assert!(matches!(config.storage, StorageConfig::Memory));

        let toml = write_config(
            &dir,
            "radar.toml",
            "[limits]\nmin_request_interval_ms = 60000\n\n[storage]\ntype = \"sqlite\"\npath = \"state.db\"\n",
        );
        let config = ConfigLoader::load(&toml).unwrap();
        assert_eq!(config.limits.min_request_interval_ms, 60_000);
        assert!(matches!(config.storage, StorageConfig::Sqlite { ref path } if path == "state.db"));
    }

    #[test]
    fn rejects_invalid_url_and_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "radar.json", r#"{"webhook":{"url":"not a url"}}"#);
        assert!(matches!(ConfigLoader::load(&path), Err(Error::Validation(_))));

        let path = write_config(&dir, "radar.ini", "");
        assert!(matches!(ConfigLoader::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn state_override_picks_backend_by_extension() {
        let config = ConfigLoader::apply_overrides(
            AppConfig::default(),
            None,
            Some(Path::new("/tmp/radar.db")),
        )
        .unwrap();
        assert!(matches!(config.storage, StorageConfig::Sqlite { .. }));

        let config = ConfigLoader::apply_overrides(
            AppConfig::default(),
            Some("http://127.0.0.1:8080/hook".into()),
            Some(Path::new("/tmp/radar.json")),
        )
        .unwrap();
        assert_eq!(config.webhook.url, "http://127.0.0.1:8080/hook");
        assert!(matches!(config.storage, StorageConfig::Json { .. }));
    }
}
