use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeprekeyConfig {
    /// Connection string of the store to migrate
    pub database: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("deprekey.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DeprekeyConfig>> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DeprekeyConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Command-line value wins over the config file
pub fn resolve_database(cli: Option<String>, config: Option<&DeprekeyConfig>) -> anyhow::Result<String> {
    cli.or_else(|| config.and_then(|c| c.database.clone()))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no database given (pass --database or set `database` in {})",
                default_config_path().display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_reads_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deprekey.toml");
        std::fs::write(&path, "database = \"sqlite://deps.db\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.database.as_deref(), Some("sqlite://deps.db"));
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = DeprekeyConfig {
            database: Some("from-file.db".to_string()),
        };
        let resolved = resolve_database(Some("from-cli.db".to_string()), Some(&config)).unwrap();
        assert_eq!(resolved, "from-cli.db");

        let resolved = resolve_database(None, Some(&config)).unwrap();
        assert_eq!(resolved, "from-file.db");

        assert!(resolve_database(None, None).is_err());
    }
}
