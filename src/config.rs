use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VersegraphConfig {
    /// Default snapshot bundle path
    pub snapshot: Option<String>,
    /// Upper bound on trace depth (default 6)
    pub max_trace_depth: Option<usize>,
    /// Fraction of bad blocks above which a parse pass aborts (default 0.2)
    pub max_error_ratio: Option<f64>,
    /// Error density is only enforced after this many errors (default 10)
    pub min_fatal_errors: Option<usize>,
    /// Parse worker threads; defaults to available parallelism
    pub workers: Option<usize>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("versegraph.toml")
}

pub fn default_snapshot_path_in(base: &Path) -> PathBuf {
    base.join(".versegraph").join("corpus.vgsnap")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<VersegraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: VersegraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &VersegraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_snapshot_dir(snapshot_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = snapshot_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versegraph.toml");
        assert!(load_config(Some(&path)).unwrap().is_none());
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versegraph.toml");

        let config = VersegraphConfig {
            snapshot: Some("corpus.vgsnap".to_string()),
            max_trace_depth: Some(4),
            ..Default::default()
        };
        write_config(&path, &config, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.snapshot.as_deref(), Some("corpus.vgsnap"));
        assert_eq!(loaded.max_trace_depth, Some(4));
        assert!(loaded.max_error_ratio.is_none());
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versegraph.toml");

        let config = VersegraphConfig::default();
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        assert!(write_config(&path, &config, true).is_ok());
    }
}
