use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, DataConfig};
use crate::difficulty::LookupTables;
use crate::error::{Result, RubigeneError};
use crate::file_utils::FileManager;

/// Working directory layout under `.rubigene/`.
pub struct SetupManager {
    rubigene_dir: PathBuf,
}

/// Presence of one lookup table file
#[derive(Debug, Clone)]
pub struct TableStatus {
    pub name: &'static str,
    pub path: PathBuf,
    pub exists: bool,
}

impl SetupManager {
    pub fn new() -> Result<Self> {
        Self::with_root(".rubigene")
    }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Result<Self> {
        let rubigene_dir = root.as_ref().to_path_buf();

        FileManager::ensure_dir(rubigene_dir.join("log"))?;
        FileManager::ensure_dir(rubigene_dir.join("cache").join("translations"))?;

        Ok(Self { rubigene_dir })
    }

    pub fn rubigene_dir(&self) -> &Path {
        &self.rubigene_dir
    }

    pub fn log_dir(&self) -> PathBuf {
        self.rubigene_dir.join("log")
    }

    /// Verify the configured data files and load them.
    ///
    /// Every missing file is reported before failing, so one run shows the full picture.
    pub fn initialize(&self, config: &Config) -> Result<Arc<LookupTables>> {
        info!("Checking lookup tables...");
        let missing: Vec<TableStatus> = self
            .table_status(&config.data)
            .into_iter()
            .filter(|status| !status.exists)
            .collect();

        if !missing.is_empty() {
            for status in &missing {
                warn!("{} table missing: {}", status.name, status.path.display());
            }
            return Err(RubigeneError::LookupTable(format!(
                "missing lookup tables: {}",
                missing
                    .iter()
                    .map(|s| s.path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        FileManager::ensure_dir(&config.translate.cache_dir)?;
        let tables = LookupTables::load(&config.data)?;
        info!("Initialization completed successfully");
        Ok(Arc::new(tables))
    }

    pub fn table_status(&self, data: &DataConfig) -> Vec<TableStatus> {
        [
            ("NGSL", &data.ngsl_path),
            ("CEFR", &data.cefr_path),
            ("frequency", &data.frequency_path),
        ]
        .into_iter()
        .map(|(name, path)| TableStatus {
            name,
            path: path.clone(),
            exists: path.is_file(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_created() {
        let dir = tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path().join(".rubigene")).unwrap();
        assert!(setup.log_dir().is_dir());
        assert!(setup.rubigene_dir().join("cache").join("translations").is_dir());
    }

    #[test]
    fn test_initialize_reports_missing_tables() {
        let dir = tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path().join(".rubigene")).unwrap();
        let mut config = Config::default();
        config.data = DataConfig {
            ngsl_path: dir.path().join("ngsl.csv"),
            cefr_path: dir.path().join("cefr.csv"),
            frequency_path: dir.path().join("frequency.json"),
        };
        std::fs::write(&config.data.ngsl_path, "the,1\n").unwrap();

        let err = setup.initialize(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cefr.csv"));
        assert!(message.contains("frequency.json"));
        assert!(!message.contains("ngsl.csv"));
    }

    #[test]
    fn test_initialize_loads_tables() {
        let dir = tempdir().unwrap();
        let setup = SetupManager::with_root(dir.path().join(".rubigene")).unwrap();
        let mut config = Config::default();
        config.translate.cache_dir = dir.path().join("cache");
        config.data = DataConfig {
            ngsl_path: dir.path().join("ngsl.csv"),
            cefr_path: dir.path().join("cefr.csv"),
            frequency_path: dir.path().join("frequency.json"),
        };
        std::fs::write(&config.data.ngsl_path, "the,1\n").unwrap();
        std::fs::write(&config.data.cefr_path, "dawn,B2\n").unwrap();
        std::fs::write(&config.data.frequency_path, r#"{"dawn": 4100}"#).unwrap();

        let tables = setup.initialize(&config).unwrap();
        assert_eq!(tables.sizes(), (1, 1, 1));
        assert!(config.translate.cache_dir.is_dir());
    }
}
