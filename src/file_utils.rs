use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{Result, RubigeneError};

/// File and directory helpers shared by the cache, the writers and batch mode.
pub struct FileManager;

impl FileManager {
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Files under `dir` with extension `extension` (case-insensitive), sorted by path.
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let extension = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.map_err(|e| RubigeneError::Io(e.into()))?;
            let path = entry.path();

            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// `<output_dir>/<stem><suffix>.<extension>`; the input's directory when `output_dir` is `None`.
    pub fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str, extension: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        dir.join(format!("{}{}.{}", stem, suffix, extension))
    }

    /// Replace `path` with `content` so readers see either the old or the new file.
    ///
    /// The data goes to a temporary file in the same directory, is flushed to
    /// disk and then renamed over the target.
    pub async fn write_atomic(path: &Path, content: Vec<u8>) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::write_atomic_blocking(&path, &content))
            .await
            .map_err(|e| RubigeneError::Io(std::io::Error::other(e)))?
    }

    pub fn write_atomic_blocking(path: &Path, content: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| RubigeneError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("entry.json");

        FileManager::write_atomic(&path, b"first".to_vec()).await.unwrap();
        FileManager::write_atomic(&path, b"second".to_vec()).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        // no temporary files are left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_find_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("season1")).unwrap();
        fs::write(dir.path().join("b.srt"), "").unwrap();
        fs::write(dir.path().join("season1").join("a.SRT"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = FileManager::find_files(dir.path(), ".srt").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("/videos/film.en.srt");
        assert_eq!(
            FileManager::output_path(input, None, "_ruby", "ass"),
            PathBuf::from("/videos/film.en_ruby.ass")
        );
        assert_eq!(
            FileManager::output_path(input, Some(Path::new("/out")), "", "ass"),
            PathBuf::from("/out/film.en.ass")
        );
    }
}
