use crate::config::StorageConfig;
use crate::error::AttendanceError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Filesystem home of reference images plus the scratch area for probe images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    faces_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl ImageStore {
    pub fn new(faces_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            faces_dir: faces_dir.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn from_config(cfg: &StorageConfig) -> Self {
        let scratch = cfg.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        Self::new(cfg.faces_dir.clone(), scratch)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.faces_dir).await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await
    }

    /// Where the reference image of `student_id` lives.
    pub fn reference_path(&self, student_id: &str) -> Result<PathBuf, AttendanceError> {
        validate_student_id(student_id)?;
        Ok(self.faces_dir.join(format!("{student_id}.jpg")))
    }

    pub async fn save_reference(
        &self,
        student_id: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, AttendanceError> {
        let path = self.reference_path(student_id)?;
        tokio::fs::create_dir_all(&self.faces_dir).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "reference image stored");
        Ok(path)
    }

    /// Remove a reference image. A missing file is not an error; returns whether
    /// anything was removed.
    pub async fn remove_reference(&self, path: &Path) -> Result<bool, AttendanceError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a probe image to the scratch dir. The file is deleted when the
    /// returned handle drops.
    pub fn write_probe(&self, bytes: &[u8]) -> Result<NamedTempFile, AttendanceError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("probe-")
            .suffix(".jpg")
            .tempfile_in(&self.scratch_dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }
}

/// Student ids double as file names, so they must stay a single path component.
pub fn validate_student_id(student_id: &str) -> Result<(), AttendanceError> {
    let invalid = student_id.trim().is_empty()
        || student_id != student_id.trim()
        || student_id == "."
        || student_id == ".."
        || student_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(AttendanceError::Validation(format!(
            "invalid student_id `{student_id}`"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_ids_must_be_single_path_components() {
        for ok in ["S-001", "2024.17", "a b"] {
            assert!(validate_student_id(ok).is_ok(), "{ok}");
        }
        for bad in ["", "  ", "..", ".", "../etc", "a/b", "a\\b", " s1"] {
            assert!(validate_student_id(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn probe_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path().join("faces"), dir.path().join("scratch"));

        let probe = store.write_probe(b"probe-bytes").expect("write probe");
        let path = probe.path().to_path_buf();
        assert_eq!(std::fs::read(&path).expect("read probe"), b"probe-bytes");

        drop(probe);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn removing_missing_reference_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path().join("faces"), dir.path().join("scratch"));

        let path = store.save_reference("s1", b"jpeg").await.expect("save");
        assert_eq!(path, dir.path().join("faces").join("s1.jpg"));
        assert!(store.remove_reference(&path).await.expect("first remove"));
        assert!(!store.remove_reference(&path).await.expect("second remove"));
    }
}
