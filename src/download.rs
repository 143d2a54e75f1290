//! Materializes a fetched archive payload into a user-facing file.
//!
//! The payload is staged to a `.part` file next to the final target and
//! promoted with a rename. The staging file is the one transient resource
//! this crate allocates per download; a drop guard removes it on every exit
//! path that does not promote it, so repeated or interrupted downloads never
//! accumulate partial files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::api::ApiError;

/// Removes the staging file on drop unless the write was promoted.
struct PartGuard {
    path: PathBuf,
    armed: bool,
}

impl PartGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartGuard {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staging file");
            }
        }
    }
}

/// Saves archive payloads under a target directory.
pub struct Materializer {
    dir: PathBuf,
}

impl Materializer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Write `payload` as `filename` inside the target directory and return
    /// the final path. The filename is reduced to its base name so a
    /// server-supplied name cannot escape the directory.
    pub fn save(&self, payload: &[u8], filename: &str) -> Result<PathBuf, ApiError> {
        let name = Self::sanitize(filename)?;
        std::fs::create_dir_all(&self.dir)?;

        let target = self.dir.join(&name);
        let staging = self.dir.join(format!("{name}.part"));

        let mut guard = PartGuard::new(staging.clone());
        std::fs::write(&staging, payload)?;
        std::fs::rename(&staging, &target)?;
        guard.disarm();

        debug!(path = %target.display(), bytes = payload.len(), "Archive saved");
        Ok(target)
    }

    /// Base name of a server-supplied filename, rejecting names that reduce
    /// to nothing ("", ".", "..", trailing separators).
    fn sanitize(filename: &str) -> Result<String, ApiError> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && *n != "." && *n != "..")
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("Unusable archive filename: {filename:?}"))
            })?;
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_writes_file_and_removes_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = Materializer::new(dir.path().to_path_buf());

        let path = materializer
            .save(b"tar bytes", "gnss_data_2024.tar.gz")
            .expect("save");

        assert_eq!(std::fs::read(&path).expect("read back"), b"tar bytes");
        assert!(!dir.path().join("gnss_data_2024.tar.gz.part").exists());
    }

    #[test]
    fn save_strips_directory_components() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = Materializer::new(dir.path().to_path_buf());

        let path = materializer
            .save(b"x", "../../etc/archive.tar.gz")
            .expect("save");

        assert_eq!(path, dir.path().join("archive.tar.gz"));
    }

    #[test]
    fn save_rejects_empty_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = Materializer::new(dir.path().to_path_buf());

        assert!(matches!(
            materializer.save(b"x", ".."),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn failed_promotion_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = Materializer::new(dir.path().to_path_buf());

        // Occupy the target with a non-empty directory so the rename fails.
        let target = dir.path().join("archive.tar.gz");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("occupied"), b"y").expect("occupy");

        let result = materializer.save(b"payload", "archive.tar.gz");
        assert!(result.is_err());
        assert!(!dir.path().join("archive.tar.gz.part").exists());
    }
}
