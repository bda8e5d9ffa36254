//! Archive extraction, shelled out to the packaging tools.
//!
//! The work directory is owned by a single run: it is removed and recreated
//! at the start of every run that doesn't skip, so stale artifacts from an
//! earlier version can never leak into a scan.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::command::{self, CommandError};
use crate::types::PackageManager;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(
        "{path} is not a valid {kind} archive: {detail}. \
         The downloaded artifact is corrupt or mislabeled; the next scheduled run will re-fetch it"
    )]
    BadArchive {
        path: PathBuf,
        kind: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to prepare work directory {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Remove any prior run's contents and recreate the directory.
pub fn prepare_workdir(dir: &Path) -> Result<(), ExtractError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ExtractError::Workdir {
                path: dir.to_path_buf(),
                source,
            })
        }
    }
    std::fs::create_dir_all(dir).map_err(|source| ExtractError::Workdir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Extract `archive` into `dest` with the tool matching the package format.
pub async fn extract(
    archive: &Path,
    dest: &Path,
    package_manager: PackageManager,
) -> Result<(), ExtractError> {
    std::fs::create_dir_all(dest).map_err(|source| ExtractError::Workdir {
        path: dest.to_path_buf(),
        source,
    })?;

    let archive_str = archive.to_string_lossy().into_owned();
    let dest_str = dest.to_string_lossy().into_owned();

    let result = match package_manager {
        PackageManager::Deb => {
            command::run_checked("dpkg-deb", &["-x", &archive_str, &dest_str], &[]).await
        }
        // bsdtar reads rpm payloads directly, no rpm2cpio pipeline needed.
        PackageManager::Rpm => {
            command::run_checked("bsdtar", &["-x", "-f", &archive_str, "-C", &dest_str], &[]).await
        }
        PackageManager::Tar => {
            command::run_checked("tar", &["-xzf", &archive_str, "-C", &dest_str], &[]).await
        }
    };

    match result {
        Ok(_) => Ok(()),
        Err(CommandError::Failed { stderr, .. }) if is_bad_archive_output(&stderr) => {
            Err(ExtractError::BadArchive {
                path: archive.to_path_buf(),
                kind: package_manager.as_str(),
                detail: stderr.trim().to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Archive-signature failures from dpkg-deb/tar, as opposed to e.g. a full
/// disk.
fn is_bad_archive_output(stderr: &str) -> bool {
    let text = stderr.to_ascii_lowercase();
    text.contains("not a debian format archive")
        || text.contains("does not look like a tar archive")
        || text.contains("unrecognized archive format")
        || text.contains("file is not an archive")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_workdir_clears_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("work");
        std::fs::create_dir_all(workdir.join("old")).unwrap();
        std::fs::write(workdir.join("old/stale.deb"), "stale").unwrap();

        prepare_workdir(&workdir).unwrap();
        assert!(workdir.exists());
        assert!(!workdir.join("old").exists());
    }

    #[test]
    fn test_prepare_workdir_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("does/not/exist/yet");
        prepare_workdir(&workdir).unwrap();
        assert!(workdir.exists());
    }

    #[test]
    fn test_bad_archive_detection() {
        assert!(is_bad_archive_output(
            "dpkg-deb: error: 'x.deb' is not a Debian format archive"
        ));
        assert!(is_bad_archive_output(
            "tar: This does not look like a tar archive"
        ));
        assert!(is_bad_archive_output("bsdtar: Unrecognized archive format"));
        assert!(!is_bad_archive_output("tar: no space left on device"));
    }

    #[tokio::test]
    async fn test_extract_bad_deb_classified() {
        // Requires dpkg-deb; skip quietly where it isn't installed.
        if command::run("dpkg-deb", &["--version"], &[]).await.is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bogus.deb");
        std::fs::write(&archive, "definitely not a deb").unwrap();

        let err = extract(&archive, &dir.path().join("out"), PackageManager::Deb)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::BadArchive { .. }));
    }
}
