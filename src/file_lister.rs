//! Recursive directory listing used by [`crate::file_source::FileSource`].

use std::path::{Path, PathBuf};

use crate::error::ProviderError;

/// Lists every regular file under a directory, recursing into
/// subdirectories.
pub struct FileLister {
    root: PathBuf,
}

impl FileLister {
    /// Fails with [`ProviderError::InvalidPath`] if `root` is not a
    /// readable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProviderError::InvalidPath { path: root });
        }
        Ok(Self { root })
    }

    pub fn list(&self) -> Result<Vec<PathBuf>, ProviderError> {
        let mut output = Vec::new();
        fetch_files_recursively(&self.root, &mut output)?;
        Ok(output)
    }
}

fn fetch_files_recursively(folder: &Path, output: &mut Vec<PathBuf>) -> Result<(), ProviderError> {
    let entries = std::fs::read_dir(folder).map_err(|_| ProviderError::InvalidPath {
        path: folder.to_path_buf(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|_| ProviderError::InvalidPath {
            path: folder.to_path_buf(),
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|_| ProviderError::InvalidPath {
            path: path.clone(),
        })?;

        if file_type.is_dir() {
            fetch_files_recursively(&path, output)?;
        } else {
            output.push(path);
        }
    }

    Ok(())
}
