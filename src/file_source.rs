//! A `Source` backed by a directory of files, with a regex filter over full
//! paths and a choice of how a file's path maps to a `ResourceId`.

use std::collections::HashMap;
use std::path::{Path as StdPath, PathBuf};

use regex::Regex;

use crate::error::ProviderError;
use crate::file_lister::FileLister;
use crate::ids::ResourceId;
use crate::path::RexPath;
use crate::source::Source;

/// How a listed file's path is turned into a `ResourceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// `/a/b/file.ext` -> `file`
    NoExt,
    /// `/a/b/file.ext` -> `file.ext`
    FileName,
    /// `/a/b/file.ext` -> `/a/b/file.ext`
    Path,
}

fn resource_id_for(path: &StdPath, naming: Naming) -> String {
    let rex_path = RexPath::new(path.to_string_lossy().into_owned());
    match naming {
        Naming::NoExt => rex_path.stem().to_string(),
        Naming::FileName => rex_path.file_name().to_string(),
        Naming::Path => rex_path.as_str().to_string(),
    }
}

/// A `Source` that lists files under a directory, keeps only the ones whose
/// full path matches a regex, and loads each one through a user-supplied
/// closure.
pub struct FileSource<R> {
    entries: HashMap<ResourceId, PathBuf>,
    loader: Box<dyn Fn(&StdPath) -> anyhow::Result<R> + Send + Sync>,
}

impl<R> FileSource<R> {
    /// Scans `root` recursively, keeps files whose full path matches
    /// `filter`, and names each one according to `naming`. Fails with
    /// [`ProviderError::InvalidPath`] if `root` is not a directory, or
    /// [`ProviderError::AmbiguousName`] if two files collapse to the same
    /// id under `naming`.
    pub fn new(
        root: impl Into<PathBuf>,
        filter: Regex,
        naming: Naming,
        loader: impl Fn(&StdPath) -> anyhow::Result<R> + Send + Sync + 'static,
    ) -> Result<Self, ProviderError> {
        let lister = FileLister::new(root)?;
        let mut entries: HashMap<ResourceId, PathBuf> = HashMap::new();

        for path in lister.list()? {
            let path_string = path.to_string_lossy();
            if !filter.is_match(&path_string) {
                continue;
            }

            let id = ResourceId::new(resource_id_for(&path, naming))?;
            if let Some(existing) = entries.get(&id) {
                return Err(ProviderError::AmbiguousName {
                    resource_id: id,
                    first: existing.clone(),
                    second: path,
                });
            }
            entries.insert(id, path);
        }

        Ok(Self {
            entries,
            loader: Box::new(loader),
        })
    }

    /// Convenience constructor matching all files (`.*`), naming them by
    /// extension-stripped file name.
    pub fn all_files(
        root: impl Into<PathBuf>,
        loader: impl Fn(&StdPath) -> anyhow::Result<R> + Send + Sync + 'static,
    ) -> Result<Self, ProviderError> {
        Self::new(root, Regex::new(".*").unwrap(), Naming::NoExt, loader)
    }
}

impl<R: Send + Sync + 'static> Source for FileSource<R> {
    type Resource = R;

    fn list(&self) -> Vec<ResourceId> {
        self.entries.keys().cloned().collect()
    }

    fn load(&self, id: &ResourceId) -> anyhow::Result<R> {
        let path = self
            .entries
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("no file registered for resource id {id}"))?;
        (self.loader)(path)
    }
}
