//! Path decomposition: normalizes separators and splits a path into its
//! file name, stem, and extension, matching the quirks of dot-only and
//! dot-leading/trailing file names.

/// A normalized, decomposed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RexPath {
    path: String,
    file_name: String,
    stem: String,
    extension: String,
}

impl RexPath {
    pub fn new(path: impl Into<String>) -> Self {
        let path = strip_trailing_slash(to_good_slash(path.into()));
        let file_name = path[file_name_start(&path)..].to_string();

        let (stem, extension) = match extension_start(&file_name) {
            Some(start) => (file_name[..start - 1].to_string(), file_name[start..].to_string()),
            None => (file_name.clone(), String::new()),
        };

        Self {
            path,
            file_name,
            stem,
            extension,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl From<&str> for RexPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RexPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

fn to_good_slash(path: String) -> String {
    path.replace('\\', "/")
}

fn strip_trailing_slash(mut path: String) -> String {
    if path.ends_with('/') {
        path.pop();
    }
    path
}

fn file_name_start(path: &str) -> usize {
    match path.rfind('/') {
        Some(index) => index + 1,
        None => 0,
    }
}

/// Returns the byte offset just past the last `.`, or `None` if the file
/// name has no extension (including the case where it is made up entirely
/// of dots, e.g. `.`, `..`, `...`).
fn extension_start(file_name: &str) -> Option<usize> {
    if file_name.chars().all(|c| c == '.') {
        return None;
    }
    file_name.rfind('.').map(|index| index + 1)
}
