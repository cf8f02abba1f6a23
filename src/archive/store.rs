//! Access to the directory tree of the archive.

use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::errors::ArgoDataErr;

/// Read only view of the files in the archive.
pub trait FileStore: Send + Sync {
    /// Is there a file at this path?
    fn exists(&self, path: &Path) -> bool;

    /// All the existing paths matching a pattern, sorted.
    ///
    /// Any path component may contain the `*` (any run of characters) and `?` (any single
    /// character) wildcards. Wildcards never match across a path separator.
    fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, ArgoDataErr>;
}

/// The local file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, ArgoDataErr> {
        let pattern = glob_pattern(pattern);
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut found = vec![];
        for entry in glob::glob_with(&pattern, options)? {
            match entry {
                Ok(path) => {
                    if path.exists() {
                        found.push(path);
                    }
                }
                Err(err) => {
                    debug!("cannot read {}", err.path().display());
                    let err = err.into_error();
                    if err.kind() != std::io::ErrorKind::NotFound {
                        return Err(err.into());
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

/// Turn a path with `*` and `?` wildcards into a glob pattern, escaping every other character the
/// glob syntax treats specially (`[` in a directory name for example).
fn glob_pattern(pattern: &Path) -> String {
    let mut glob = PathBuf::new();
    for component in pattern.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if has_wildcard(&part) {
                    glob.push(&*part);
                } else {
                    glob.push(glob::Pattern::escape(&part));
                }
            }
            other => glob.push(other.as_os_str()),
        }
    }
    glob.to_string_lossy().into_owned()
}

fn has_wildcard(part: &str) -> bool {
    part.contains('*') || part.contains('?')
}
