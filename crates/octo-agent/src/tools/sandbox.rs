//! Path sandbox — confines file access to one directory subtree.
//!
//! Caller paths are joined onto the root, normalized, then canonicalized as
//! far as they exist on disk, so `..` sequences, absolute paths and symlinks
//! pointing outside the root are all caught before any I/O happens.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use super::base::ToolError;

/// A canonical root directory that tool paths must stay within.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at an existing directory.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to an absolute path inside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let joined = normalize(&self.root.join(path));

        match canonicalize_existing(&joined) {
            Some(resolved) if resolved.starts_with(&self.root) => Ok(resolved),
            _ => {
                warn!(path = path, root = %self.root.display(), "path escapes sandbox");
                Err(ToolError::AccessDenied(path.to_string()))
            }
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
///
/// Returns `None` when an existing component cannot be resolved, such as a
/// dangling symlink whose target is unknown.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for part in missing.iter().rev() {
                    resolved.push(part);
                }
                return Some(resolved);
            }
            Err(_) => {
                // Present on disk but unresolvable (e.g. a dangling symlink).
                if std::fs::symlink_metadata(&existing).is_ok() {
                    return None;
                }
                let name = existing.file_name()?.to_os_string();
                missing.push(name);
                if !existing.pop() {
                    return None;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
