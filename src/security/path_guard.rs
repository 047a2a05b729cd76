//! Confines every filesystem tool operation to a working root.
//!
//! The working root is canonicalized once at startup. `resolve` is the only
//! sanctioned way a tool turns a user-supplied path into something it may
//! touch on disk; callers that skip it and build paths by hand are bugs.

use std::path::{Component, Path, PathBuf};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Canonicalize `root` and build a guard around it. Fails if the root
    /// does not exist or cannot be canonicalized.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| AgentError::BadArgument(format!("working root {:?}: {e}", root)))?;
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `input` to an absolute path confined to the working root.
    ///
    /// Accepts both relative paths (joined to the root) and already-absolute
    /// paths (accepted only if they resolve inside the root). Rejects NUL
    /// bytes and lexically collapses `.`/`..` without touching the disk, so
    /// the check also holds for paths that do not exist yet (e.g. a
    /// `write_file` target).
    pub fn resolve(&self, input: &str) -> Result<PathBuf> {
        if input.is_empty() {
            return Err(AgentError::BadArgument("path is empty".into()));
        }
        if input.as_bytes().contains(&0) {
            return Err(AgentError::BadArgument("path contains NUL byte".into()));
        }

        let candidate = Path::new(input);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let normalized = normalize_lexically(&joined);

        if !is_inside(&self.root, &normalized) {
            return Err(AgentError::PathEscape(format!(
                "{} is outside working root {}",
                input,
                self.root.display()
            )));
        }

        Ok(normalized)
    }

    /// Resolve `input` relative to `self.root`, returning the confined
    /// absolute path together with its root-relative form (used by
    /// `list_files` and the shell tool's working-directory argument).
    pub fn resolve_relative(&self, input: &str) -> Result<(PathBuf, PathBuf)> {
        let absolute = self.resolve(input)?;
        let relative = absolute
            .strip_prefix(&self.root)
            .unwrap_or(Path::new(""))
            .to_path_buf();
        Ok((absolute, relative))
    }
}

/// Collapse `.` and `..` components without requiring the path to exist.
/// `..` at the very top (before any real component) is dropped rather than
/// escaping further, matching the behavior a canonicalizing OS call would
/// apply only once the confinement check has already rejected it.
fn normalize_lexically(path: &Path) -> PathBuf {
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

#[cfg(target_os = "windows")]
fn is_inside(root: &Path, candidate: &Path) -> bool {
    let root_s = root.to_string_lossy().to_lowercase();
    let cand_s = candidate.to_string_lossy().to_lowercase();
    cand_s == root_s || cand_s.starts_with(&format!("{root_s}\\")) || cand_s.starts_with(&format!("{root_s}/"))
}

#[cfg(not(target_os = "windows"))]
fn is_inside(root: &Path, candidate: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}
