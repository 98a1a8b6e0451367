//! Path joining, existence probes, recursive clean/copy/hard-link, and a
//! scoped-cleanup guard for temporary paths.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ChariotError, Result};

/// Join path components with exactly one `/` between them.
pub fn join(components: &[&str]) -> PathBuf {
    let mut out = PathBuf::new();
    for component in components {
        out.push(component);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Present,
    Absent,
    Error,
}

/// Existence probe that distinguishes "doesn't exist" from "couldn't check".
pub fn exists(path: &Path) -> Existence {
    match fs::symlink_metadata(path) {
        Ok(_) => Existence::Present,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Existence::Absent,
        Err(_) => Existence::Error,
    }
}

/// Recursively delete a directory if it exists. A no-op if it does not.
pub fn remove_dir_recursive(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ChariotError::io(path, e)),
    }
}

/// Delete `path` if present, then create it fresh.
pub fn clean(path: &Path) -> Result<()> {
    remove_dir_recursive(path)?;
    fs::create_dir_all(path).map_err(|e| ChariotError::io(path, e))
}

/// Mirror the directory tree of `src` into `dst`, creating directories and
/// hard-linking regular files and symlink targets.
///
/// Directory creation failure is fatal; an individual hard-link failure is
/// warned and skipped so one uncooperative file (e.g. on a different
/// filesystem) doesn't abort the whole clone.
pub fn link_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| ChariotError::io(dst, e))?;

    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ChariotError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ChariotError::io(parent, e))?;
            }
            if let Err(e) = fs::hard_link(entry.path(), &target) {
                crate::output::warning(&format!(
                    "could not hard-link {} -> {}: {e}",
                    entry.path().display(),
                    target.display()
                ));
            }
        }
    }

    Ok(())
}

/// Recursively copy a directory tree (used for `local` source recipes and
/// dependency staging, where independent, mutable copies are required
/// instead of shared inodes).
pub fn copy_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| ChariotError::io(dst, e))?;

    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| ChariotError::io(&target, e))?;
        } else if entry.file_type().is_symlink() {
            let link_target =
                fs::read_link(entry.path()).map_err(|e| ChariotError::io(entry.path(), e))?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link_target, &target)
                .map_err(|e| ChariotError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ChariotError::io(parent, e))?;
            }
            if matches!(exists(&target), Existence::Present) {
                crate::output::conflict(&target);
            }
            fs::copy(entry.path(), &target).map_err(|e| ChariotError::io(&target, e))?;
        }
    }

    Ok(())
}

/// An owning guard over a path that removes it (recursively, if a
/// directory) when dropped. Used for scoped temporaries whose lifetime
/// should track the enclosing scope rather than being freed by hand on
/// every exit path.
pub struct ScopedCleanup {
    path: PathBuf,
    armed: bool,
}

impl ScopedCleanup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ScopedCleanup {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cancel the cleanup: the path will not be removed on drop. Used once
    /// the caller has decided the path should survive (e.g. a build
    /// succeeded and the directory is now the recipe's permanent output).
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScopedCleanup {
    fn drop(&mut self) {
        if self.armed && !self.path.as_os_str().is_empty() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
