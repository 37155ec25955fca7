//! Confines every wire path to the authenticated user's home directory.
//!
//! Wire paths are interpreted against a virtual root: an argument beginning
//! with `/` is relative to the user's home, anything else is relative to the
//! session's current directory. `..` is folded inside the virtual tree and
//! cannot ascend above its root, the same way `/..` is `/` on a real
//! filesystem. The composed path is then canonicalized through the longest
//! prefix that exists on disk, so symlinks cannot smuggle a target outside
//! the sandbox and paths that do not exist yet (STOR, MKD) can still be
//! vetted; `Escape` only ever comes from that canonicalization step.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path escapes the user home directory")]
    Escape,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Resolves `wire_path` to an absolute host path inside `home`.
///
/// `cwd` and `home` must be absolute host paths with `home` canonical and
/// `cwd` inside it. The returned path equals `home` or descends from it.
pub fn resolve(cwd: &Path, home: &Path, wire_path: &str) -> Result<PathBuf, PathError> {
    let home = home.canonicalize()?;

    // Fold the path inside the virtual tree. Popping at the virtual root
    // stays at the root.
    let mut parts: Vec<OsString> = Vec::new();
    if !wire_path.starts_with('/') {
        if let Ok(rel) = cwd.strip_prefix(&home) {
            for component in rel.components() {
                if let Component::Normal(part) = component {
                    parts.push(part.to_os_string());
                }
            }
        }
    }
    for component in Path::new(wire_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_os_string()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let mut normalized = home.clone();
    for part in &parts {
        normalized.push(part);
    }

    let (existing, remainder) = split_existing_prefix(&normalized);
    let existing = existing.canonicalize()?;
    let resolved = if remainder.as_os_str().is_empty() {
        existing
    } else {
        existing.join(remainder)
    };

    if resolved == home || resolved.starts_with(&home) {
        Ok(resolved)
    } else {
        Err(PathError::Escape)
    }
}

/// Renders a host path inside `home` as the virtual path shown to clients.
pub fn to_wire_path(home: &Path, host_path: &Path) -> String {
    match host_path.strip_prefix(home) {
        Ok(rel) if rel.as_os_str().is_empty() => String::from("/"),
        Ok(rel) => format!("/{}", rel.display()),
        Err(_) => String::from("/"),
    }
}

/// Splits `path` into its longest existing ancestor and the trailing
/// components that do not exist yet.
fn split_existing_prefix(path: &Path) -> (PathBuf, PathBuf) {
    let mut existing = path.to_path_buf();
    let mut remainder = PathBuf::new();
    loop {
        if existing.exists() {
            return (existing, remainder);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                let mut rebuilt = PathBuf::from(name);
                rebuilt.push(&remainder);
                remainder = rebuilt;
                existing = parent.to_path_buf();
            }
            _ => return (PathBuf::from("/"), remainder),
        }
    }
}
