use std::path::{Path, PathBuf};
use crate::error::{Result, WorkspaceError};

/// Normalize a user-provided local path string into a PathBuf.
///
/// - Trims surrounding whitespace
/// - Strips surrounding single or double quotes if present
/// - Expands a leading '~' to the HOME directory when possible
pub fn normalize_user_input_path(input: &str) -> PathBuf {
    let trimmed = input.trim();

    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    if let Some(rest) = unquoted.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs::home_dir() {
                let rest = rest.trim_start_matches('/');
                return if rest.is_empty() { home } else { home.join(rest) };
            }
        }
    }

    PathBuf::from(unquoted)
}

/// Validates a workspace path and returns it without a trailing slash.
///
/// Workspace paths are absolute, `/`-separated and may not contain empty,
/// `.` or `..` segments. The root `/` is accepted as is.
pub fn normalize_workspace_path(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(WorkspaceError::Validation(format!(
            "Workspace path must be absolute: {:?}",
            path
        )));
    }

    let body = trimmed.trim_end_matches('/');
    if body.is_empty() {
        return Ok("/".to_string());
    }

    for segment in body[1..].split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(WorkspaceError::Validation(format!(
                "Invalid segment {:?} in workspace path {:?}",
                segment, path
            )));
        }
    }

    Ok(body.to_string())
}

/// Joins a validated workspace directory with a relative `/`-separated child path
pub fn join_workspace_path(base: &str, child: &str) -> Result<String> {
    let base = normalize_workspace_path(base)?;
    let child = child.trim_matches('/');
    if child.is_empty() {
        return Ok(base);
    }
    let joined = if base == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", base, child)
    };
    normalize_workspace_path(&joined)
}

/// Parent directory of a workspace path, `None` for the root
pub fn workspace_parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Converts a relative local path into `/`-separated form, dropping the extension
pub fn to_workspace_relative(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
