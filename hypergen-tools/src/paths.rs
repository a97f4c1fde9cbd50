//! ABOUTME: Sandboxed path resolution shared by every file-touching tool
//! ABOUTME: Rejects any path that would resolve above `project_root` (spec.md §5)

use std::path::{Component, Path, PathBuf};

use hypergen_core::error::{HypergenError, Result, ToolErrorKind};

/// Resolve `candidate` (relative or absolute) against `project_root` and
/// verify the result does not escape it.
///
/// Manually walks path components rather than calling `fs::canonicalize`,
/// so this also works for paths that don't exist yet (the common case for
/// a Template tool writing a brand-new file).
pub fn resolve_in_sandbox(project_root: &Path, candidate: &str) -> Result<PathBuf> {
    let joined = if Path::new(candidate).is_absolute() {
        PathBuf::from(candidate)
    } else {
        project_root.join(candidate)
    };

    let mut out = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                if out.is_empty() {
                    return Err(sandbox_violation(candidate));
                }
                out.pop();
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => out.clear(),
        }
    }

    let mut normalized = PathBuf::new();
    if joined.is_absolute() {
        normalized.push(Component::RootDir);
    }
    for part in &out {
        normalized.push(part);
    }

    let root_components: Vec<_> = normalized_root(project_root).into_iter().collect();
    if !starts_with_components(&out_of(&normalized), &root_components) {
        return Err(sandbox_violation(candidate));
    }

    Ok(normalized)
}

fn sandbox_violation(candidate: &str) -> HypergenError {
    HypergenError::tool(
        "paths",
        ToolErrorKind::PathEscape,
        format!("path '{candidate}' resolves outside the project root"),
    )
}

fn normalized_root(project_root: &Path) -> Vec<std::ffi::OsString> {
    project_root
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_os_string()),
            _ => None,
        })
        .collect()
}

fn out_of(path: &Path) -> Vec<std::ffi::OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_os_string()),
            _ => None,
        })
        .collect()
}

fn starts_with_components(path: &[std::ffi::OsString], prefix: &[std::ffi::OsString]) -> bool {
    prefix.len() <= path.len() && path[..prefix.len()] == *prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_under_root() {
        let root = PathBuf::from("/project");
        let resolved = resolve_in_sandbox(&root, "src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/main.rs"));
    }

    #[test]
    fn parent_dir_climbing_above_root_is_rejected() {
        let root = PathBuf::from("/project");
        assert!(resolve_in_sandbox(&root, "../../etc/passwd").is_err());
    }

    #[test]
    fn internal_parent_dir_references_are_normalized() {
        let root = PathBuf::from("/project");
        let resolved = resolve_in_sandbox(&root, "src/../lib/mod.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/lib/mod.rs"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let root = PathBuf::from("/project");
        assert!(resolve_in_sandbox(&root, "/etc/passwd").is_err());
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let root = PathBuf::from("/project");
        let resolved = resolve_in_sandbox(&root, "/project/out.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/out.txt"));
    }
}
