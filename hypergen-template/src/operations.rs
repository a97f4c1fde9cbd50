//! ABOUTME: The `add`/`inject` Operations primitives the Template tool builds on
//! ABOUTME: `add` creates-or-overwrites; `inject` idempotently inserts at a marker (spec.md §2).

use std::fs;
use std::path::Path;

use hypergen_core::error::{HypergenError, Result, ToolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    SkippedExists,
}

/// Create-or-overwrite a file's contents. Writes to a sibling temp file and
/// renames into place for best-effort atomicity (spec.md §5). Returns
/// `SkippedExists` without touching the file when `overwrite` is false and
/// the target already exists.
pub fn add(path: &Path, content: &str, overwrite: bool) -> Result<WriteOutcome> {
    if path.exists() && !overwrite {
        return Ok(WriteOutcome::SkippedExists);
    }
    write_atomic(path, content)?;
    Ok(WriteOutcome::Written)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HypergenError::tool("template", ToolErrorKind::FileWrite, format!("failed to create parent directory: {e}"))
        })?;
    }
    let tmp_path = sibling_temp_path(path);
    fs::write(&tmp_path, content).map_err(|e| {
        HypergenError::tool("template", ToolErrorKind::FileWrite, format!("failed to write temp file: {e}"))
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        HypergenError::tool("template", ToolErrorKind::FileWrite, format!("failed to rename into place: {e}"))
    })
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    path.with_file_name(format!(".{file_name}.hypergen-tmp"))
}

#[derive(Debug, Clone)]
pub enum InjectMode {
    Before(String),
    After(String),
    AtLine(usize),
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectOutcome {
    pub modified: bool,
}

/// Idempotently insert `content` into the file at `path`. If `content`
/// (trimmed) is already present in the file, this is a no-op — injection
/// must be idempotent (spec.md §4.2, §8). Rereads the file immediately
/// before matching, tolerating concurrent external edits (spec.md §5).
pub fn inject(path: &Path, content: &str, mode: &InjectMode) -> Result<InjectOutcome> {
    let existing = fs::read_to_string(path).map_err(|e| {
        HypergenError::tool("template", ToolErrorKind::Inject, format!("inject target does not exist or is unreadable: {e}"))
    })?;

    let needle = content.trim();
    if !needle.is_empty() && existing.contains(needle) {
        return Ok(InjectOutcome { modified: false });
    }

    let updated = match mode {
        InjectMode::Prepend => format!("{content}\n{existing}"),
        InjectMode::Append => format!("{existing}\n{content}"),
        InjectMode::Before(marker) => insert_relative_to_marker(&existing, marker, content, true)?,
        InjectMode::After(marker) => insert_relative_to_marker(&existing, marker, content, false)?,
        InjectMode::AtLine(line_no) => insert_at_line(&existing, *line_no, content)?,
    };

    write_atomic(path, &updated)?;
    Ok(InjectOutcome { modified: true })
}

fn insert_relative_to_marker(existing: &str, marker: &str, content: &str, before: bool) -> Result<String> {
    let idx = existing.find(marker).ok_or_else(|| {
        HypergenError::tool("template", ToolErrorKind::Inject, format!("inject marker not found: {marker}"))
    })?;

    if before {
        let line_start = existing[..idx].rfind('\n').map(|i| i + 1).unwrap_or(0);
        Ok(format!("{}{}\n{}", &existing[..line_start], content, &existing[line_start..]))
    } else {
        let line_end = existing[idx..].find('\n').map(|i| idx + i + 1).unwrap_or(existing.len());
        Ok(format!("{}{}\n{}", &existing[..line_end], content, &existing[line_end..]))
    }
}

fn insert_at_line(existing: &str, line_no: usize, content: &str) -> Result<String> {
    let mut lines: Vec<&str> = existing.lines().collect();
    let idx = line_no.saturating_sub(1).min(lines.len());
    lines.insert(idx, content);
    Ok(lines.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_writes_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let outcome = add(&path, "hello", false).unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn add_skips_existing_without_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "original").unwrap();
        let outcome = add(&path, "new", false).unwrap();
        assert_eq!(outcome, WriteOutcome::SkippedExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn add_overwrites_when_requested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "original").unwrap();
        let outcome = add(&path, "new", true).unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn inject_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let first = inject(&path, "inserted", &InjectMode::After("one".to_string())).unwrap();
        assert!(first.modified);
        let contents_after_first = fs::read_to_string(&path).unwrap();

        let second = inject(&path, "inserted", &InjectMode::After("one".to_string())).unwrap();
        assert!(!second.modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), contents_after_first);
    }

    #[test]
    fn inject_before_marker_places_content_on_preceding_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "start\nMARKER\nend\n").unwrap();
        inject(&path, "// injected", &InjectMode::Before("MARKER".to_string())).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "start");
        assert_eq!(lines[1], "// injected");
        assert_eq!(lines[2], "MARKER");
    }

    #[test]
    fn inject_missing_marker_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "no markers here\n").unwrap();
        assert!(inject(&path, "x", &InjectMode::After("MISSING".to_string())).is_err());
    }
}
