//! Patch applicator - resolves a patch spec into a [`LineRangeEdit`] and runs it
//!
//! Relative paths in a spec (`file`, `replacement_file`) resolve against a
//! base directory, normally the directory holding the spec file. When a
//! [`WorkspaceGuard`] is supplied the target must stay inside its root.

use crate::config::schema::PatchConfig;
use crate::edit::{EditError, EditResult, LineRangeEdit, RangeReport};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// Reading the replacement file failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Edit application error
    Edit(EditError),
    /// Target rejected by the workspace guard
    Safety(SafetyError),
    /// Verification settings could not be turned into a check
    Verify(String),
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ApplicationError::Edit(e) => write!(f, "{}", e),
            ApplicationError::Safety(e) => write!(f, "unsafe target: {}", e),
            ApplicationError::Verify(message) => write!(f, "verify error: {}", message),
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Io { source, .. } => Some(source),
            ApplicationError::Edit(e) => Some(e),
            ApplicationError::Safety(e) => Some(e),
            ApplicationError::Verify(_) => None,
        }
    }
}

impl From<EditError> for ApplicationError {
    fn from(e: EditError) -> Self {
        ApplicationError::Edit(e)
    }
}

impl From<SafetyError> for ApplicationError {
    fn from(e: SafetyError) -> Self {
        ApplicationError::Safety(e)
    }
}

/// Build the edit described by `config`.
pub fn resolve_edit(
    config: &PatchConfig,
    base_dir: &Path,
    guard: Option<&WorkspaceGuard>,
) -> Result<LineRangeEdit, ApplicationError> {
    let patch = &config.patch;

    // Anchor to the current directory so the guard never re-roots a
    // cwd-relative path under its workspace.
    let joined = base_dir.join(&patch.file);
    let mut file = std::path::absolute(&joined).map_err(|source| ApplicationError::Io {
        path: joined.clone(),
        source,
    })?;
    if let Some(guard) = guard {
        file = guard.validate_path(&file)?;
    }

    let replacement = match (&patch.replacement, &patch.replacement_file) {
        (Some(text), _) => text.clone(),
        (None, Some(block_file)) => {
            let path = base_dir.join(block_file);
            fs::read_to_string(&path).map_err(|source| ApplicationError::Io { path, source })?
        }
        (None, None) => String::new(),
    };

    let mut edit = LineRangeEdit::new(
        file,
        patch.start_line,
        patch.end_line,
        patch.start_marker.as_str(),
        patch.end_marker.as_str(),
        replacement,
    )
    .with_policy(patch.policy);

    if let Some(verify) = &patch.verify {
        edit = edit.with_verification(verify.to_verification().map_err(ApplicationError::Verify)?);
    }

    Ok(edit)
}

/// Apply a patch spec.
///
/// # Arguments
///
/// * `config` - The patch spec to apply
/// * `base_dir` - Directory relative paths in the spec resolve against
/// * `guard` - Optional workspace boundary for the target file
pub fn apply_patch(
    config: &PatchConfig,
    base_dir: &Path,
    guard: Option<&WorkspaceGuard>,
) -> Result<EditResult, ApplicationError> {
    let edit = resolve_edit(config, base_dir, guard)?;
    apply_edit(&edit, guard)
}

/// Apply an already resolved edit, re-checking the guard right before the write.
pub fn apply_edit(
    edit: &LineRangeEdit,
    guard: Option<&WorkspaceGuard>,
) -> Result<EditResult, ApplicationError> {
    if let Some(guard) = guard {
        guard.revalidate(&edit.file)?;
    }

    let result = edit.apply()?;
    info!(
        file = %result.file().display(),
        lines = edit.end_line - edit.start_line + 1,
        warnings = result.warnings().len(),
        "patch finished"
    );
    Ok(result)
}

/// Run every assertion of a patch spec without writing anything.
pub fn check_patch(
    config: &PatchConfig,
    base_dir: &Path,
    guard: Option<&WorkspaceGuard>,
) -> Result<RangeReport, ApplicationError> {
    let edit = resolve_edit(config, base_dir, guard)?;
    Ok(edit.inspect()?)
}
