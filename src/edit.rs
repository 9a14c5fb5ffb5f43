use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

/// How far (in lines, each direction) to look for a misplaced marker.
const HINT_WINDOW: usize = 10;

/// The fundamental edit primitive: replace a 1-indexed inclusive line range
/// with a single replacement block, guarded by boundary markers.
///
/// The range `[start_line, end_line]` maps to the half-open 0-indexed range
/// `[start_line - 1, end_line)`. Every line in it is removed and exactly one
/// element, the replacement text verbatim, takes its place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "LineRangeEdit does nothing until apply() is called"]
pub struct LineRangeEdit {
    /// Path to the file to edit
    pub file: PathBuf,
    /// First line of the range (1-indexed, inclusive)
    pub start_line: usize,
    /// Last line of the range (1-indexed, inclusive)
    pub end_line: usize,
    /// Substring expected in the line at `start_line`
    pub start_marker: String,
    /// Substring expected in the line at `end_line`
    pub end_marker: String,
    /// Text substituted for the whole range, line terminators included
    pub replacement: String,
    /// What to do when the end marker is missing
    pub policy: MarkerPolicy,
    /// Optional check of the full range text, on top of the markers
    pub expected_range: Option<RangeVerification>,
}

/// Handling of an end-marker mismatch.
///
/// A start-marker mismatch is always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerPolicy {
    /// Report the mismatch as a warning and patch anyway
    #[default]
    BestEffort,
    /// Abort before touching the file
    Strict,
}

impl fmt::Display for MarkerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerPolicy::BestEffort => write!(f, "best-effort"),
            MarkerPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Verification of the complete text covered by the range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of the expected text (compact for large ranges)
    Hash(u64),
}

impl RangeVerification {
    /// Check if the provided range text matches.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            RangeVerification::ExactMatch(expected) => text == expected,
            RangeVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }
}

/// Non-fatal marker problem found while patching under [`MarkerPolicy::BestEffort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerWarning {
    EndMismatch {
        line: usize,
        marker: String,
        found: String,
        /// Nearby line that does contain the marker, if any
        hint: Option<usize>,
    },
}

impl MarkerWarning {
    pub fn hint(&self) -> Option<usize> {
        match self {
            MarkerWarning::EndMismatch { hint, .. } => *hint,
        }
    }
}

impl fmt::Display for MarkerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerWarning::EndMismatch { line, found, .. } => {
                write!(f, "Mismatch at {}: {}", line, found)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Mismatch at {line}: {found}")]
    StartMismatch {
        file: PathBuf,
        line: usize,
        marker: String,
        found: String,
        hint: Option<usize>,
    },

    #[error("Mismatch at {line}: {found}")]
    EndMismatch {
        file: PathBuf,
        line: usize,
        marker: String,
        found: String,
        hint: Option<usize>,
    },

    #[error("Invalid line range: [{start_line}, {end_line}] in file of {line_count} lines")]
    InvalidLineRange {
        start_line: usize,
        end_line: usize,
        line_count: usize,
    },

    #[error("Range verification failed at {file}:{start_line}-{end_line}")]
    RangeMismatch {
        file: PathBuf,
        start_line: usize,
        end_line: usize,
        expected: String,
        found: String,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl EditError {
    /// Nearby line holding the expected marker, for marker mismatches.
    pub fn hint(&self) -> Option<usize> {
        match self {
            EditError::StartMismatch { hint, .. } | EditError::EndMismatch { hint, .. } => *hint,
            _ => None,
        }
    }
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for warnings"]
pub enum EditResult {
    /// The range was replaced and the file rewritten
    Applied {
        file: PathBuf,
        lines_removed: usize,
        warnings: Vec<MarkerWarning>,
    },
    /// The replacement reproduces the range exactly; nothing was written
    Unchanged {
        file: PathBuf,
        warnings: Vec<MarkerWarning>,
    },
}

impl EditResult {
    pub fn file(&self) -> &Path {
        match self {
            EditResult::Applied { file, .. } | EditResult::Unchanged { file, .. } => file,
        }
    }

    pub fn warnings(&self) -> &[MarkerWarning] {
        match self {
            EditResult::Applied { warnings, .. } | EditResult::Unchanged { warnings, .. } => {
                warnings
            }
        }
    }
}

/// Outcome of running every assertion against some content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeReport {
    /// Total lines in the content
    pub line_count: usize,
    /// Number of lines covered by the range
    pub range_lines: usize,
    /// xxh3 hash of the concatenated range text
    pub range_hash: u64,
    pub warnings: Vec<MarkerWarning>,
}

/// Patched content together with the report that allowed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedContent {
    pub content: String,
    pub report: RangeReport,
}

/// Split text into lines, each keeping its terminator.
///
/// The last element lacks a terminator when the text does not end with one.
/// Empty input yields no lines.
pub fn split_lines(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}

/// Replace `lines[start..end]` with a single `replacement` element.
///
/// Callers pass a range already checked by `verify_lines`; slicing panics on
/// `start > end` or `end > lines.len()`.
pub(crate) fn splice_lines<'a>(
    lines: &[&'a str],
    start: usize,
    end: usize,
    replacement: &'a str,
) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(lines.len() - (end - start) + 1);
    out.extend_from_slice(&lines[..start]);
    out.push(replacement);
    out.extend_from_slice(&lines[end..]);
    out
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

/// Find the closest line (1-indexed) to `index` that contains `marker`.
fn nearest_marker_line(lines: &[&str], index: usize, marker: &str) -> Option<usize> {
    for distance in 1..=HINT_WINDOW {
        if let Some(before) = index.checked_sub(distance) {
            if lines[before].contains(marker) {
                return Some(before + 1);
            }
        }
        let after = index + distance;
        if after < lines.len() && lines[after].contains(marker) {
            return Some(after + 1);
        }
    }
    None
}

impl LineRangeEdit {
    /// Create a best-effort edit with no range verification.
    pub fn new(
        file: impl Into<PathBuf>,
        start_line: usize,
        end_line: usize,
        start_marker: impl Into<String>,
        end_marker: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line,
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
            replacement: replacement.into(),
            policy: MarkerPolicy::default(),
            expected_range: None,
        }
    }

    pub fn with_policy(mut self, policy: MarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verification(mut self, verification: RangeVerification) -> Self {
        self.expected_range = Some(verification);
        self
    }

    /// Run every assertion against `content` without producing output.
    pub fn check(&self, content: &str) -> Result<RangeReport, EditError> {
        let lines = split_lines(content);
        self.verify_lines(&lines)
    }

    /// Read the target file and run every assertion. Never writes.
    pub fn inspect(&self) -> Result<RangeReport, EditError> {
        let original = fs::read(&self.file)?;
        let content = std::str::from_utf8(&original)?;
        self.check(content)
    }

    /// Compute the patched content for `content`.
    pub fn render(&self, content: &str) -> Result<PatchedContent, EditError> {
        let lines = split_lines(content);
        let report = self.verify_lines(&lines)?;

        let spliced = splice_lines(&lines, self.start_line - 1, self.end_line, &self.replacement);
        debug!(
            file = %self.file.display(),
            before = lines.len(),
            after = spliced.len(),
            "spliced line range"
        );

        Ok(PatchedContent {
            content: spliced.concat(),
            report,
        })
    }

    fn verify_lines(&self, lines: &[&str]) -> Result<RangeReport, EditError> {
        if self.start_line == 0 || self.start_line > self.end_line || self.end_line > lines.len()
        {
            return Err(EditError::InvalidLineRange {
                start_line: self.start_line,
                end_line: self.end_line,
                line_count: lines.len(),
            });
        }

        let start = self.start_line - 1;
        let end = self.end_line;

        if !lines[start].contains(&self.start_marker) {
            return Err(EditError::StartMismatch {
                file: self.file.clone(),
                line: self.start_line,
                marker: self.start_marker.clone(),
                found: strip_terminator(lines[start]).to_string(),
                hint: nearest_marker_line(lines, start, &self.start_marker),
            });
        }

        let mut warnings = Vec::new();
        let last = lines[end - 1];
        if !last.contains(&self.end_marker) {
            let line = self.end_line;
            let found = strip_terminator(last).to_string();
            let hint = nearest_marker_line(lines, end - 1, &self.end_marker);

            match self.policy {
                MarkerPolicy::Strict => {
                    return Err(EditError::EndMismatch {
                        file: self.file.clone(),
                        line,
                        marker: self.end_marker.clone(),
                        found,
                        hint,
                    });
                }
                MarkerPolicy::BestEffort => {
                    warn!(
                        file = %self.file.display(),
                        line,
                        marker = %self.end_marker,
                        "end marker not found, continuing"
                    );
                    warnings.push(MarkerWarning::EndMismatch {
                        line,
                        marker: self.end_marker.clone(),
                        found,
                        hint,
                    });
                }
            }
        }

        let range_text = lines[start..end].concat();
        if let Some(expected) = &self.expected_range {
            if !expected.matches(&range_text) {
                return Err(EditError::RangeMismatch {
                    file: self.file.clone(),
                    start_line: self.start_line,
                    end_line: self.end_line,
                    expected: format!("{:?}", expected),
                    found: range_text,
                });
            }
        }

        Ok(RangeReport {
            line_count: lines.len(),
            range_lines: end - start,
            range_hash: xxh3_64(range_text.as_bytes()),
            warnings,
        })
    }

    /// Apply this edit to the file system atomically.
    ///
    /// Uses tempfile + fsync + rename, so a failed assertion or write leaves
    /// the target untouched.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let original = fs::read(&self.file)?;
        let content = std::str::from_utf8(&original)?;

        let patched = self.render(content)?;
        let warnings = patched.report.warnings;

        if patched.content == content {
            debug!(file = %self.file.display(), "replacement matches range, skipping write");
            return Ok(EditResult::Unchanged {
                file: self.file.clone(),
                warnings,
            });
        }

        atomic_write(&self.file, patched.content.as_bytes())?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            lines_removed: patched.report.range_lines,
            warnings,
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem. The target's permissions carry over.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };

    let permissions = fs::metadata(path)?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| e.error)?;
    debug!(file = %path.display(), bytes = content.len(), "wrote file");

    Ok(())
}
