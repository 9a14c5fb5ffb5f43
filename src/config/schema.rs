use crate::edit::{MarkerPolicy, RangeVerification};
use serde::Deserialize;
use std::fmt;

/// A patch spec file: optional metadata plus exactly one patch.
#[derive(Debug, Deserialize, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    pub patch: PatchDefinition,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let patch = &self.patch;

        if patch.file.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "file" });
        }
        if patch.start_marker.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "start_marker",
            });
        }
        if patch.end_marker.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "end_marker",
            });
        }

        if patch.start_line == 0 {
            issues.push(ValidationIssue::InvalidRange {
                message: "start_line is 1-indexed and must be at least 1".to_string(),
            });
        }
        if patch.start_line > patch.end_line {
            issues.push(ValidationIssue::InvalidRange {
                message: format!(
                    "start_line ({}) is after end_line ({})",
                    patch.start_line, patch.end_line
                ),
            });
        }

        match (&patch.replacement, &patch.replacement_file) {
            (None, None) => issues.push(ValidationIssue::MissingField {
                field: "replacement",
            }),
            (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                message: "replacement and replacement_file cannot both be set".to_string(),
            }),
            (None, Some(path)) if path.trim().is_empty() => {
                issues.push(ValidationIssue::MissingField {
                    field: "replacement_file",
                })
            }
            _ => {}
        }

        if let Some(verify) = &patch.verify {
            if let Err(message) = verify.to_verification() {
                issues.push(ValidationIssue::InvalidCombo { message });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Display name for reports: the meta name, else the target file.
    pub fn display_name(&self) -> &str {
        if self.meta.name.trim().is_empty() {
            &self.patch.file
        } else {
            &self.meta.name
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_marker: String,
    pub end_marker: String,
    #[serde(default)]
    pub replacement: Option<String>,
    /// Read the replacement block from this file instead
    #[serde(default)]
    pub replacement_file: Option<String>,
    #[serde(default)]
    pub policy: MarkerPolicy,
    #[serde(default)]
    pub verify: Option<Verify>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

impl Verify {
    pub fn to_verification(&self) -> Result<RangeVerification, String> {
        match self {
            Verify::ExactMatch { expected_text } => {
                Ok(RangeVerification::ExactMatch(expected_text.clone()))
            }
            Verify::Hash {
                algorithm,
                expected,
            } => match algorithm.unwrap_or_default() {
                HashAlgorithm::Xxh3 => {
                    let digits = expected.trim().trim_start_matches("0x");
                    u64::from_str_radix(digits, 16)
                        .map(RangeVerification::Hash)
                        .map_err(|e| format!("invalid xxh3 hash '{expected}': {e}"))
                }
            },
        }
    }
}

/// Range hash algorithms. Only xxh3-64 is computed by `check`, so it is the
/// only one a spec may name.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    #[default]
    Xxh3,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    InvalidRange { message: String },
    InvalidCombo { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "patch missing required field '{field}'")
            }
            ValidationIssue::InvalidRange { message } => {
                write!(f, "invalid line range: {message}")
            }
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid patch configuration: {message}")
            }
        }
    }
}
