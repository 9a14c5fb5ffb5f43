//! Line Patcher: marker-verified line-range replacement for text files
//!
//! Replaces a 1-indexed inclusive range of lines with a single replacement
//! block after checking that the boundary lines still contain the expected
//! markers. Every literal (path, range, markers, replacement) is a parameter,
//! supplied directly, from the command line, or from a TOML patch spec.
//!
//! # Safety
//!
//! - The start marker must match or nothing is written
//! - The end marker warns ([`MarkerPolicy::BestEffort`]) or aborts ([`MarkerPolicy::Strict`])
//! - Optional exact-text or xxh3 verification of the whole range
//! - Atomic file writes (tempfile + fsync + rename)
//! - Optional workspace boundary enforcement
//!
//! # Example
//!
//! ```no_run
//! use line_patcher::{LineRangeEdit, MarkerPolicy};
//!
//! let edit = LineRangeEdit::new(
//!     "src/components/radio/RadioBuilder.svelte",
//!     681,
//!     760,
//!     "{#if generatedPlaylist.length > 0}",
//!     "</div>",
//!     "  {#if generatedPlaylist.length > 0}\n    <RadioResults />\n",
//! )
//! .with_policy(MarkerPolicy::Strict);
//!
//! match edit.apply() {
//!     Ok(result) => println!("Edit applied: {:?}", result),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

pub mod config;
pub mod edit;
pub mod safety;

// Re-exports
pub use config::{
    apply_patch, check_patch, load_from_path, load_from_str, ApplicationError, ConfigError,
    PatchConfig,
};
pub use edit::{
    split_lines, EditError, EditResult, LineRangeEdit, MarkerPolicy, MarkerWarning,
    PatchedContent, RangeReport, RangeVerification,
};
pub use safety::{SafetyError, WorkspaceGuard};
