use crate::config::schema::{PatchConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read patch spec {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse patch spec{}: {source}", origin(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid patch spec{}: {source}", origin(.path))]
    Invalid {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },

    /// `replacement_file` names a block that is not next to the spec
    #[error("replacement block {} for patch spec {} does not exist", .block.display(), .spec.display())]
    MissingReplacement { spec: PathBuf, block: PathBuf },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

/// A patch spec loaded from disk, with the directory its relative paths
/// resolve against.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub config: PatchConfig,
    /// Directory holding the spec file (`.` for a bare file name)
    pub base_dir: PathBuf,
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Parse { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Invalid { path: None, source })?;
    Ok(config)
}

/// Load a spec file, validate its line range and markers, and check that a
/// `replacement_file` exists relative to the spec's directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<LoadedSpec, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = load_from_str(&contents).map_err(|error| match error {
        ConfigError::Parse { path: None, source } => ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        },
        ConfigError::Invalid { path: None, source } => ConfigError::Invalid {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })?;

    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if let Some(block) = &config.patch.replacement_file {
        let block = base_dir.join(block);
        if !block.is_file() {
            return Err(ConfigError::MissingReplacement {
                spec: path.to_path_buf(),
                block,
            });
        }
    }

    debug!(
        spec = %path.display(),
        file = %config.patch.file,
        start_line = config.patch.start_line,
        end_line = config.patch.end_line,
        policy = %config.patch.policy,
        "loaded patch spec"
    );

    Ok(LoadedSpec { config, base_dir })
}
