//! Configuration loading for the gaslink engine.
//!
//! Reads a [`LinkConfig`] from a RON, TOML, or JSON file (format detected
//! from the extension). Config files use plain numbers; conversion to the
//! engine's fixed-point types happens here, at the boundary, so the files
//! stay human-editable. Missing fields fall back to the engine defaults.

use std::path::{Path, PathBuf};

use gaslink_core::config::LinkConfig;
use gaslink_core::fixed::Fixed64;
use serde::Deserialize;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// No config file with the given base name exists in the directory.
    #[error("config file '{base_name}' not found in {dir}")]
    Missing { base_name: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A field value is outside its valid range.
    #[error("invalid value for '{field}' in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        detail: String,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, ConfigLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `{base_name}.toml`, or
/// `{base_name}.json`. Returns `Ok(None)` if none exist, or
/// `Err(ConflictingFormats)` if more than one does.
pub fn find_config_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, ConfigLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(ConfigLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_config_file`], but errors if no file is found.
pub fn require_config_file(dir: &Path, base_name: &str) -> Result<PathBuf, ConfigLoadError> {
    find_config_file(dir, base_name)?.ok_or_else(|| ConfigLoadError::Missing {
        base_name: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Raw schema
// ===========================================================================

/// The on-disk shape of a config file. Plain numbers; every field optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Litres of oxygen drawn per litre of hydrogen burned.
    pub o2_per_h2: f64,
    /// Frames a newly-seen node waits before classification.
    pub debounce_frames: u64,
    /// Balance pass cadence, in frames.
    pub balance_interval_frames: u64,
    /// Duration of one host frame, in seconds.
    pub frame_step_seconds: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let cfg = LinkConfig::default();
        Self {
            o2_per_h2: cfg.o2_per_h2.to_num::<f64>(),
            debounce_frames: cfg.debounce_frames,
            balance_interval_frames: cfg.balance_interval_frames,
            frame_step_seconds: cfg.frame_step_seconds.to_num::<f64>(),
        }
    }
}

impl ConfigFile {
    /// Convert to the engine config, validating ranges.
    pub fn into_config(self, file: &Path) -> Result<LinkConfig, ConfigLoadError> {
        if !self.o2_per_h2.is_finite() || self.o2_per_h2 < 0.0 {
            return Err(ConfigLoadError::InvalidValue {
                file: file.to_path_buf(),
                field: "o2_per_h2",
                detail: format!("must be finite and non-negative, got {}", self.o2_per_h2),
            });
        }
        if !self.frame_step_seconds.is_finite() || self.frame_step_seconds <= 0.0 {
            return Err(ConfigLoadError::InvalidValue {
                file: file.to_path_buf(),
                field: "frame_step_seconds",
                detail: format!("must be finite and positive, got {}", self.frame_step_seconds),
            });
        }
        Ok(LinkConfig {
            o2_per_h2: Fixed64::from_num(self.o2_per_h2),
            debounce_frames: self.debounce_frames,
            balance_interval_frames: self.balance_interval_frames,
            frame_step_seconds: Fixed64::from_num(self.frame_step_seconds),
        })
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Read and parse a config file according to its extension.
pub fn load_config(path: &Path) -> Result<LinkConfig, ConfigLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    let raw: ConfigFile = match format {
        Format::Ron => ron::from_str(&content).map_err(|e| ConfigLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        })?,
        Format::Json => serde_json::from_str(&content).map_err(|e| ConfigLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        })?,
        Format::Toml => toml::from_str(&content).map_err(|e| ConfigLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        })?,
    };
    raw.into_config(path)
}

/// Find `{base_name}.{ron,toml,json}` in `dir` and load it, or fall back to
/// the engine defaults if no file exists.
pub fn load_config_or_default(dir: &Path, base_name: &str) -> Result<LinkConfig, ConfigLoadError> {
    match find_config_file(dir, base_name)? {
        Some(path) => load_config(&path),
        None => Ok(LinkConfig::default()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
