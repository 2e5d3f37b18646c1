//! Persisted tool configuration.
//!
//! Mirrors the on-disk `config.json` of the workflow this tool automates:
//! the template path, the raw replace items, the output filename format,
//! and the highlight color. The batch driver never reads this; the binary
//! resolves config plus flag overrides into an explicit options value.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tokens::DEFAULT_DELIMITER;

/// Color applied to every run the substitution engine rewrites.
///
/// A closed two-variant choice; anything else is rejected when parsing
/// config or CLI flags rather than silently defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    /// Pure red, the emphasis color.
    Red,
    /// Pure black, matching ordinary body text.
    Black,
}

impl Default for HighlightColor {
    fn default() -> Self {
        HighlightColor::Red
    }
}

impl HighlightColor {
    /// RRGGBB hex value as written into run properties.
    pub fn hex(self) -> &'static str {
        match self {
            HighlightColor::Red => "FF0000",
            HighlightColor::Black => "000000",
        }
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(HighlightColor::Red),
            "black" => Ok(HighlightColor::Black),
            other => Err(format!("unknown highlight color {other:?} (expected \"red\" or \"black\")")),
        }
    }
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

/// Saved tool state. All paths optional so a partially-configured file
/// still loads; `is_complete` gates actually running a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Path to the DOCX template.
    pub template: Option<PathBuf>,
    /// Path to the tabular data source (xlsx or csv).
    pub data_path: Option<PathBuf>,
    /// Directory output documents are written into.
    pub output_dir: Option<PathBuf>,
    /// Raw replace items, as entered (split on use, not on store).
    #[serde(default)]
    pub replace_items: Vec<String>,
    /// Output filename format pattern.
    pub output_format: Option<String>,
    #[serde(default)]
    pub color: HighlightColor,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl MergeConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(MergeConfig {
                delimiter: DEFAULT_DELIMITER,
                ..MergeConfig::default()
            });
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// True once everything a batch run needs is present.
    pub fn is_complete(&self) -> bool {
        self.template.is_some()
            && self.data_path.is_some()
            && self.output_dir.is_some()
            && !self.replace_items.is_empty()
            && self.output_format.is_some()
    }
}
