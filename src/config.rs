//! Export-side configuration consumed by the encoder.
//!
//! The encoder never parses workspace or mapping files itself; it is handed
//! an [`ExportConfig`] value resolved by the caller. A JSON loader is
//! provided for the common case of file-driven runs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Block compression algorithm for the probabilistic output file.
///
/// The selected code is recorded in the file header's flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Zlib,
    Zstd,
}
impl Compression {
    /// Algorithm code stored in the low bits of the header flag word
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Zstd => 2,
        }
    }
}

fn default_progress_interval() -> u64 {
    1000
}

/// Configuration surface of one export pass.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Prefix for the five output files (`<prefix>.fam`, `<prefix>.bed`, ...)
    pub output_prefix: PathBuf,

    /// Optional newline-delimited sample-identifier list; when present, the
    /// probabilistic file carries a sample-identifier block
    #[serde(default)]
    pub sample_list: Option<PathBuf>,

    /// Progress log line cadence, in variants
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Block compression selector for the probabilistic file
    #[serde(default)]
    pub compression: Compression,
}
impl ExportConfig {
    pub fn new(output_prefix: impl Into<PathBuf>) -> Self {
        Self {
            output_prefix: output_prefix.into(),
            sample_list: None,
            progress_interval: default_progress_interval(),
            compression: Compression::default(),
        }
    }

    /// Loads the configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader).map_err(anyhow::Error::from)?;
        Ok(config)
    }

    /// Reads the sample-identifier list, one identifier per line.
    pub fn load_sample_list(&self) -> Result<Option<Vec<String>>> {
        let Some(path) = &self.sample_list else {
            return Ok(None);
        };
        let reader = BufReader::new(File::open(path)?);
        let mut samples = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                samples.push(trimmed.to_string());
            }
        }
        Ok(Some(samples))
    }
}
