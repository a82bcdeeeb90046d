use std::fs;

use camino::Utf8Path;
use regex::Regex;

use crate::domain::TimestampToken;
use crate::error::BundlerError;

pub const TIME_REGEX_FILE: &str = "timeregex.properties";

/// Extracts the timestamp token embedded in granule file names.
///
/// The pattern comes from the mosaic's `timeregex.properties` resource and is
/// compiled exactly once; a missing or invalid pattern makes the whole run
/// unusable, so construction is the only fallible step.
#[derive(Debug, Clone)]
pub struct TemporalExtractor {
    pattern: Regex,
}

impl TemporalExtractor {
    pub fn from_pattern(pattern: &str) -> Result<Self, BundlerError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(BundlerError::InvalidTimeRegex(pattern.to_string()));
        }
        let pattern = Regex::new(trimmed)
            .map_err(|err| BundlerError::InvalidTimeRegex(err.to_string()))?;
        Ok(Self { pattern })
    }

    /// Loads the `regex=` key from `timeregex.properties` in the mosaic
    /// directory.
    pub fn from_mosaic_dir(mosaic_dir: &Utf8Path) -> Result<Self, BundlerError> {
        let path = mosaic_dir.join(TIME_REGEX_FILE);
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| BundlerError::MissingTimeRegex(path.clone()))?;
        let pattern = content
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .find_map(|line| {
                let (key, value) = line.split_once('=')?;
                (key.trim() == "regex").then(|| value.trim().to_string())
            })
            .ok_or_else(|| BundlerError::InvalidTimeRegex(path.to_string()))?;
        Self::from_pattern(&pattern)
    }

    /// First left-to-right match in the file name, or `None`. A `None` granule
    /// is a per-item condition: callers skip it and keep processing the batch.
    pub fn extract(&self, file_name: &str) -> Option<TimestampToken> {
        self.pattern
            .find(file_name)
            .map(|m| TimestampToken::new(m.as_str()))
    }
}
