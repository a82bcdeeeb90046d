use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BundlerError;

/// Identifier of one granule file, the trailing path segment of its catalog
/// location (e.g. `tem_sd_20100101.tif`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GranuleName(String);

impl GranuleName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GranuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GranuleName {
    type Err = BundlerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains('\\') {
            return Err(BundlerError::InvalidGranuleName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A timestamp token lifted out of a granule file name. Opaque: the extractor
/// does no date parsing, only pattern matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken(String);

impl TimestampToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimestampToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned bounding box in the catalog's coordinate reference.
///
/// Upstream catalogs are not trusted to keep min <= max; inverted bounds are
/// carried through unchanged rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}
