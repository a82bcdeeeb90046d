use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::{BoundingBox, GranuleName};
use crate::error::BundlerError;

pub const GRANULE_INDEX_FILE: &str = "granules.json";

/// One row of the mosaic's granule catalog: where the raster lives and the
/// spatial extent the catalog recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleRecord {
    pub location: String,
    pub bbox: BoundingBox,
}

impl GranuleRecord {
    /// Trailing path segment of the location string, the token granule names
    /// are matched against.
    pub fn file_name(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }
}

/// Read-only spatial catalog of a mosaic directory. Loaded once per request;
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GranuleSpatialIndex {
    records: Vec<GranuleRecord>,
}

impl GranuleSpatialIndex {
    pub fn from_records(records: Vec<GranuleRecord>) -> Self {
        Self { records }
    }

    /// Loads the `granules.json` sidecar index of a mosaic directory.
    ///
    /// An absent or malformed index is an error: without records there is no
    /// spatial contribution to make and the caller must decide whether that is
    /// fatal for the whole run.
    pub fn load(mosaic_dir: &Utf8Path) -> Result<Self, BundlerError> {
        let index_path = mosaic_dir.join(GRANULE_INDEX_FILE);
        let content = fs::read_to_string(index_path.as_std_path())
            .map_err(|err| BundlerError::IndexLoad(format!("{index_path}: {err}")))?;
        let records: Vec<GranuleRecord> = serde_json::from_str(&content)
            .map_err(|err| BundlerError::IndexLoad(format!("{index_path}: {err}")))?;
        Ok(Self::from_records(records))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Resolves bounding boxes for the requested granule names.
    ///
    /// A name matches a record when it equals the trailing path segment of the
    /// record's location. Unmatched names are silently absent from the result;
    /// absence means "no spatial contribution", not an error. The returned map
    /// is keyed by the record's full location string, so iteration order is
    /// deterministic.
    pub fn lookup_bounding_boxes(&self, names: &[GranuleName]) -> BTreeMap<String, BoundingBox> {
        let mut matched = BTreeMap::new();
        for record in &self.records {
            let file_name = record.file_name();
            if names.iter().any(|name| name.as_str() == file_name) {
                matched.insert(record.location.clone(), record.bbox);
            }
        }
        matched
    }
}
