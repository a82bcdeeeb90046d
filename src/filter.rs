use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

use crate::domain::{BoundingBox, TimestampToken};

/// Composes CQL filter expressions ready for direct embedding in a URL query
/// string: keyword boundaries are `%20`-encoded at construction, never
/// re-encoded afterwards.
///
/// The geometry field name is fixed at construction. It names the catalog
/// column spatial predicates run against and is configuration, not data.
#[derive(Debug, Clone)]
pub struct FilterExpressionBuilder {
    geometry_field: String,
}

impl FilterExpressionBuilder {
    pub fn new(geometry_field: impl Into<String>) -> Self {
        Self {
            geometry_field: geometry_field.into(),
        }
    }

    pub fn geometry_field(&self) -> &str {
        &self.geometry_field
    }

    /// Discrete timestamp-set filter: `time%20IN%20('t1','t2',...)`.
    ///
    /// Tokens are emitted in input order, quoted, without de-duplication.
    /// An empty sequence yields the empty string: no clause at all.
    pub fn discrete_time_filter(&self, timestamps: &[TimestampToken]) -> String {
        if timestamps.is_empty() {
            return String::new();
        }
        let mut out = String::from("time%20IN%20");
        for (i, token) in timestamps.iter().enumerate() {
            if i == 0 {
                out.push_str("('");
            } else {
                out.push_str(",'");
            }
            out.push_str(token.as_str());
            out.push('\'');
        }
        out.push(')');
        out
    }

    /// Interval + bbox-union filter:
    /// `time%20DURING%20<min>/<max>[%20AND%20(BBOX(..)%20OR%20BBOX(..))]`.
    ///
    /// Both interval bounds must parse; a failure on either one degrades the
    /// whole expression to the empty string — logged, never raised, and never
    /// a partial temporal-only or spatial-only filter. With a valid interval,
    /// the spatial clause is appended only when the bbox map is non-empty.
    pub fn interval_spatial_filter(
        &self,
        min_raw: &str,
        max_raw: &str,
        bboxes: &BTreeMap<String, BoundingBox>,
    ) -> String {
        let min = parse_time_candidates(min_raw).into_iter().next();
        let max = parse_time_candidates(max_raw).into_iter().next();
        let (Some(min), Some(max)) = (min, max) else {
            warn!(
                min = min_raw,
                max = max_raw,
                "time interval bounds did not parse, the CQL filter is empty"
            );
            return String::new();
        };

        let mut out = format!(
            "time%20DURING%20{}/{}",
            format_instant(min),
            format_instant(max)
        );
        if !bboxes.is_empty() {
            out.push_str("%20AND%20(");
            out.push_str(&self.bbox_union(bboxes));
            out.push(')');
        }
        out
    }

    /// OR-union of one `BBOX(field,minX,minY,maxX,maxY)` clause per entry, in
    /// map iteration order. Usable on its own as a purely spatial filter.
    pub fn bbox_union(&self, bboxes: &BTreeMap<String, BoundingBox>) -> String {
        let clauses: Vec<String> = bboxes.values().map(|bbox| self.bbox_clause(bbox)).collect();
        clauses.join("%20OR%20")
    }

    fn bbox_clause(&self, bbox: &BoundingBox) -> String {
        format!(
            "BBOX({},{},{},{},{})",
            self.geometry_field, bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
        )
    }
}

/// Flexible date-token parsing: every format interpretation that accepts the
/// input contributes a candidate instant, in a fixed scan order. Callers take
/// the first candidate. Date-only inputs resolve to midnight.
pub fn parse_time_candidates(raw: &str) -> Vec<NaiveDateTime> {
    let trimmed = raw.trim();
    let mut candidates = Vec::new();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        candidates.push(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y%m%dT%H%M%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            candidates.push(parsed);
        }
    }
    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            candidates.push(parsed.and_time(NaiveTime::MIN));
        }
    }
    candidates
}

/// Seconds precision, no fractional part, no zone suffix. Both interval bounds
/// go through this one function so their representations stay bit-identical.
fn format_instant(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S").to_string()
}
