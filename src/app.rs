use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::bundle::ResourceBundle;
use crate::config::ResolvedConfig;
use crate::domain::{GranuleName, TimestampToken};
use crate::error::BundlerError;
use crate::extract::TemporalExtractor;
use crate::filter::FilterExpressionBuilder;
use crate::index::GranuleSpatialIndex;
use crate::package::BundlePackager;
use crate::retrieval::{RetrievalClient, compose_wfs_url, compose_wms_kml_url};

pub const FEATURE_OUTPUT_FORMAT: &str = "shape-zip";

#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub min_time: String,
    pub max_time: String,
    pub workspace: String,
    pub layer: String,
    pub mosaic_dir: Utf8PathBuf,
    pub granule_names: Vec<GranuleName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub granules_matched: Vec<String>,
    pub granules_skipped: Vec<String>,
    pub interval_filter: String,
    pub discrete_filter: String,
    pub feature_url: String,
    pub map_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub archive: String,
    pub packed: usize,
    pub skipped: usize,
    pub granules_matched: usize,
    pub granules_skipped: usize,
}

/// Everything the filter-composition half of the pipeline produces, before any
/// retrieval happens.
struct Prepared {
    bundle: ResourceBundle,
    matched: Vec<String>,
    skipped: Vec<String>,
    interval_filter: String,
    discrete_filter: String,
    feature_url: String,
    map_url: String,
}

/// The download-and-bundle pipeline. One instance per request context; the
/// retrieval client is a seam so tests can run without a live endpoint.
pub struct App<R: RetrievalClient> {
    config: ResolvedConfig,
    retrieval: R,
}

impl<R: RetrievalClient> App<R> {
    pub fn new(config: ResolvedConfig, retrieval: R) -> Self {
        Self { config, retrieval }
    }

    /// Composes the filters and reports what a `run` would do, without
    /// retrieving or packaging anything.
    pub fn plan(&self, request: &BundleRequest) -> Result<PlanReport, BundlerError> {
        let prepared = self.prepare(request)?;
        Ok(PlanReport {
            granules_matched: prepared.matched,
            granules_skipped: prepared.skipped,
            interval_filter: prepared.interval_filter,
            discrete_filter: prepared.discrete_filter,
            feature_url: prepared.feature_url,
            map_url: prepared.map_url,
        })
    }

    /// The full pipeline: filter composition, artifact retrieval, packaging,
    /// cleanup of the downloaded temporaries.
    pub fn run(
        &self,
        request: &BundleRequest,
        output_archive: &Utf8Path,
    ) -> Result<BundleReport, BundlerError> {
        let mut prepared = self.prepare(request)?;

        fs::create_dir_all(self.config.output_dir.as_std_path())
            .map_err(|err| BundlerError::Filesystem(err.to_string()))?;

        let feature_path = self.download_artifact(
            &prepared.feature_url,
            &format!("{}-features-", request.layer),
            ".zip",
        )?;
        prepared.bundle.add_deletable(feature_path);
        info!("feature archive retrieved");

        let map_path = self.download_artifact(
            &prepared.map_url,
            &format!("{}-map-", request.layer),
            ".kmz",
        )?;
        prepared.bundle.add_deletable(map_path);
        info!("rendered map retrieved");

        if let Some(parent) = output_archive.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        }
        let sink = fs::File::create(output_archive.as_std_path())
            .map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        let report = BundlePackager::pack(&prepared.bundle, sink)?;
        info!(
            archive = %output_archive,
            packed = report.packed,
            skipped = report.skipped,
            "bundle packaged"
        );

        Ok(BundleReport {
            archive: output_archive.to_string(),
            packed: report.packed,
            skipped: report.skipped,
            granules_matched: prepared.matched.len(),
            granules_skipped: prepared.skipped.len(),
        })
    }

    fn prepare(&self, request: &BundleRequest) -> Result<Prepared, BundlerError> {
        let mosaic_dir = &request.mosaic_dir;
        if !mosaic_dir.as_std_path().is_dir() {
            return Err(BundlerError::MosaicDirAccess(mosaic_dir.clone()));
        }

        let extractor = TemporalExtractor::from_mosaic_dir(mosaic_dir)?;

        let mut bundle = ResourceBundle::new();
        let mut timestamps: Vec<TimestampToken> = Vec::new();
        let mut matched = Vec::new();
        let mut skipped = Vec::new();
        for name in &request.granule_names {
            let granule_path = mosaic_dir.join(name.as_str());
            if !granule_path.as_std_path().is_file() {
                warn!(granule = %name, "granule file is missing or not readable, skipped");
                skipped.push(name.as_str().to_string());
                continue;
            }
            let Some(timestamp) = extractor.extract(name.as_str()) else {
                warn!(
                    granule = %name,
                    "file name does not carry a timestamp matching the configured pattern, skipped"
                );
                skipped.push(name.as_str().to_string());
                continue;
            };
            timestamps.push(timestamp);
            bundle.add_undeletable(granule_path);
            matched.push(name.as_str().to_string());
        }
        info!(count = matched.len(), "catalog granules added to the bundle");

        let index = GranuleSpatialIndex::load(mosaic_dir)?;
        let bboxes = index.lookup_bounding_boxes(&request.granule_names);

        let builder = FilterExpressionBuilder::new(self.config.geometry_field.clone());
        let interval_filter =
            builder.interval_spatial_filter(&request.min_time, &request.max_time, &bboxes);
        let discrete_filter = builder.discrete_time_filter(&timestamps);

        // Feature retrieval prefers the interval+bbox filter; when that one
        // degraded to empty, the discrete timestamp set still bounds the query.
        let feature_filter = if interval_filter.is_empty() {
            &discrete_filter
        } else {
            &interval_filter
        };
        let feature_url = compose_wfs_url(
            &self.config.base_url,
            &request.workspace,
            &request.layer,
            FEATURE_OUTPUT_FORMAT,
            feature_filter,
        );
        let map_url = compose_wms_kml_url(
            &self.config.base_url,
            &request.workspace,
            &request.layer,
            request.min_time.trim(),
            request.max_time.trim(),
            &builder.bbox_union(&bboxes),
        );

        Ok(Prepared {
            bundle,
            matched,
            skipped,
            interval_filter,
            discrete_filter,
            feature_url,
            map_url,
        })
    }

    fn download_artifact(
        &self,
        url: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<Utf8PathBuf, BundlerError> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(self.config.output_dir.as_std_path())
            .map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        let (_, path) = temp
            .keep()
            .map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        self.retrieval.download(url, &path)?;
        Utf8PathBuf::from_path_buf(path)
            .map_err(|_| BundlerError::Filesystem("non-utf8 artifact path".to_string()))
    }
}

/// The request interface accepts the granule list either as separate values or
/// as one semicolon-packed value (`"a.tif;b.tif"`).
pub fn expand_granule_names(raw: &[String]) -> Result<Vec<GranuleName>, BundlerError> {
    let parts: Vec<&str> = if raw.len() == 1 && raw[0].contains(';') {
        raw[0].split(';').collect()
    } else {
        raw.iter().map(String::as_str).collect()
    };
    parts.into_iter().map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    struct MockRetrieval;

    impl RetrievalClient for MockRetrieval {
        fn download(&self, _url: &str, destination: &Path) -> Result<(), BundlerError> {
            fs::write(destination, b"artifact bytes")
                .map_err(|err| BundlerError::Filesystem(err.to_string()))
        }
    }

    fn fixture_config(dir: &Utf8Path) -> ResolvedConfig {
        ResolvedConfig {
            base_url: "http://localhost:8080/geoserver".to_string(),
            geometry_field: "wkb_geometry".to_string(),
            output_dir: dir.join("downloads"),
        }
    }

    fn fixture_mosaic(dir: &Utf8Path) -> Utf8PathBuf {
        let mosaic = dir.join("mosaic");
        fs::create_dir_all(mosaic.as_std_path()).unwrap();
        fs::write(
            mosaic.join("timeregex.properties").as_std_path(),
            "regex=\\d{8}\n",
        )
        .unwrap();
        fs::write(
            mosaic.join("granules.json").as_std_path(),
            r#"[
                {"location":"g_20100101.tif","bbox":{"min_x":0.0,"min_y":0.0,"max_x":1.0,"max_y":1.0}},
                {"location":"g_20100105.tif","bbox":{"min_x":2.0,"min_y":2.0,"max_x":3.0,"max_y":3.0}}
            ]"#,
        )
        .unwrap();
        fs::write(mosaic.join("g_20100101.tif").as_std_path(), b"raster a").unwrap();
        fs::write(mosaic.join("g_20100105.tif").as_std_path(), b"raster b").unwrap();
        mosaic
    }

    fn fixture_request(mosaic: Utf8PathBuf) -> BundleRequest {
        BundleRequest {
            min_time: "2010-01-01".to_string(),
            max_time: "2010-01-06".to_string(),
            workspace: "ws".to_string(),
            layer: "detections".to_string(),
            mosaic_dir: mosaic,
            granule_names: vec![
                "g_20100101.tif".parse().unwrap(),
                "g_20100105.tif".parse().unwrap(),
            ],
        }
    }

    #[test]
    fn plan_composes_both_filters() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mosaic = fixture_mosaic(&dir);
        let app = App::new(fixture_config(&dir), MockRetrieval);

        let plan = app.plan(&fixture_request(mosaic)).unwrap();
        assert_eq!(plan.granules_matched.len(), 2);
        assert!(plan.interval_filter.starts_with("time%20DURING%20"));
        assert_eq!(
            plan.discrete_filter,
            "time%20IN%20('20100101','20100105')"
        );
        assert!(plan.feature_url.contains("CQL_FILTER=time%20DURING%20"));
        assert!(plan.map_url.contains("time=2010-01-01/2010-01-06"));
    }

    #[test]
    fn plan_falls_back_to_discrete_filter_on_bad_interval() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mosaic = fixture_mosaic(&dir);
        let app = App::new(fixture_config(&dir), MockRetrieval);

        let mut request = fixture_request(mosaic);
        request.min_time = "not-a-date".to_string();
        let plan = app.plan(&request).unwrap();
        assert_eq!(plan.interval_filter, "");
        assert!(plan.feature_url.contains("CQL_FILTER=time%20IN%20("));
    }

    #[test]
    fn missing_granule_is_skipped_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mosaic = fixture_mosaic(&dir);
        let app = App::new(fixture_config(&dir), MockRetrieval);

        let mut request = fixture_request(mosaic);
        request.granule_names.push("gone.tif".parse().unwrap());
        let plan = app.plan(&request).unwrap();
        assert_eq!(plan.granules_matched.len(), 2);
        assert_eq!(plan.granules_skipped, vec!["gone.tif".to_string()]);
    }

    #[test]
    fn expand_semicolon_packed_names() {
        let names = expand_granule_names(&["a.tif;b.tif".to_string()]).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[1].as_str(), "b.tif");

        let names = expand_granule_names(&["a.tif".to_string(), "b.tif".to_string()]).unwrap();
        assert_eq!(names.len(), 2);
    }
}
