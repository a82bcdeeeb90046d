use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use mosaic_bundler::app::{App, BundleRequest};
use mosaic_bundler::config::ResolvedConfig;
use mosaic_bundler::error::BundlerError;
use mosaic_bundler::retrieval::RetrievalClient;
use zip::ZipArchive;

struct RecordingRetrieval;

impl RetrievalClient for RecordingRetrieval {
    fn download(&self, url: &str, destination: &Path) -> Result<(), BundlerError> {
        fs::write(destination, url.as_bytes())
            .map_err(|err| BundlerError::Filesystem(err.to_string()))
    }
}

struct FailingRetrieval;

impl RetrievalClient for FailingRetrieval {
    fn download(&self, _url: &str, _destination: &Path) -> Result<(), BundlerError> {
        Err(BundlerError::RetrievalStatus {
            status: 503,
            message: "unavailable".to_string(),
        })
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
            {"location":"file:/data/g_20100101.tif","bbox":{"min_x":0.0,"min_y":0.0,"max_x":1.0,"max_y":1.0}},
            {"location":"file:/data/g_20100105.tif","bbox":{"min_x":9.88,"min_y":37.98,"max_x":10.31,"max_y":38.38}}
        ]"#,
    )
    .unwrap();
    fs::write(mosaic.join("g_20100101.tif").as_std_path(), b"raster a").unwrap();
    fs::write(mosaic.join("g_20100105.tif").as_std_path(), b"raster b").unwrap();
    mosaic
}

fn fixture_config(dir: &Utf8Path) -> ResolvedConfig {
    ResolvedConfig {
        base_url: "http://localhost:8080/geoserver".to_string(),
        geometry_field: "wkb_geometry".to_string(),
        output_dir: dir.join("downloads"),
    }
}

fn fixture_request(mosaic: Utf8PathBuf) -> BundleRequest {
    BundleRequest {
        min_time: "2010-01-01".to_string(),
        max_time: "2010-01-06".to_string(),
        workspace: "mariss".to_string(),
        layer: "tem_sd".to_string(),
        mosaic_dir: mosaic,
        granule_names: vec![
            "g_20100101.tif".parse().unwrap(),
            "g_20100105.tif".parse().unwrap(),
        ],
    }
}

#[test]
fn full_pipeline_bundles_granules_and_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let mosaic = fixture_mosaic(&dir);
    let config = fixture_config(&dir);
    let output_dir = config.output_dir.clone();
    let app = App::new(config, RecordingRetrieval);

    let archive_path = dir.join("out").join("bundle.zip");
    let report = app.run(&fixture_request(mosaic.clone()), &archive_path).unwrap();

    assert_eq!(report.granules_matched, 2);
    assert_eq!(report.granules_skipped, 0);
    assert_eq!(report.packed, 4);
    assert_eq!(report.skipped, 0);

    // downloaded temporaries were deleted after packaging
    let leftovers: Vec<_> = fs::read_dir(output_dir.as_std_path())
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());

    // catalog granules are untouched
    assert!(mosaic.join("g_20100101.tif").as_std_path().exists());
    assert!(mosaic.join("g_20100105.tif").as_std_path().exists());

    let mut archive =
        ZipArchive::new(fs::File::open(archive_path.as_std_path()).unwrap()).unwrap();
    assert_eq!(archive.len(), 4);
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert!(names.contains(&"g_20100101.tif".to_string()));
    assert!(names.contains(&"g_20100105.tif".to_string()));
    assert!(names.iter().any(|name| name.contains("tem_sd-features-")));
    assert!(names.iter().any(|name| name.contains("tem_sd-map-")));
}

#[test]
fn retrieved_artifacts_carry_the_composed_filters() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let mosaic = fixture_mosaic(&dir);
    let app = App::new(fixture_config(&dir), RecordingRetrieval);

    let archive_path = dir.join("bundle.zip");
    app.run(&fixture_request(mosaic), &archive_path).unwrap();

    let mut archive =
        ZipArchive::new(fs::File::open(archive_path.as_std_path()).unwrap()).unwrap();
    let mut feature_url = String::new();
    let mut map_url = String::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let name = entry.name().to_string();
        if name.contains("-features-") {
            std::io::Read::read_to_string(&mut entry, &mut feature_url).unwrap();
        } else if name.contains("-map-") {
            std::io::Read::read_to_string(&mut entry, &mut map_url).unwrap();
        }
    }

    assert!(feature_url.contains("request=GetFeature"));
    assert!(feature_url.contains("outputFormat=shape-zip"));
    assert!(feature_url.contains(
        "CQL_FILTER=time%20DURING%202010-01-01T00:00:00/2010-01-06T00:00:00%20AND%20("
    ));
    assert!(feature_url.contains("BBOX(wkb_geometry,0,0,1,1)"));
    assert!(feature_url.contains("%20OR%20BBOX(wkb_geometry,9.88,37.98,10.31,38.38)"));

    assert!(map_url.contains("/mariss/wms/kml?layers=mariss:tem_sd"));
    assert!(map_url.contains("time=2010-01-01/2010-01-06"));
    assert!(map_url.contains("CQL_FILTER=BBOX(wkb_geometry,0,0,1,1)"));
}

#[test]
fn retrieval_failure_propagates_and_keeps_catalog_files() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let mosaic = fixture_mosaic(&dir);
    let app = App::new(fixture_config(&dir), FailingRetrieval);

    let archive_path = dir.join("bundle.zip");
    let err = app.run(&fixture_request(mosaic.clone()), &archive_path).unwrap_err();
    assert!(matches!(err, BundlerError::RetrievalStatus { status: 503, .. }));
    assert!(mosaic.join("g_20100101.tif").as_std_path().exists());
}

#[test]
fn missing_index_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let mosaic = fixture_mosaic(&dir);
    fs::remove_file(mosaic.join("granules.json").as_std_path()).unwrap();
    let app = App::new(fixture_config(&dir), RecordingRetrieval);

    let err = app.plan(&fixture_request(mosaic)).unwrap_err();
    assert!(matches!(err, BundlerError::IndexLoad(_)));
}
