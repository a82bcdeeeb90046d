use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::BundlerError;

/// Feature-retrieval URL (WFS GetFeature). The CQL filter is already
/// percent-encoded by the filter builder and is appended verbatim; an empty
/// filter means no `CQL_FILTER` parameter at all.
pub fn compose_wfs_url(
    base_url: &str,
    workspace: &str,
    layer: &str,
    output_format: &str,
    cql_filter: &str,
) -> String {
    let mut url = format!(
        "{}/{}/ows?service=WFS&version=1.0.0&request=GetFeature&typeName={}:{}&outputFormat={}",
        base_url.trim_end_matches('/'),
        workspace,
        workspace,
        layer,
        output_format
    );
    if !cql_filter.is_empty() {
        url.push_str("&CQL_FILTER=");
        url.push_str(cql_filter);
    }
    debug!(url, "feature retrieval URL composed");
    url
}

/// Map-rendering URL (WMS KML reflector in download mode). Carries the raw
/// time bounds as the `time` dimension plus the OR-joined bbox filter.
pub fn compose_wms_kml_url(
    base_url: &str,
    workspace: &str,
    layer: &str,
    min_time: &str,
    max_time: &str,
    bbox_filter: &str,
) -> String {
    let mut url = format!(
        "{}/{}/wms/kml?layers={}:{}&mode=download",
        base_url.trim_end_matches('/'),
        workspace,
        workspace,
        layer
    );
    if !min_time.is_empty() && !max_time.is_empty() {
        url.push_str("&time=");
        url.push_str(min_time);
        url.push('/');
        url.push_str(max_time);
    }
    if !bbox_filter.is_empty() {
        url.push_str("&CQL_FILTER=");
        url.push_str(bbox_filter);
    }
    debug!(url, "map rendering URL composed");
    url
}

pub trait RetrievalClient: Send + Sync {
    fn download(&self, url: &str, destination: &Path) -> Result<(), BundlerError>;
}

#[derive(Clone)]
pub struct HttpRetrievalClient {
    client: Client,
}

impl HttpRetrievalClient {
    pub fn new() -> Result<Self, BundlerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("mosaic-bundler/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BundlerError::RetrievalHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| BundlerError::RetrievalHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), BundlerError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "retrieval request failed".to_string());
            return Err(BundlerError::RetrievalStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| BundlerError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl RetrievalClient for HttpRetrievalClient {
    fn download(&self, url: &str, destination: &Path) -> Result<(), BundlerError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BundlerError::RetrievalHttp(err.to_string()))?;
        self.write_response_to_file(response, destination)
    }
}
