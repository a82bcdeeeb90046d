use std::fs;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::BundlerError;

pub const CONFIG_FILE: &str = "mosaic-bundler.json";

/// On-disk settings file. Every field is optional; the CLI can supply or
/// override each one.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub geometry_field: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// CLI-level overrides, applied on top of the settings file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub geometry_field: Option<String>,
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub geometry_field: String,
    pub output_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves settings from an explicit file, the default `mosaic-bundler.json`
    /// in the working directory, or an empty config when neither exists, then
    /// applies CLI overrides. The base URL and geometry field have no sensible
    /// defaults: leaving either unset is a fatal configuration error before
    /// any resource work begins.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, BundlerError> {
        let config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    Self::read_file(CONFIG_FILE)?
                } else {
                    Config::default()
                }
            }
        };
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, BundlerError> {
        let base_url = overrides
            .base_url
            .or(config.base_url)
            .ok_or(BundlerError::MissingSetting("base_url"))?;
        let geometry_field = overrides
            .geometry_field
            .or(config.geometry_field)
            .ok_or(BundlerError::MissingSetting("geometry_field"))?;
        let output_dir = match overrides.output_dir.or(config.output_dir) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_output_dir()?,
        };

        Ok(ResolvedConfig {
            base_url,
            geometry_field,
            output_dir,
        })
    }

    fn read_file(path: &str) -> Result<Config, BundlerError> {
        let content = fs::read_to_string(path)
            .map_err(|_| BundlerError::ConfigRead(Utf8PathBuf::from(path)))?;
        serde_json::from_str(&content).map_err(|err| BundlerError::ConfigParse(err.to_string()))
    }
}

fn default_output_dir() -> Result<Utf8PathBuf, BundlerError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("mosaic-bundler")
                    .join("downloads"),
            )
            .ok()
        })
        .ok_or_else(|| BundlerError::Filesystem("unable to resolve output directory".to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn overrides_take_precedence() {
        let config = Config {
            base_url: Some("http://file/geoserver".to_string()),
            geometry_field: Some("wkb_geometry".to_string()),
            output_dir: Some("/tmp/out".to_string()),
        };
        let overrides = ConfigOverrides {
            base_url: Some("http://cli/geoserver".to_string()),
            ..ConfigOverrides::default()
        };

        let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
        assert_eq!(resolved.base_url, "http://cli/geoserver");
        assert_eq!(resolved.geometry_field, "wkb_geometry");
        assert_eq!(resolved.output_dir, Utf8PathBuf::from("/tmp/out"));
    }

    #[test]
    fn missing_geometry_field_is_fatal() {
        let config = Config {
            base_url: Some("http://host/geoserver".to_string()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config, ConfigOverrides::default()).unwrap_err();
        assert_matches!(err, BundlerError::MissingSetting("geometry_field"));
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let err =
            ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default()).unwrap_err();
        assert_matches!(err, BundlerError::MissingSetting("base_url"));
    }
}
