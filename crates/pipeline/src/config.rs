//! Run configuration loaded from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use acquisition::HttpSourceConfig;
use publisher::PublicationTarget;
use tiles_common::{Layer, PipelineError, PipelineResult, TimeKey};
use tiler::ZoomRange;

use crate::stage::SkipPolicy;

/// Root configuration for a pipeline run.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Variables to publish (e.g. ["RH2M", "T2M", "PRECTOT"]).
    pub variables: Vec<String>,
    /// First month to process (inclusive).
    pub start: MonthSpec,
    /// Last month to process (inclusive).
    pub end: MonthSpec,
    pub workspace: WorkspaceConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub tiling: TilingConfig,
    pub storage: PublicationTarget,
    #[serde(default)]
    pub skip: SkipConfig,
    /// Layers processed concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Optional land mask JSON file. Without one every cell counts as land.
    #[serde(default)]
    pub land_mask: Option<PathBuf>,
}

fn default_max_concurrent() -> usize {
    2
}

/// A year and month as written in config.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MonthSpec {
    pub year: i32,
    pub month: u32,
}

impl MonthSpec {
    pub fn to_time_key(self) -> PipelineResult<TimeKey> {
        TimeKey::new(self.year, self.month)
    }
}

/// Local working directories for intermediate artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Downloaded grids and encoded GeoJSON
    pub data_dir: PathBuf,
    /// Tile archives
    pub mbtiles_dir: PathBuf,
    /// Exploded tile trees
    pub tiles_dir: PathBuf,
}

/// Where monthly grid files come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Download over HTTP with retry.
    Http {
        /// URL template with `{variable}`, `{month:02}`, `{year}` placeholders
        url_template: String,
        #[serde(default = "default_max_retries")]
        max_retries: u32,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    /// Copy from an already staged local directory.
    Local { root: PathBuf },
}

fn default_max_retries() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl SourceConfig {
    pub fn http_config(&self) -> Option<HttpSourceConfig> {
        match self {
            SourceConfig::Http {
                url_template,
                max_retries,
                request_timeout_secs,
            } => Some(HttpSourceConfig {
                url_template: url_template.clone(),
                max_retries: *max_retries,
                request_timeout: Duration::from_secs(*request_timeout_secs),
                ..Default::default()
            }),
            SourceConfig::Local { .. } => None,
        }
    }
}

/// Tile generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TilingConfig {
    #[serde(default = "default_minzoom")]
    pub minzoom: u32,
    #[serde(default = "default_maxzoom")]
    pub maxzoom: u32,
    /// tippecanoe binary name or path
    #[serde(default = "default_tippecanoe")]
    pub tippecanoe: String,
    /// mb-util binary name or path
    #[serde(default = "default_mbutil")]
    pub mbutil: String,
    /// Kill either tool after this long
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_minzoom() -> u32 {
    0
}

fn default_maxzoom() -> u32 {
    6
}

fn default_tippecanoe() -> String {
    "tippecanoe".to_string()
}

fn default_mbutil() -> String {
    "mb-util".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    1800
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            minzoom: default_minzoom(),
            maxzoom: default_maxzoom(),
            tippecanoe: default_tippecanoe(),
            mbutil: default_mbutil(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl TilingConfig {
    pub fn zoom_range(&self) -> PipelineResult<ZoomRange> {
        ZoomRange::new(self.minzoom, self.maxzoom)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Per-stage skip flags as written in config.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SkipConfig {
    #[serde(default)]
    pub download: bool,
    #[serde(default)]
    pub encode: bool,
    #[serde(default)]
    pub build_archive: bool,
    #[serde(default)]
    pub explode: bool,
    #[serde(default)]
    pub publish: bool,
}

impl SkipConfig {
    pub fn to_policy(self) -> SkipPolicy {
        SkipPolicy {
            download: self.download,
            encode: self.encode,
            build_archive: self.build_archive,
            explode: self.explode,
            publish: self.publish,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.variables.is_empty() {
            return Err(PipelineError::Config(
                "at least one variable is required".to_string(),
            ));
        }
        let start = self.start.to_time_key()?;
        let end = self.end.to_time_key()?;
        if start > end {
            return Err(PipelineError::Config(format!(
                "start month {} is after end month {}",
                start, end
            )));
        }
        self.tiling.zoom_range()?;
        if self.max_concurrent == 0 {
            return Err(PipelineError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if let SourceConfig::Http { url_template, .. } = &self.source {
            if url_template.is_empty() {
                return Err(PipelineError::Config(
                    "source.url_template must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Expand variables and the month range into the full layer list,
    /// ordered by variable then month.
    pub fn layers(&self) -> PipelineResult<Vec<Layer>> {
        let start = self.start.to_time_key()?;
        let end = self.end.to_time_key()?;
        let mut layers = Vec::new();
        for variable in &self.variables {
            for time in TimeKey::range(start, end) {
                layers.push(Layer::new(variable.clone(), time));
            }
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
variables: [RH2M, T2M]
start: { year: 2022, month: 1 }
end: { year: 2022, month: 3 }
workspace:
  data_dir: /work/data
  mbtiles_dir: /work/mbtiles
  tiles_dir: /work/tiles
source:
  type: http
  url_template: "https://grids.example.com/{variable}/{variable}_{month:02}_{year}.csv"
tiling:
  minzoom: 0
  maxzoom: 5
storage:
  bucket: climate-tiles
  region: us-east-1
skip:
  download: true
  publish: true
"#;

    #[test]
    fn test_parse_full_config() {
        let config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        config.validate().unwrap();

        assert_eq!(config.variables, vec!["RH2M", "T2M"]);
        assert_eq!(config.tiling.maxzoom, 5);
        assert_eq!(config.max_concurrent, 2);

        let policy = config.skip.to_policy();
        assert!(policy.download);
        assert!(policy.publish);
        assert!(!policy.encode);

        let layers = config.layers().unwrap();
        assert_eq!(layers.len(), 6);
        assert_eq!(layers[0].slug(), "RH2M_01_2022_land");
        assert_eq!(layers[5].slug(), "T2M_03_2022_land");
    }

    #[test]
    fn test_invalid_month_rejected() {
        let mut config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        config.start.month = 13;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), tiles_common::ErrorKind::Config);
    }

    #[test]
    fn test_start_after_end_rejected() {
        let mut config: PipelineConfig = serde_yaml::from_str(YAML).unwrap();
        config.start = MonthSpec { year: 2023, month: 1 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_source() {
        let yaml = YAML.replace(
            "  type: http\n  url_template: \"https://grids.example.com/{variable}/{variable}_{month:02}_{year}.csv\"",
            "  type: local\n  root: /staged",
        );
        let config: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        config.validate().unwrap();
        assert!(matches!(config.source, SourceConfig::Local { .. }));
        assert!(config.source.http_config().is_none());
    }
}
