//! Upstream grid sources with retry and atomic finalize.
//!
//! The upstream array store is consumed only as "one monthly grid file per
//! layer". The HTTP source downloads with exponential-backoff retry and
//! finalizes via temp-file + rename so a partially written artifact never
//! satisfies a later existence check.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use tiles_common::{Layer, PipelineError, PipelineResult};

/// A source of monthly grid files, keyed by layer identity.
#[async_trait]
pub trait GridSource: Send + Sync {
    /// Fetch the monthly grid file for `layer` into `dest`.
    async fn fetch(&self, layer: &Layer, dest: &Path) -> PipelineResult<()>;
}

/// Configuration for the HTTP grid source.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// URL template with `{variable}`, `{month:02}`, `{year}` placeholders
    pub url_template: String,
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// Downloads monthly grid files over HTTP with retry.
pub struct HttpGridSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpGridSource {
    pub fn new(config: HttpSourceConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Expand the URL template for a layer.
    pub fn url_for(&self, layer: &Layer) -> String {
        self.config
            .url_template
            .replace("{variable}", &layer.variable)
            .replace("{month:02}", &format!("{:02}", layer.time.month))
            .replace("{year}", &layer.time.year.to_string())
    }

    async fn fetch_once(&self, url: &str, temp_path: &Path) -> PipelineResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::Transport(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let mut file = fs::File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| PipelineError::Transport(format!("Error reading response: {}", e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(())
    }
}

#[async_trait]
impl GridSource for HttpGridSource {
    #[instrument(skip(self), fields(layer = %layer))]
    async fn fetch(&self, layer: &Layer, dest: &Path) -> PipelineResult<()> {
        let url = self.url_for(layer);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = dest.with_extension("partial");

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.fetch_once(&url, &temp_path).await {
                Ok(()) => {
                    fs::rename(&temp_path, dest).await?;
                    info!(url = %url, path = %dest.display(), "Grid download complete");
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        fs::remove_file(&temp_path).await.ok();
                        return Err(PipelineError::Transport(format!(
                            "Download failed after {} retries: {}",
                            retry_count, e
                        )));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs(),
                        "Grid download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}

/// Serves monthly grid files from a local directory. Used when the data has
/// already been staged locally.
pub struct LocalGridSource {
    root: PathBuf,
}

impl LocalGridSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl GridSource for LocalGridSource {
    #[instrument(skip(self), fields(layer = %layer))]
    async fn fetch(&self, layer: &Layer, dest: &Path) -> PipelineResult<()> {
        let src = self.root.join(layer.grid_csv_name());
        if !src.exists() {
            return Err(PipelineError::Transport(format!(
                "Staged grid file not found: {}",
                src.display()
            )));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = dest.with_extension("partial");
        fs::copy(&src, &temp_path).await?;
        fs::rename(&temp_path, dest).await?;

        debug!(src = %src.display(), dest = %dest.display(), "Staged grid file copied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiles_common::TimeKey;

    #[test]
    fn test_url_template_expansion() {
        let source = HttpGridSource::new(HttpSourceConfig {
            url_template: "https://grids.example.com/{variable}/{variable}_{month:02}_{year}.csv"
                .to_string(),
            ..Default::default()
        })
        .unwrap();

        let layer = Layer::new("RH2M", TimeKey::new(2022, 1).unwrap());
        assert_eq!(
            source.url_for(&layer),
            "https://grids.example.com/RH2M/RH2M_01_2022.csv"
        );
    }

    #[tokio::test]
    async fn test_local_source_copies_staged_file() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let layer = Layer::new("RH2M", TimeKey::new(2022, 1).unwrap());

        tokio::fs::write(staging.path().join("RH2M_01_2022.csv"), "time,lat,lon,RH2M\n")
            .await
            .unwrap();

        let source = LocalGridSource::new(staging.path());
        let dest = out.path().join("RH2M_01_2022.csv");
        source.fetch(&layer, &dest).await.unwrap();

        let copied = tokio::fs::read_to_string(&dest).await.unwrap();
        assert_eq!(copied, "time,lat,lon,RH2M\n");
        assert!(!dest.with_extension("partial").exists());
    }

    #[tokio::test]
    async fn test_local_source_missing_file_is_transport_error() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let layer = Layer::new("T2M", TimeKey::new(2023, 6).unwrap());

        let source = LocalGridSource::new(staging.path());
        let err = source
            .fetch(&layer, &out.path().join("T2M_06_2023.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), tiles_common::ErrorKind::Transport);
    }
}
