use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::DataIngestionConfig;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches the raw source file and rewrites it as a comma-separated dataset.
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    /// Download (or copy) the source into the stage directory.
    ///
    /// A previous download is reused only while it was fetched from the same URL;
    /// local sources are always copied again.
    pub fn download_file(&self) -> Result<()> {
        let target = &self.config.local_data_file;
        let source = self.config.source_url.trim();
        if is_remote(source) && self.cached_download_matches() {
            let size = fs::metadata(target)?.len();
            info!("File already exists of size: {} bytes ({})", size, target.display());
            return Ok(());
        }

        if is_remote(source) {
            let client = reqwest::blocking::Client::builder()
                .timeout(DOWNLOAD_TIMEOUT)
                .build()?;
            let response = client.get(source).send()?.error_for_status()?;
            let bytes = response.bytes()?;
            fs::write(target, &bytes)?;
            fs::write(self.source_marker(), source)?;
            info!("{} downloaded ({} bytes) to {}", source, bytes.len(), target.display());
        } else {
            let source_path = Path::new(source);
            if !source_path.is_file() {
                return Err(PipelineError::Config(format!(
                    "data source '{}' is neither an http(s) URL nor an existing file",
                    source
                )));
            }
            let copied = fs::copy(source_path, target)?;
            // Stale once the raw file no longer comes from a URL
            let _ = fs::remove_file(self.source_marker());
            info!("Copied {} ({} bytes) to {}", source, copied, target.display());
        }
        Ok(())
    }

    /// Re-read the raw file with the source delimiter and write the dataset artifact.
    pub fn normalize(&self) -> Result<Dataset> {
        let data = Dataset::from_csv_with_delimiter(&self.config.local_data_file, self.config.source_delimiter)?;
        if data.n_columns() == 0 {
            return Err(PipelineError::EmptyDataset(format!(
                "no columns in {}",
                self.config.local_data_file.display()
            )));
        }
        data.write_csv(&self.config.data_file)?;
        let (rows, cols) = data.shape();
        info!("Ingested dataset with {} rows x {} columns into {}", rows, cols, self.config.data_file.display());
        Ok(data)
    }

    /// True when the raw file exists and was fetched from the configured source
    pub fn cached_download_matches(&self) -> bool {
        self.config.local_data_file.is_file()
            && fs::read_to_string(self.source_marker())
                .map(|recorded| recorded == self.config.source_url.trim())
                .unwrap_or(false)
    }

    /// `<raw file>.source`, holding the URL the raw file came from
    fn source_marker(&self) -> PathBuf {
        let mut name = self
            .config
            .local_data_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".source");
        self.config.local_data_file.with_file_name(name)
    }

    pub fn data_file(&self) -> &Path {
        &self.config.data_file
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
