use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::quality::{Quality, StreamLink};

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("Stream link for quality {0} can't be retrieved. Please try again")]
    LinkNotAvailable(Quality),
    #[error("Download failed with error: {0}")]
    DownloadFailed(String),
    #[error("I/O error")]
    IoError(#[from] std::io::Error),
}

/// External program that records a playlist URL to disk.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    async fn download(&self, url: &str, output_template: &Path) -> Result<(), DownloadError>;
}

pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
        }
    }
}

impl YtDlp {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DownloadEngine for YtDlp {
    async fn download(&self, url: &str, output_template: &Path) -> Result<(), DownloadError> {
        let mut child = tokio::process::Command::new(&self.program);

        child.arg("-o").arg(output_template).arg(url);

        let status = child
            .spawn()
            .map_err(|e| DownloadError::DownloadFailed(format!("could not start {}: {}", self.program.display(), e)))?
            .wait()
            .await?;

        if !status.success() {
            return Err(DownloadError::DownloadFailed(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }

        Ok(())
    }
}

/// `{download_dir}/{username}/{username}-{yyyymmdd_hhmm}-{quality}.%(ext)s`
pub fn output_template(
    download_dir: &Path,
    username: &str,
    quality: Quality,
    timestamp: DateTime<Local>,
) -> PathBuf {
    let filename = format!(
        "{}-{}-{}.%(ext)s",
        username,
        timestamp.format("%Y%m%d_%H%M"),
        quality
    );
    download_dir.join(username).join(filename)
}

/// Checks the link is present and hands it to `engine`.
pub async fn record(
    engine: &dyn DownloadEngine,
    link: &StreamLink,
    output_template: &Path,
) -> Result<(), DownloadError> {
    let url = link
        .link
        .as_deref()
        .ok_or(DownloadError::LinkNotAvailable(link.quality))?;

    if let Some(dir) = output_template.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    info!("Recording {} to {}", url, output_template.display());
    engine.download(url, output_template).await
}
