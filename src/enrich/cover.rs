// src/enrich/cover.rs

//! The disk-backed asset writer: QR rendering on the blocking pool and
//! cover art downloads with a short retry.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::EnrichConfig;
use crate::utils::shutdown::Shutdown;

use super::qr;
use super::AssetWriter;

/// Pause between cover download attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Asset writer that renders QR images and downloads covers to disk.
pub struct DiskAssetWriter {
    client: Client,
    qr_version: i16,
    qr_module_px: u32,
    download_attempts: u32,
    shutdown: Shutdown,
}

impl DiskAssetWriter {
    pub fn new(client: Client, config: &EnrichConfig, shutdown: Shutdown) -> Self {
        Self {
            client,
            qr_version: config.qr_version,
            qr_module_px: config.qr_module_px,
            download_attempts: config.download_attempts.max(1),
            shutdown,
        }
    }

    async fn download(&self, url: &str, path: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::enrich(url, format!("HTTP {}", status.as_u16())));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::enrich(url, "empty response body"));
        }

        // Temp file plus rename: a write that fails or is killed partway
        // must not leave a truncated file at the final path, where the
        // skip-existing rule would adopt it on the next run. A stray
        // temp file is overwritten by the next attempt.
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl AssetWriter for DiskAssetWriter {
    /// Rendering is CPU plus sync file I/O, so it runs on the blocking
    /// pool instead of stalling the reactor.
    async fn render_code(&self, data: &str, path: &Path) -> Result<()> {
        let data = data.to_string();
        let path = path.to_path_buf();
        let version = self.qr_version;
        let module_px = self.qr_module_px;
        match tokio::task::spawn_blocking(move || qr::render_to_file(&data, &path, version, module_px))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(AppError::enrich("qr render", e)),
        }
    }

    /// Download with a short bounded retry. Image hosts shed load often
    /// enough that one extra attempt recovers most failures.
    async fn fetch_cover(&self, url: &str, path: &Path) -> Result<()> {
        let mut last_error = None;
        for attempt in 0..self.download_attempts {
            if self.shutdown.is_cancelled() {
                return Err(AppError::Interrupted);
            }
            if attempt > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_PAUSE) => {}
                    _ = self.shutdown.cancelled() => return Err(AppError::Interrupted),
                }
            }
            match self.download(url, path).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!(
                        "Cover download attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.download_attempts,
                        url,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::enrich(url, "no attempts made")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::shutdown;
    use tempfile::TempDir;

    fn make_writer(shutdown: Shutdown) -> DiskAssetWriter {
        DiskAssetWriter::new(Client::new(), &EnrichConfig::default(), shutdown)
    }

    #[tokio::test]
    async fn render_code_writes_a_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.png");
        let (_handle, shutdown) = shutdown::channel();
        let writer = make_writer(shutdown);

        writer
            .render_code("https://www.discogs.com/release/1", &path)
            .await
            .unwrap();

        let bytes = tokio::fs::read(&path).await.unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn cancelled_fetch_skips_the_network() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.jpg");
        let (handle, shutdown) = shutdown::channel();
        let writer = make_writer(shutdown);
        handle.trigger();

        let err = writer
            .fetch_cover("http://192.0.2.1/cover.jpg", &path)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Interrupted));
        assert!(!path.exists());
    }
}
