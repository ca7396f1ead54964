//! HTTP client wrapper for registry queries and archive downloads.

use anyhow::{Context, Result, bail};
use log::debug;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use std::io::Write;

use super::status::check_status;

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Thin wrapper over a reqwest `Client`. Never retries; retry is a caller decision.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs a GET request and returns the body as text.
    #[tracing::instrument(skip(self, authorization))]
    pub async fn get_text(&self, url: &str, authorization: Option<&str>) -> Result<String> {
        debug!("GET {}...", url);

        let mut request = self.client.get(url);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await.context("Failed to send request")?;
        let response = response.error_for_status().map_err(check_status)?;

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Streams a download into the writer returned by `create_writer`.
    ///
    /// The writer is only created once the server answered with a success
    /// status. A body shorter than the advertised `Content-Length` is an error.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(check_status)?;
        let expected = response.content_length();

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        if let Some(expected) = expected
            && downloaded_bytes < expected
        {
            bail!(
                "Truncated download: received {} of {} bytes",
                downloaded_bytes,
                expected
            );
        }

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}
