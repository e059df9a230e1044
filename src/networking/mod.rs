use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const LISTING_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
    download_client: Client,
}

impl NetworkClient {
    pub fn new() -> Self {
        Self {
            client: build_client(LISTING_TIMEOUT),
            download_client: build_client(DOWNLOAD_TIMEOUT),
        }
    }

    /// Fetch a directory-listing page and return its body as text.
    pub async fn fetch_listing(&self, url: &str) -> Result<String, String> {
        debug!("fetch_listing: GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("listing request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("listing status error: {e}"))?;
        response
            .text()
            .await
            .map_err(|e| format!("listing read error: {e}"))
    }

    /// Download a file to `dest`, calling `progress` with (downloaded, total,
    /// speed_text). A failed or short transfer removes the partial file
    /// before returning the error, so `dest` either holds the complete body
    /// or does not exist.
    pub async fn download_to_path<F>(&self, url: &str, dest: &Path, progress: F) -> Result<(), String>
    where
        F: FnMut(u64, Option<u64>, &str),
    {
        debug!("download_to_path: GET {url}");
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("download status error: {e}"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }

        if let Err(err) = stream_body_to(dest, response, progress).await {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(err);
        }
        Ok(())
    }
}

async fn stream_body_to<F>(dest: &Path, response: Response, mut progress: F) -> Result<(), String>
where
    F: FnMut(u64, Option<u64>, &str),
{
    let mut file = File::create(dest)
        .await
        .map_err(|e| format!("failed to create file: {e}"))?;

    let total = response.content_length();
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_tick = Instant::now();
    let mut last_bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write error: {e}"))?;
        downloaded += chunk.len() as u64;

        let since = last_tick.elapsed().as_secs_f32();
        if since > 0.2 {
            let speed = (downloaded - last_bytes) as f32 / since;
            let speed_text = format_speed(speed);
            progress(downloaded, total, &speed_text);
            last_tick = Instant::now();
            last_bytes = downloaded;
        }
    }

    // Final callback.
    progress(downloaded, total, "0 B/s");

    file.flush()
        .await
        .map_err(|e| format!("flush error: {e}"))?;

    if let Some(total) = total
        && downloaded < total
    {
        return Err(format!(
            "download incomplete: received {downloaded} of {total} bytes"
        ));
    }

    Ok(())
}

fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|err| {
        warn!("network client: falling back to default HTTP client configuration ({err})");
        Client::new()
    })
}

fn format_speed(bytes_per_sec: f32) -> String {
    if bytes_per_sec < 1024.0 {
        format!("{bytes_per_sec:.0} B/s")
    } else if bytes_per_sec < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / 1024.0 / 1024.0)
    }
}
