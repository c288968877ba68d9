use crate::error::{InstallerError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::info;

const STREAM_BUFFER_SIZE: usize = 8192;

/// Download progress. `total` is `None` when the server sends no length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Whole percent, when the total size is known.
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => Some(((self.downloaded.min(total) * 100) / total) as u8),
            _ => None,
        }
    }
}

/// Stream `reader` into `file`, reporting progress after every chunk.
pub fn copy_with_progress(
    reader: &mut dyn Read,
    file: &mut File,
    total: Option<u64>,
    progress: &mut dyn FnMut(DownloadProgress),
) -> std::io::Result<u64> {
    let mut downloaded = 0u64;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        downloaded += read as u64;
        progress(DownloadProgress { downloaded, total });
    }
    file.flush()?;
    Ok(downloaded)
}

/// Download `url` into `dest`, streaming so the archive is never held in memory.
pub fn download_to(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &mut File,
    timeout: Duration,
    progress: &mut dyn FnMut(DownloadProgress),
) -> Result<u64> {
    info!("Downloading {}", url);
    let mut response = client
        .get(url)
        .timeout(timeout)
        .send()
        .map_err(|e| InstallerError::network(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(InstallerError::network(url, format!("HTTP {}", status)));
    }

    let total = response.content_length();
    let written = copy_with_progress(&mut response, dest, total, progress)
        .map_err(|e| InstallerError::network(url, e))?;

    info!("Downloaded {} bytes from {}", written, url);
    Ok(written)
}
