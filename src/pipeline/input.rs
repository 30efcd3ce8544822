//! Input resolution: turn a user-supplied path or URL into a decoded photo.
//!
//! URL inputs are spooled to a `TempDir` that lives exactly as long as the
//! returned [`LoadedImage`]; nothing uploaded outlives the run. The format is
//! sniffed from the leading bytes rather than trusted from the file name,
//! since phone uploads routinely arrive as `image.bin` or without extension.

use crate::error::SlipError;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A decoded source photo plus where it came from.
pub struct LoadedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
    /// Local path (for URLs: the temp copy).
    pub path: PathBuf,
    _temp_dir: Option<TempDir>,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve and decode the input.
///
/// If the input is a URL, download it to a temporary directory first.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedImage, SlipError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SlipError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

fn resolve_local(path: &Path) -> Result<LoadedImage, SlipError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(SlipError::FileNotFound { path });
    }
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SlipError::PermissionDenied { path });
        }
        Err(_) => return Err(SlipError::FileNotFound { path }),
    };
    let (image, format) = decode_bytes(&bytes, &path.display().to_string())?;
    debug!("Resolved local image: {}", path.display());
    Ok(LoadedImage {
        image,
        format,
        path,
        _temp_dir: None,
    })
}

/// Sniff and decode raw bytes.
pub fn decode_bytes(bytes: &[u8], source_name: &str) -> Result<(DynamicImage, ImageFormat), SlipError> {
    let format = image::guess_format(bytes).map_err(|_| SlipError::NotAnImage {
        source_name: source_name.to_string(),
        magic: leading_bytes(bytes),
    })?;
    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        SlipError::DecodeFailed {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        }
    })?;
    debug!(
        "Decoded {:?} {}x{} from {}",
        format,
        image.width(),
        image.height(),
        source_name
    );
    Ok((image, format))
}

fn leading_bytes(bytes: &[u8]) -> [u8; 4] {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    magic
}

/// Download a URL to a temporary directory and decode it.
async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedImage, SlipError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SlipError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SlipError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SlipError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(SlipError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SlipError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let (image, format) = decode_bytes(&bytes, url)?;

    let temp_dir = TempDir::new().map_err(|e| SlipError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(extract_filename(url));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SlipError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(LoadedImage {
        image,
        format,
        path: file_path,
        _temp_dir: Some(temp_dir),
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-image".to_string()
}
