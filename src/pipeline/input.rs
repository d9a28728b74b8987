//! Input resolution: normalise a user-supplied path or URL to raw image bytes.
//!
//! ## Why validate magic bytes here?
//!
//! The decoder in [`crate::pipeline::encode`] would reject a non-image
//! anyway, but by then the only context available is a codec error string.
//! Sniffing the format up front lets us tell the user "this file is not a
//! JPEG/PNG" with the offending bytes, instead of surfacing a decode failure
//! for what is actually a mis-typed path.

use crate::error::AnalysisError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to raw image bytes.
///
/// If the input is a URL, download it. If it is a local file, read and
/// validate it. Either way the bytes are sniffed for a supported format
/// before being returned.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, AnalysisError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input)
    }
}

/// Read a local image file, validating existence and format.
pub fn read_local(path_str: &str) -> Result<Vec<u8>, AnalysisError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(AnalysisError::FileNotFound { path });
    }

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnalysisError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AnalysisError::FileNotFound { path });
        }
    };

    sniff_format(&bytes, path_str)?;
    debug!("Resolved local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Download an image URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, AnalysisError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    sniff_format(&bytes, url)?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

/// Require JPEG or PNG magic bytes.
fn sniff_format(bytes: &[u8], input: &str) -> Result<(), AnalysisError> {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) | Ok(image::ImageFormat::Png) => Ok(()),
        Ok(other) => Err(AnalysisError::NotAnImage {
            input: input.to_string(),
            detail: format!("detected {:?}", other),
        }),
        Err(_) => Err(AnalysisError::NotAnImage {
            input: input.to_string(),
            detail: format!(
                "unrecognised first bytes: {:02X?}",
                &bytes[..bytes.len().min(4)]
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Minimal valid 1×1 PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
        0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08,
        0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x70, 0x0C, 0x6E,
        0x10, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn is_url_detects_schemes() {
        assert!(is_url("https://photos.example/cat.jpg"));
        assert!(is_url("http://photos.example/cat.jpg"));
        assert!(!is_url("./cat.jpg"));
        assert!(!is_url("cat.jpg"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_local("/definitely/not/here.jpg").unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound { .. }));
    }

    #[test]
    fn png_file_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(TINY_PNG).unwrap();
        let bytes = read_local(f.path().to_str().unwrap()).unwrap();
        assert_eq!(bytes, TINY_PNG);
    }

    #[test]
    fn text_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello, not an image").unwrap();
        let err = read_local(f.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, AnalysisError::NotAnImage { .. }));
    }
}
