//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! Every extractor works on an in-memory byte slice, so both local files and
//! downloads are read fully into memory. Format hints are carried along
//! rather than checked here: the file name (from the path or the last URL
//! segment) and, for downloads, the `Content-Type` header. Classification
//! belongs to the extraction stage.

use crate::error::DiagramError;
use crate::source::Document;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a document.
///
/// If the input is a URL, download it (bounded by `timeout_secs`).
/// Otherwise it is read as a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, DiagramError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DiagramError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Read a local file, mapping I/O failures to fatal errors.
async fn resolve_local(path_str: &str) -> Result<Document, DiagramError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DiagramError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(DiagramError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiagramError::PermissionDenied { path });
        }
        Err(_) => return Err(DiagramError::FileNotFound { path }),
    };

    debug!("Resolved local document: {} ({} bytes)", path.display(), bytes.len());

    let mut doc = Document::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        doc = doc.with_file_name(name);
    }
    Ok(doc)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, DiagramError> {
    info!("Downloading document from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| DiagramError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DiagramError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(parsed.clone()).send().await.map_err(|e| {
        if e.is_timeout() {
            DiagramError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DiagramError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DiagramError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DiagramError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DiagramError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());

    let mut doc = Document::new(bytes.to_vec());
    if let Some(name) = filename_from_url(&parsed) {
        doc = doc.with_file_name(name);
    }
    if let Some(ct) = content_type {
        doc = doc.with_format(ct);
    }
    Ok(doc)
}

/// Last path segment of the URL, when it looks like a file name.
fn filename_from_url(url: &reqwest::Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
}
