//! Google Drive downloads.
//!
//! Two paths lead to a local copy of a Drive file:
//!
//! - **public**: `uc?export=download`, which works for files shared with
//!   "anyone with the link". Large files first answer with an HTML
//!   virus-scan interstitial whose `confirm` token must be echoed back on a
//!   second request in the same cookie session.
//! - **authenticated**: the Drive v3 API with an OAuth bearer token from
//!   [`super::oauth`], for private files.
//!
//! Either way the body is streamed into a fresh temporary directory and
//! progress is reported through the configured callback.

use super::oauth;
use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::progress::ConversionProgressCallback;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PUBLIC_DOWNLOAD_URL: &str = "https://drive.google.com/uc";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

static BARE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{25,}$").unwrap());
static FILE_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").unwrap());
static ID_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").unwrap());
static CONFIRM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"confirm=([a-zA-Z0-9_-]+)").unwrap());
static CONFIRM_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="confirm"\s+value="([a-zA-Z0-9_-]+)""#).unwrap());
static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"filename\s*=\s*"?([^";]+)"?"#).unwrap());

/// Extract a Drive file ID from a share URL or a bare ID.
///
/// Recognised forms:
/// - `https://drive.google.com/file/d/{id}/view?usp=sharing`
/// - `https://drive.google.com/open?id={id}`
/// - `https://drive.google.com/uc?export=download&id={id}`
/// - a bare ID of 25 or more `[A-Za-z0-9_-]` characters
pub fn extract_file_id(input: &str) -> Option<String> {
    let input = input.trim();
    if !super::input::is_url(input) && BARE_ID_RE.is_match(input) {
        return Some(input.to_string());
    }
    if !input.contains("drive.google.com") {
        return None;
    }
    FILE_PATH_RE
        .captures(input)
        .or_else(|| ID_PARAM_RE.captures(input))
        .map(|c| c[1].to_string())
}

/// A Drive file streamed into its own temporary directory.
pub struct DownloadedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub temp_dir: TempDir,
}

/// Base URLs of the two Drive download paths.
#[derive(Debug, Clone)]
pub(crate) struct DriveEndpoints {
    /// `uc` endpoint serving publicly shared files.
    pub public_download: String,
    /// Drive v3 `files` collection.
    pub files: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            public_download: PUBLIC_DOWNLOAD_URL.to_string(),
            files: DRIVE_FILES_URL.to_string(),
        }
    }
}

/// Download `file_id`, publicly or through the Drive API per `config.use_auth`.
pub async fn download(file_id: &str, config: &ConversionConfig) -> Result<DownloadedFile, Pdf2MdError> {
    download_from(&DriveEndpoints::default(), file_id, config).await
}

pub(crate) async fn download_from(
    endpoints: &DriveEndpoints,
    file_id: &str,
    config: &ConversionConfig,
) -> Result<DownloadedFile, Pdf2MdError> {
    if config.use_auth {
        info!("Downloading from Google Drive (authenticated), file ID: {}", file_id);
        download_authenticated(endpoints, file_id, config).await
    } else {
        info!("Downloading from Google Drive (public), file ID: {}", file_id);
        download_public(endpoints, file_id, config).await
    }
}

fn public_url(base: &str, file_id: &str, confirm: Option<&str>) -> String {
    match confirm {
        Some(token) => format!("{base}?export=download&id={file_id}&confirm={token}"),
        None => format!("{base}?export=download&id={file_id}"),
    }
}

/// Client for file transfers. `secs` bounds connecting and every stall
/// between received chunks; a slow transfer that keeps moving never times out.
fn transfer_client(secs: u64, cookies: bool, url: &str) -> Result<Client, Pdf2MdError> {
    Client::builder()
        .cookie_store(cookies)
        .connect_timeout(Duration::from_secs(secs))
        .read_timeout(Duration::from_secs(secs))
        .build()
        .map_err(|e| download_failed(url, e))
}

async fn download_public(
    endpoints: &DriveEndpoints,
    file_id: &str,
    config: &ConversionConfig,
) -> Result<DownloadedFile, Pdf2MdError> {
    let secs = config.download_timeout_secs;
    let url = public_url(&endpoints.public_download, file_id, None);
    let client = transfer_client(secs, true, &url)?;

    let mut response = checked(send(client.get(&url), &url, secs).await?, file_id, &url)?;

    if is_html(&response) {
        let page = response
            .text()
            .await
            .map_err(|e| transport_error(e, &url, secs))?;
        let lower = page.to_lowercase();
        if !(lower.contains("virus scan warning") || lower.contains("download anyway")) {
            return Err(Pdf2MdError::DownloadFailed {
                url,
                reason: "Drive returned an HTML page instead of the file; is it shared publicly?".into(),
            });
        }
        let token = confirm_token(&page).ok_or_else(|| Pdf2MdError::DownloadFailed {
            url: url.clone(),
            reason: "virus-scan warning page carried no confirm token".into(),
        })?;
        debug!("Confirming large-file download with token {}", token);
        let confirm_url = public_url(&endpoints.public_download, file_id, Some(&token));
        response = checked(send(client.get(&confirm_url), &confirm_url, secs).await?, file_id, &confirm_url)?;
        if is_html(&response) {
            return Err(Pdf2MdError::DownloadFailed {
                url: confirm_url,
                reason: "Drive still returned an HTML page after confirmation".into(),
            });
        }
    }

    let file_name = content_disposition_filename(&response).unwrap_or_default();
    let progress = config.progress();
    stream_to_temp(response, file_id, &file_name, &url, secs, progress.as_ref()).await
}

/// Drive v3 file metadata; `size` is a decimal string in the API.
#[derive(Debug, Deserialize)]
struct DriveFileMetadata {
    name: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    size: Option<String>,
}

async fn download_authenticated(
    endpoints: &DriveEndpoints,
    file_id: &str,
    config: &ConversionConfig,
) -> Result<DownloadedFile, Pdf2MdError> {
    let token = oauth::access_token(config).await?;
    let secs = config.download_timeout_secs;
    let client = transfer_client(secs, false, &endpoints.files)?;

    let meta_url = format!("{}/{file_id}?fields=name,mimeType,size", endpoints.files);
    let meta_secs = config.metadata_timeout_secs;
    let request = client
        .get(&meta_url)
        .bearer_auth(&token)
        .timeout(Duration::from_secs(meta_secs));
    let metadata: DriveFileMetadata = checked(send(request, &meta_url, meta_secs).await?, file_id, &meta_url)?
        .json()
        .await
        .map_err(|e| download_failed(&meta_url, e))?;

    let size = metadata.size.as_deref().and_then(|s| s.parse::<u64>().ok());
    info!(
        "Drive file: {} ({} bytes)",
        metadata.name.as_deref().unwrap_or("<unnamed>"),
        size.map_or_else(|| "unknown".to_string(), |s| s.to_string())
    );
    if let Some(mime) = metadata.mime_type.as_deref().filter(|m| *m != "application/pdf") {
        warn!("Drive reports MIME type {} rather than application/pdf", mime);
    }

    let media_url = format!("{}/{file_id}?alt=media", endpoints.files);
    let response = checked(
        send(client.get(&media_url).bearer_auth(&token), &media_url, secs).await?,
        file_id,
        &media_url,
    )?;

    let file_name = metadata.name.unwrap_or_default();
    let progress = config.progress();
    stream_to_temp(response, file_id, &file_name, &media_url, secs, progress.as_ref()).await
}

async fn send(request: RequestBuilder, url: &str, secs: u64) -> Result<Response, Pdf2MdError> {
    request.send().await.map_err(|e| transport_error(e, url, secs))
}

/// Status check applied before the body is looked at.
fn checked(response: Response, file_id: &str, url: &str) -> Result<Response, Pdf2MdError> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::FORBIDDEN => Err(Pdf2MdError::AccessDenied {
            file_id: file_id.to_string(),
        }),
        s => Err(Pdf2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {s}"),
        }),
    }
}

fn transport_error(e: reqwest::Error, url: &str, secs: u64) -> Pdf2MdError {
    if e.is_timeout() {
        Pdf2MdError::DownloadTimeout {
            url: url.to_string(),
            secs,
        }
    } else {
        download_failed(url, e)
    }
}

fn download_failed(url: &str, e: impl std::fmt::Display) -> Pdf2MdError {
    Pdf2MdError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"))
}

fn confirm_token(page: &str) -> Option<String> {
    CONFIRM_RE
        .captures(page)
        .or_else(|| CONFIRM_INPUT_RE.captures(page))
        .map(|c| c[1].to_string())
}

fn content_disposition_filename(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
}

/// File name from a `Content-Disposition` value, stripped of any directory part.
fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = FILENAME_RE.captures(header)?.get(1)?.as_str();
    safe_file_name(raw)
}

/// Last path component of a server-supplied name, with `/` and `\` both
/// treated as separators. `None` when nothing usable is left.
fn safe_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    (!last.is_empty() && last != "." && last != "..").then(|| last.to_string())
}

/// Stream `response` to `{temp_dir}/{name}`. `name` comes from the server
/// and is reduced to a bare file name here, so the file always lands inside
/// the temporary directory.
async fn stream_to_temp(
    response: Response,
    file_id: &str,
    name: &str,
    url: &str,
    secs: u64,
    progress: &dyn ConversionProgressCallback,
) -> Result<DownloadedFile, Pdf2MdError> {
    let file_name = safe_file_name(name).unwrap_or_else(|| format!("gdrive_{file_id}.pdf"));
    let total = response.content_length();
    progress.on_download_start(file_id, total);

    let temp_dir = tempfile::Builder::new()
        .prefix("pdf2markdown-")
        .tempdir()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create temp dir: {}", e)))?;
    let path = temp_dir.path().join(&file_name);
    let write_error = |e: std::io::Error| Pdf2MdError::Internal(format!("Failed to write temp file: {}", e));

    let mut file = tokio::fs::File::create(&path).await.map_err(write_error)?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transport_error(e, url, secs))?;
        file.write_all(&chunk).await.map_err(write_error)?;
        downloaded += chunk.len() as u64;
        progress.on_download_progress(downloaded, total);
    }
    file.flush().await.map_err(write_error)?;

    progress.on_download_complete(&path, downloaded);
    info!("Downloaded: {} ({} bytes)", path.display(), downloaded);

    Ok(DownloadedFile {
        path,
        file_name,
        temp_dir,
    })
}
