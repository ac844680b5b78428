use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

/// Saves a finished job's media URL under `dest_dir`, returning the written
/// path.
///
/// The filename is the last URL path segment; media endpoints often hand out
/// bare routes, so when the URL has no usable segment the `fallback_name`
/// (typically the job id) is used instead, and a missing extension is filled
/// in from the response `Content-Type`.
pub async fn download_media(
    http: &reqwest::Client,
    url: &str,
    dest_dir: &Path,
    fallback_name: &str,
) -> Result<PathBuf> {
    let parsed =
        reqwest::Url::parse(url).with_context(|| format!("invalid media url: {}", url))?;

    let response = http
        .get(parsed.clone())
        .send()
        .await
        .with_context(|| format!("media request to {} failed", url))?
        .error_for_status()
        .context("media request was refused")?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let mut filename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| fallback_name.to_string());
    if !filename.contains('.') {
        if let Some(ext) = content_type.as_deref().and_then(extension_for) {
            filename = format!("{}.{}", filename, ext);
        }
    }

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("could not create {:?}", dest_dir))?;

    let bytes = response
        .bytes()
        .await
        .context("could not read media body")?;
    let dest_path = dest_dir.join(filename);
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("could not write {:?}", dest_path))?;

    info!("Saved media from {} to {:?}", url, dest_path);
    Ok(dest_path)
}

/// Extensions for the media types the job endpoints produce.
fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "video/mp4" => Some("mp4"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "audio/mpeg" => Some("mp3"),
        _ => None,
    }
}
