//! Boundary to the external media fetch tool (yt-dlp).
//!
//! The core treats the tool as a black box: it resolves URLs, negotiates
//! formats and writes files on its own. This module only builds argument
//! lists, streams progress lines back and parses metadata JSON.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::model::{DownloadRequest, MediaFormat, VideoInfo};
use crate::progress::{self, RawProgress};

/// Progress callback handed to [`MediaFetcher::download`], invoked once
/// per raw progress event before the call returns.
pub type ProgressFn = Box<dyn FnMut(RawProgress) + Send>;

/// Narrow interface to the external media fetch tool.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo>;
    async fn download(&self, request: &DownloadRequest, on_progress: ProgressFn) -> Result<()>;
}

/// Template making yt-dlp print one parsable line per progress update,
/// recognized by [`progress::parse_line`].
const PROGRESS_TEMPLATE: &str =
    "progress:%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s";

/// Fetcher shelling out to a `yt-dlp` binary on PATH.
///
/// The binary is located per operation, so a missing installation shows
/// up as an ordinary failed session instead of aborting startup.
#[derive(Debug, Default)]
pub struct YtDlpFetcher;

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn binary() -> Result<PathBuf> {
        Ok(which::which("yt-dlp")?)
    }

    fn download_args(request: &DownloadRequest) -> Vec<String> {
        let mut args = vec!["-f".to_owned(), request.format_selector()];

        match request.effective_format() {
            MediaFormat::Mp3 => {
                // Matches the 192K mp3 extraction the desktop tool has
                // always produced for audio-only downloads.
                args.extend(
                    ["-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                        .map(str::to_owned),
                );
            }
            container => {
                args.push("--merge-output-format".to_owned());
                args.push(container.label().to_owned());
            }
        }

        args.push("--newline".to_owned());
        args.push("--no-warnings".to_owned());
        args.push("--progress-template".to_owned());
        args.push(PROGRESS_TEMPLATE.to_owned());
        args.push("-o".to_owned());
        args.push(request.output_template());
        args.push(request.url.clone());
        args
    }
}

/// Subset of the metadata JSON printed by `--dump-single-json`.
#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    duration_string: Option<String>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
}

impl From<RawInfo> for VideoInfo {
    fn from(raw: RawInfo) -> Self {
        let or_na = |field: Option<String>| field.unwrap_or_else(|| "N/A".to_string());
        Self {
            id: raw.id,
            title: or_na(raw.title),
            uploader: or_na(raw.uploader),
            duration_display: or_na(raw.duration_string),
            view_count: raw.view_count,
            thumbnail_url: raw.thumbnail,
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo> {
        let binary = Self::binary()?;
        log::debug!("fetching info for {url}");
        let output = Command::new(binary)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--no-warnings",
                "--skip-download",
                url,
            ])
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Fetch(stderr_tail(&output.stderr)));
        }
        let raw: RawInfo = serde_json::from_slice(&output.stdout)?;
        Ok(raw.into())
    }

    async fn download(&self, request: &DownloadRequest, mut on_progress: ProgressFn) -> Result<()> {
        let binary = Self::binary()?;
        let args = Self::download_args(request);
        log::debug!("spawning yt-dlp {args:?}");

        let mut child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently so a chatty child cannot stall on a
        // full pipe; the content is only used for the failure message.
        let mut stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(err) = stderr.as_mut() {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        if let Some(out) = child.stdout.take() {
            let mut lines = BufReader::new(out).lines();
            while let Some(line) = lines.next_line().await? {
                log::trace!("yt-dlp: {line}");
                if let Some(raw) = progress::parse_line(&line) {
                    on_progress(raw);
                }
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(Error::Download(stderr_tail(&stderr)));
        }
        Ok(())
    }
}

/// Last non-empty stderr line, the part of yt-dlp's output worth showing.
fn stderr_tail(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QualityCeiling;

    fn request(audio_only: bool, quality: QualityCeiling) -> DownloadRequest {
        DownloadRequest {
            url: "https://x/video".to_string(),
            destination: PathBuf::from("/downloads"),
            format: MediaFormat::Mp4,
            quality,
            audio_only,
        }
    }

    #[test]
    fn video_args_carry_selector_and_container() {
        let args = YtDlpFetcher::download_args(&request(false, QualityCeiling::P720));
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "bestvideo[height<=720]+bestaudio/best");
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"mp4".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://x/video");
    }

    #[test]
    fn audio_args_extract_mp3_regardless_of_quality() {
        let args = YtDlpFetcher::download_args(&request(true, QualityCeiling::P1080));
        assert_eq!(args[1], "bestaudio/best");
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(args.contains(&"192K".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn args_request_parsable_progress() {
        let args = YtDlpFetcher::download_args(&request(false, QualityCeiling::Best));
        assert!(args.contains(&"--newline".to_string()));
        let template_pos = args
            .iter()
            .position(|a| a == "--progress-template")
            .unwrap();
        assert!(args[template_pos + 1].starts_with(progress::LINE_PREFIX));
        let output_pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[output_pos + 1], "/downloads/%(title)s.%(ext)s");
    }

    #[test]
    fn metadata_json_maps_to_video_info() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Some Video",
            "uploader": "Some Channel",
            "duration_string": "3:32",
            "view_count": 1234567,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxres.jpg",
            "extractor": "youtube"
        }"#;
        let raw: RawInfo = serde_json::from_str(json).unwrap();
        let info = VideoInfo::from(raw);
        assert_eq!(info.title, "Some Video");
        assert_eq!(info.uploader, "Some Channel");
        assert_eq!(info.duration_display, "3:32");
        assert_eq!(info.view_count, Some(1_234_567));
        assert_eq!(info.id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn missing_metadata_fields_render_as_na() {
        let raw: RawInfo = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        let info = VideoInfo::from(raw);
        assert_eq!(info.title, "N/A");
        assert_eq!(info.uploader, "N/A");
        assert_eq!(info.duration_display, "N/A");
        assert_eq!(info.view_count, None);
        assert_eq!(info.thumbnail_url, None);
    }

    #[test]
    fn stderr_tail_picks_last_meaningful_line() {
        let stderr = b"WARNING: something\nERROR: Unsupported URL: https://x\n\n";
        assert_eq!(stderr_tail(stderr), "ERROR: Unsupported URL: https://x");
        assert_eq!(stderr_tail(b""), "unknown error");
    }
}
