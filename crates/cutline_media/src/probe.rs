//! `ffprobe` adapter. Only the facts the engine needs survive parsing: the
//! container duration, whether a picture stream exists, and whether there
//! is audio.

use cutline_core::types::{MediaKind, MediaReference, TimeUs};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{MediaError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "svg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "opus"];

// ---------------------------------------------------------------------------
// ffprobe JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    streams: Vec<Stream>,
    #[serde(default)]
    format: Container,
}

#[derive(Debug, Deserialize)]
struct Stream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    channels: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Container {
    duration: Option<String>,
}

/// What one ffprobe run says about a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub duration: TimeUs,
    /// Picture size of the first video stream, if any.
    pub frame_size: Option<(u32, u32)>,
    /// Channel count of the first audio stream; 0 when silent.
    pub audio_channels: u32,
}

impl Report {
    fn summarize(self) -> StreamSummary {
        let duration = self
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(TimeUs::from_seconds)
            .unwrap_or(TimeUs::ZERO);

        let mut summary = StreamSummary {
            duration,
            ..Default::default()
        };
        for stream in &self.streams {
            match stream.codec_type.as_str() {
                "video" if summary.frame_size.is_none() => {
                    if let (Some(w), Some(h)) = (stream.width, stream.height) {
                        summary.frame_size = Some((w, h)).filter(|&(w, h)| w > 0 && h > 0);
                    }
                }
                "audio" if summary.audio_channels == 0 => {
                    summary.audio_channels = stream.channels.unwrap_or(0);
                }
                _ => {}
            }
        }
        summary
    }
}

impl StreamSummary {
    /// Kind by extension first; unknown extensions fall back to stream data.
    pub fn kind_for(&self, path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else if self.frame_size.is_none() && self.audio_channels > 0 {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    /// Library entry for `path`. Stills report one frame's length, so they
    /// are recorded as timeless.
    pub fn into_reference(self, path: &Path) -> MediaReference {
        let kind = self.kind_for(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        let native_duration = match kind {
            MediaKind::Image => TimeUs::ZERO,
            MediaKind::Video | MediaKind::Audio => self.duration,
        };
        MediaReference::new(name, path, kind, native_duration)
    }
}

// ---------------------------------------------------------------------------
// Running ffprobe
// ---------------------------------------------------------------------------

/// Run ffprobe on `path` and summarize its streams.
pub fn summarize(path: &Path) -> Result<StreamSummary> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| MediaError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    let report: Report = serde_json::from_slice(&output.stdout)?;
    Ok(report.summarize())
}

/// Describe a file on disk as a `MediaReference` ready for the library.
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaReference> {
    let path = path.as_ref();
    let media = summarize(path)?.into_reference(path);
    tracing::debug!(
        path = %path.display(),
        kind = ?media.kind,
        duration = %media.native_duration,
        "media resolved"
    );
    Ok(media)
}

/// `probe_media` on the blocking pool, for callers on the async runtime.
pub async fn probe_media_async(path: PathBuf) -> Result<MediaReference> {
    tokio::task::spawn_blocking(move || probe_media(path)).await?
}
