//! `mpv` renderer driven over its JSON IPC socket.
//!
//! All socket traffic happens on a dedicated worker thread, so `present`
//! never blocks the controller. The worker polls `time-pos` while playing
//! and reports the matching timeline position as an engine event.

use crate::error::{PlaybackError, Result};
use crate::events::{EngineEvent, EventSender};
use crate::renderer::Renderer;
use cutline_core::types::{Clip, ClipSource, MediaKind, MediaLibrary, TimeUs};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MpvController: process + IPC
// ---------------------------------------------------------------------------

pub struct MpvController {
    process: Option<Child>,
    socket_path: PathBuf,
}

impl MpvController {
    pub fn new() -> Self {
        let socket_path =
            std::env::temp_dir().join(format!("cutline-mpv-{}", std::process::id()));
        Self {
            process: None,
            socket_path,
        }
    }

    /// Start an idle, paused mpv window and wait for its IPC socket.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let log_path =
            std::env::temp_dir().join(format!("cutline-mpv-{}.log", std::process::id()));
        let log_file = std::fs::File::create(&log_path).ok();
        tracing::info!(log = %log_path.display(), "starting mpv");

        let child = Command::new("mpv")
            .args([
                "--idle=yes",
                "--keep-open=yes",
                "--pause=yes",
                "--osc=no",
                "--osd-level=0",
                "--title=cutline-preview",
                &format!("--input-ipc-server={}", self.socket_path.display()),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log_file.map(Stdio::from).unwrap_or(Stdio::null()))
            .spawn()
            .map_err(|e| PlaybackError::Mpv(format!("failed to start mpv: {}", e)))?;

        self.process = Some(child);

        for _ in 0..50 {
            if self.socket_path.exists() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        self.stop();
        Err(PlaybackError::Mpv("mpv socket did not appear".into()))
    }

    fn send_command(&self, command: serde_json::Value) -> Result<serde_json::Value> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| PlaybackError::Mpv(format!("failed to connect to mpv: {}", e)))?;
        stream.set_read_timeout(Some(Duration::from_secs(2)))?;

        let msg = format!("{}\n", command);
        stream.write_all(msg.as_bytes())?;

        // Asynchronous event lines may precede the reply; replies carry "error".
        let mut reader = BufReader::new(stream);
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(PlaybackError::Mpv("mpv closed the connection".into()));
            }
            let value: serde_json::Value = serde_json::from_str(&line)?;
            match value.get("error").and_then(|e| e.as_str()) {
                Some("success") => return Ok(value),
                Some(err) => return Err(PlaybackError::Mpv(err.to_string())),
                None => continue,
            }
        }
    }

    /// Load `path` and start it at `start_seconds` into the source.
    pub fn load_file(&self, path: &Path, start_seconds: f64) -> Result<()> {
        self.send_command(json!({
            "command": ["set_property", "start", format!("{:.3}", start_seconds)]
        }))?;
        self.send_command(json!({ "command": ["loadfile", path.to_string_lossy()] }))?;
        Ok(())
    }

    /// Leave the window idle.
    pub fn unload(&self) -> Result<()> {
        self.send_command(json!({ "command": ["stop"] }))?;
        Ok(())
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send_command(json!({ "command": ["seek", seconds, "absolute"] }))?;
        Ok(())
    }

    pub fn set_speed(&self, speed: f64) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "speed", speed] }))?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "pause", true] }))?;
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "pause", false] }))?;
        Ok(())
    }

    pub fn get_position(&self) -> Result<f64> {
        let resp = self.send_command(json!({ "command": ["get_property", "time-pos"] }))?;
        resp.get("data")
            .and_then(|d| d.as_f64())
            .ok_or_else(|| PlaybackError::Mpv("no position data".into()))
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Default for MpvController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MpvController {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Timeline <-> source mapping
// ---------------------------------------------------------------------------

/// How the loaded file lines up with the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SourceMapping {
    clip_start: TimeUs,
    trim_start: TimeUs,
    speed: f64,
}

impl SourceMapping {
    fn from_clip(clip: &Clip) -> Self {
        Self {
            clip_start: clip.start_time,
            trim_start: clip.trim_start,
            speed: clip.speed,
        }
    }

    fn source_time(&self, timeline: TimeUs) -> TimeUs {
        self.trim_start + (timeline - self.clip_start).scale(self.speed)
    }

    fn timeline_time(&self, source: TimeUs) -> TimeUs {
        self.clip_start + (source - self.trim_start).scale(1.0 / self.speed)
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum MpvRequest {
    Load {
        path: PathBuf,
        mapping: SourceMapping,
        at: TimeUs,
        still: bool,
    },
    /// The loaded clip was moved, trimmed or retimed.
    Remap {
        mapping: SourceMapping,
        at: TimeUs,
    },
    Unload,
    Seek(TimeUs),
    SetPlaying(bool),
    Shutdown,
}

struct Worker {
    controller: MpvController,
    events: EventSender,
    mapping: Option<SourceMapping>,
    still: bool,
    playing: bool,
}

impl Worker {
    fn run(mut self, requests: mpsc::Receiver<MpvRequest>, poll: Duration) {
        loop {
            match requests.recv_timeout(poll) {
                Ok(MpvRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(request) => {
                    if let Err(err) = self.handle(request) {
                        tracing::warn!(%err, "mpv request failed");
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.report_position(),
            }
        }
        self.controller.stop();
        tracing::debug!("mpv worker exited");
    }

    fn handle(&mut self, request: MpvRequest) -> Result<()> {
        match request {
            MpvRequest::Load {
                path,
                mapping,
                at,
                still,
            } => {
                let start = if still { TimeUs::ZERO } else { mapping.source_time(at) };
                self.controller.load_file(&path, start.as_seconds())?;
                self.controller.set_speed(mapping.speed)?;
                self.mapping = Some(mapping);
                self.still = still;
                if self.playing && !still {
                    self.controller.resume()?;
                } else {
                    self.controller.pause()?;
                }
            }
            MpvRequest::Remap { mapping, at } => {
                self.mapping = Some(mapping);
                if !self.still {
                    self.controller.set_speed(mapping.speed)?;
                    self.controller.seek(mapping.source_time(at).as_seconds())?;
                }
            }
            MpvRequest::Unload => {
                self.mapping = None;
                self.controller.unload()?;
            }
            MpvRequest::Seek(at) => {
                if let Some(mapping) = self.mapping.filter(|_| !self.still) {
                    self.controller.seek(mapping.source_time(at).as_seconds())?;
                }
            }
            MpvRequest::SetPlaying(playing) => {
                self.playing = playing;
                if self.mapping.is_some() && !self.still {
                    if playing {
                        self.controller.resume()?;
                    } else {
                        self.controller.pause()?;
                    }
                }
            }
            MpvRequest::Shutdown => {}
        }
        Ok(())
    }

    fn report_position(&mut self) {
        let Some(mapping) = self.mapping else { return };
        if !self.playing || self.still {
            return;
        }
        match self.controller.get_position() {
            Ok(seconds) => {
                let timeline = mapping.timeline_time(TimeUs::from_seconds(seconds));
                let _ = self.events.send(EngineEvent::RendererPosition(timeline));
            }
            Err(err) => tracing::trace!(%err, "mpv position unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// MpvRenderer
// ---------------------------------------------------------------------------

/// Shows the topmost visual clip in mpv. Only one file is loaded at a time;
/// compositing of lower layers is left to export.
pub struct MpvRenderer {
    requests: mpsc::Sender<MpvRequest>,
    worker: Option<JoinHandle<()>>,
    loaded: Option<(Uuid, SourceMapping)>,
    pending_seek: bool,
}

impl MpvRenderer {
    /// Start mpv and its worker thread. Position reports go to `events`.
    pub fn spawn(events: EventSender, poll: Duration) -> Result<Self> {
        let mut controller = MpvController::new();
        controller.start()?;

        let (tx, rx) = mpsc::channel();
        let worker = Worker {
            controller,
            events,
            mapping: None,
            still: false,
            playing: false,
        };
        let handle = std::thread::Builder::new()
            .name("cutline-mpv".into())
            .spawn(move || worker.run(rx, poll))?;

        Ok(Self::with_worker(tx, Some(handle)))
    }

    fn with_worker(requests: mpsc::Sender<MpvRequest>, worker: Option<JoinHandle<()>>) -> Self {
        Self {
            requests,
            worker,
            loaded: None,
            pending_seek: false,
        }
    }

    fn send(&self, request: MpvRequest) {
        if self.requests.send(request).is_err() {
            tracing::warn!("mpv worker is gone");
        }
    }
}

/// Topmost clip that mpv can show: media-backed, not audio-only.
fn top_visual<'a>(clips: &[&'a Clip], media: &'a MediaLibrary) -> Option<(&'a Clip, &'a Path, bool)> {
    clips.iter().rev().find_map(|clip| {
        let ClipSource::Media(id) = &clip.source else {
            return None;
        };
        let reference = media.get(*id)?;
        match reference.kind {
            MediaKind::Video => Some((*clip, reference.locator.as_path(), false)),
            MediaKind::Image => Some((*clip, reference.locator.as_path(), true)),
            MediaKind::Audio => None,
        }
    })
}

impl Renderer for MpvRenderer {
    fn present(&mut self, time: TimeUs, clips: &[&Clip], media: &MediaLibrary) {
        match top_visual(clips, media) {
            Some((clip, path, still)) if self.loaded.map(|(id, _)| id) != Some(clip.id) => {
                let mapping = SourceMapping::from_clip(clip);
                self.loaded = Some((clip.id, mapping));
                self.pending_seek = false;
                self.send(MpvRequest::Load {
                    path: path.to_path_buf(),
                    mapping,
                    at: time,
                    still,
                });
            }
            Some((clip, _, _)) => {
                let mapping = SourceMapping::from_clip(clip);
                if self.loaded.map(|(_, m)| m) != Some(mapping) {
                    // Remapping seeks, which covers any pending seek.
                    self.loaded = Some((clip.id, mapping));
                    self.pending_seek = false;
                    self.send(MpvRequest::Remap { mapping, at: time });
                } else if self.pending_seek {
                    self.pending_seek = false;
                    self.send(MpvRequest::Seek(time));
                }
            }
            None => {
                self.pending_seek = false;
                if self.loaded.take().is_some() {
                    self.send(MpvRequest::Unload);
                }
            }
        }
    }

    fn seek(&mut self, _time: TimeUs) {
        // Applied on the next present, once the visible clip is known.
        self.pending_seek = true;
    }

    fn set_playing(&mut self, playing: bool) {
        self.send(MpvRequest::SetPlaying(playing));
    }
}

impl Drop for MpvRenderer {
    fn drop(&mut self) {
        let _ = self.requests.send(MpvRequest::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
