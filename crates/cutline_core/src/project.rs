use crate::editing::{clamp_trim, validate_trim};
use crate::error::{CoreError, Result};
use crate::types::*;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

impl Project {
    /// Create a new empty project with the given name and settings.
    pub fn new(name: impl Into<String>, settings: ProjectSettings) -> Self {
        let timeline = Timeline::new(
            settings.fps,
            Resolution {
                width: settings.width,
                height: settings.height,
            },
        );
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            settings,
            media: MediaLibrary::new(),
            timeline,
        }
    }

    /// Save project to a file as pretty-printed JSON.
    /// Automatically appends `.cutline` extension if not present.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = ensure_extension(path.as_ref());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), clips = self.timeline.clip_count(), "project saved");
        Ok(())
    }

    /// Load a project from a JSON file. Layer indices are taken as stored.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let project: Project = serde_json::from_str(&data)?;
        let conflicts = project.timeline.layer_conflicts();
        if !conflicts.is_empty() {
            tracing::warn!(count = conflicts.len(), "loaded project has overlapping clips sharing a layer");
        }
        tracing::info!(
            path = %path.as_ref().display(),
            tracks = project.timeline.tracks().len(),
            clips = project.timeline.clip_count(),
            "project loaded"
        );
        Ok(project)
    }

    /// Register a media reference in the project library.
    pub fn import_media(&mut self, media: MediaReference) -> Uuid {
        tracing::debug!(id = %media.id, name = %media.name, "media imported");
        self.media.insert(media)
    }

    /// Delete a media reference and every clip that uses it. The library
    /// entry is only dropped once the timeline cascade succeeded.
    pub fn remove_media(&mut self, media_id: Uuid) -> Result<Vec<Clip>> {
        if !self.media.contains(media_id) {
            return Err(CoreError::MediaNotFound(media_id));
        }
        let removed = self.timeline.remove_media_cascade(media_id)?;
        self.media.remove(media_id);
        Ok(removed)
    }

    /// Place a clip, checking its media exists and clamping trims that would
    /// consume the whole source.
    pub fn add_clip(&mut self, mut clip: Clip, track_id: Uuid) -> Result<Uuid> {
        if let Some(media_id) = clip.media_id() {
            let media = self
                .media
                .get(media_id)
                .ok_or(CoreError::MediaNotFound(media_id))?;
            let native = media.native_duration;
            if native > TimeUs::ZERO {
                if let Err(err) = validate_trim(clip.trim_start, clip.trim_end, native) {
                    tracing::warn!(clip_id = %clip.id, %err, "clamping trim on insert");
                    let (start, end) = clamp_trim(clip.trim_start, clip.trim_end, native);
                    clip.trim_start = start;
                    clip.trim_end = end;
                }
            }
        }
        self.timeline.add_clip(clip, track_id)
    }

    /// Drop a media asset on the timeline at `start`. Without a target track
    /// the first unlocked track of the matching kind is used, and one is
    /// created if none exists.
    pub fn place_media(&mut self, media_id: Uuid, track_id: Option<Uuid>, start: TimeUs) -> Result<Uuid> {
        let media = self
            .media
            .get(media_id)
            .ok_or(CoreError::MediaNotFound(media_id))?;
        let clip = Clip::from_media(media, start);
        let kind = media.kind.track_kind();
        let (track_id, created) = match track_id {
            Some(id) => (id, false),
            None => self.timeline.find_or_create_track(kind),
        };
        let placed = self.add_clip(clip, track_id);
        if placed.is_err() && created {
            self.timeline.discard_created_track(track_id);
        }
        placed
    }

    pub fn trim_clip(&mut self, clip_id: Uuid, trim_start: TimeUs, trim_end: TimeUs) -> Result<bool> {
        self.timeline
            .trim_clip(clip_id, trim_start, trim_end, &self.media)
    }

    pub fn set_clip_speed(&mut self, clip_id: Uuid, speed: f64) -> Result<()> {
        self.timeline.set_speed(clip_id, speed, &self.media)
    }

    /// Ids of clips whose media is missing from the library, grouped by media id.
    pub fn dangling_clips(&self) -> HashMap<Uuid, Vec<Uuid>> {
        let mut dangling: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for clip in self.timeline.clips() {
            if let Some(media_id) = clip.media_id() {
                if !self.media.contains(media_id) {
                    dangling.entry(media_id).or_default().push(clip.id);
                }
            }
        }
        dangling
    }
}

impl Timeline {
    pub fn new(frame_rate: f64, resolution: Resolution) -> Self {
        Self {
            tracks: vec![],
            frame_rate,
            resolution,
            duration: TimeUs::ZERO,
            clip_index: HashMap::new(),
        }
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(
            30.0,
            Resolution {
                width: 1920,
                height: 1080,
            },
        )
    }
}

/// 1920x1080 30fps preset.
pub fn preset_1080p() -> ProjectSettings {
    ProjectSettings {
        width: 1920,
        height: 1080,
        fps: 30.0,
        sample_rate: 48000,
    }
}

/// 1080x1920 30fps (vertical/shorts) preset.
pub fn preset_shorts() -> ProjectSettings {
    ProjectSettings {
        width: 1080,
        height: 1920,
        fps: 30.0,
        sample_rate: 48000,
    }
}

/// 1280x720 30fps preset.
pub fn preset_720p() -> ProjectSettings {
    ProjectSettings {
        width: 1280,
        height: 720,
        fps: 30.0,
        sample_rate: 48000,
    }
}

/// 3840x2160 30fps (4K) preset.
pub fn preset_4k() -> ProjectSettings {
    ProjectSettings {
        width: 3840,
        height: 2160,
        fps: 30.0,
        sample_rate: 48000,
    }
}

/// 1920x1080 60fps preset.
pub fn preset_1080p_60() -> ProjectSettings {
    ProjectSettings {
        width: 1920,
        height: 1080,
        fps: 60.0,
        sample_rate: 48000,
    }
}

/// Look up a preset by its short name (`1080p`, `720p`, `4k`, `shorts`, `1080p60`).
pub fn preset_by_name(name: &str) -> Option<ProjectSettings> {
    match name.to_ascii_lowercase().as_str() {
        "1080p" => Some(preset_1080p()),
        "720p" => Some(preset_720p()),
        "4k" => Some(preset_4k()),
        "shorts" => Some(preset_shorts()),
        "1080p60" => Some(preset_1080p_60()),
        _ => None,
    }
}

fn ensure_extension(path: &Path) -> std::path::PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("cutline") {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".cutline");
        p.set_file_name(name);
        p
    }
}
