use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::path::PathBuf;
use uuid::Uuid;

use crate::editing::validate_range;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Multiply by a floating point factor, rounding to the nearest microsecond.
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    pub fn abs_diff(self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// MediaReference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Track kind a clip of this media lands on when dropped without a target.
    pub fn track_kind(self) -> TrackKind {
        match self {
            MediaKind::Video | MediaKind::Image => TrackKind::Video,
            MediaKind::Audio => TrackKind::Audio,
        }
    }
}

/// Immutable descriptor of a source asset. Clips refer to it by id only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaReference {
    pub id: Uuid,
    pub name: String,
    pub locator: PathBuf,
    pub kind: MediaKind,
    /// Zero for stills.
    pub native_duration: TimeUs,
}

impl MediaReference {
    pub fn new(
        name: impl Into<String>,
        locator: impl Into<PathBuf>,
        kind: MediaKind,
        native_duration: TimeUs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            locator: locator.into(),
            kind,
            native_duration,
        }
    }
}

/// Project-level registry owning every `MediaReference`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MediaLibrary {
    entries: Vec<MediaReference>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference. An entry with the same id is replaced.
    pub fn insert(&mut self, media: MediaReference) -> Uuid {
        let id = media.id;
        match self.entries.iter_mut().find(|m| m.id == id) {
            Some(existing) => *existing = media,
            None => self.entries.push(media),
        }
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&MediaReference> {
        self.entries.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: Uuid) -> Option<MediaReference> {
        let pos = self.entries.iter().position(|m| m.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaReference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

/// What a clip plays: a registered media asset, or inline text (subtitles, titles).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClipSource {
    Media(Uuid),
    Text(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// Normalized crop rectangle, all components in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation_degrees: f64,
    pub crop_rect: Option<CropRect>,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2 { x: 0.0, y: 0.0 },
            scale: Vec2 { x: 1.0, y: 1.0 },
            rotation_degrees: 0.0,
            crop_rect: None,
            flip_h: false,
            flip_v: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Effect {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub params: BTreeMap<String, f64>,
}

impl Effect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Default length of a still image dropped on the timeline.
pub const DEFAULT_STILL_DURATION: TimeUs = TimeUs(5_000_000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: Uuid,
    pub source: ClipSource,
    pub track_id: Uuid,
    pub start_time: TimeUs,
    /// Timeline-visible span, after speed is applied.
    pub duration: TimeUs,
    pub trim_start: TimeUs,
    pub trim_end: TimeUs,
    pub layer_index: u32,
    pub speed: f64,
    pub volume: f64,
    pub opacity: f64,
    pub transform: Transform,
    pub effects: Vec<Effect>,
}

impl Clip {
    /// A clip with default speed, volume, opacity and transform. Track and
    /// layer are assigned when the clip is placed on a timeline.
    pub fn new(source: ClipSource, start_time: TimeUs, duration: TimeUs) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            track_id: Uuid::nil(),
            start_time,
            duration,
            trim_start: TimeUs::ZERO,
            trim_end: TimeUs::ZERO,
            layer_index: 0,
            speed: 1.0,
            volume: 1.0,
            opacity: 1.0,
            transform: Transform::default(),
            effects: vec![],
        }
    }

    /// A clip spanning the whole of `media`, or a default still duration for images.
    pub fn from_media(media: &MediaReference, start_time: TimeUs) -> Self {
        let duration = if media.native_duration > TimeUs::ZERO {
            media.native_duration
        } else {
            DEFAULT_STILL_DURATION
        };
        Self::new(ClipSource::Media(media.id), start_time, duration)
    }

    pub fn text(text: impl Into<String>, start_time: TimeUs, duration: TimeUs) -> Self {
        Self::new(ClipSource::Text(text.into()), start_time, duration)
    }

    pub fn end_time(&self) -> TimeUs {
        self.start_time + self.duration
    }

    /// Half-open containment: `[start, end)`.
    pub fn contains(&self, time: TimeUs) -> bool {
        self.start_time <= time && time < self.end_time()
    }

    pub fn media_id(&self) -> Option<Uuid> {
        match &self.source {
            ClipSource::Media(id) => Some(*id),
            ClipSource::Text(_) => None,
        }
    }

    /// Span of source material consumed, i.e. `duration * speed`.
    pub fn source_span(&self) -> TimeUs {
        self.duration.scale(self.speed)
    }

    /// Position inside the source that plays at timeline `time`.
    pub fn source_time_at(&self, time: TimeUs) -> TimeUs {
        self.trim_start + (time - self.start_time).scale(self.speed)
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    Text,
    Effect,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackKind::Video => "Video",
            TrackKind::Audio => "Audio",
            TrackKind::Subtitle => "Subtitle",
            TrackKind::Text => "Text",
            TrackKind::Effect => "Effect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: Uuid,
    pub kind: TrackKind,
    pub name: String,
    /// Ordered by `start_time`.
    pub(crate) clips: Vec<Clip>,
    pub is_visible: bool,
    pub is_locked: bool,
    pub is_muted: bool,
    pub volume: f64,
    pub opacity: f64,
}

impl Track {
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            clips: vec![],
            is_visible: true,
            is_locked: false,
            is_muted: false,
            volume: 1.0,
            opacity: 1.0,
        }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, clip_id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == clip_id)
    }

    pub(crate) fn position_of(&self, clip_id: Uuid) -> Option<usize> {
        self.clips.iter().position(|c| c.id == clip_id)
    }

    /// Insert after any clip starting at the same time, keeping start order.
    pub(crate) fn insert_sorted(&mut self, clip: Clip) {
        let at = self
            .clips
            .partition_point(|c| c.start_time <= clip.start_time);
        self.clips.insert(at, clip);
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Ordered tracks plus derived state. Fields are crate-private; every
/// mutation goes through the editing operations so the cached duration and
/// the clip index never go stale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "TimelineRecord")]
pub struct Timeline {
    pub(crate) tracks: Vec<Track>,
    pub(crate) frame_rate: f64,
    pub(crate) resolution: Resolution,
    #[serde(skip)]
    pub(crate) duration: TimeUs,
    /// clip id -> owning track id
    #[serde(skip)]
    pub(crate) clip_index: HashMap<Uuid, Uuid>,
}

/// Persisted shape of a `Timeline`; derived state is rebuilt on load.
#[derive(Deserialize)]
struct TimelineRecord {
    tracks: Vec<Track>,
    frame_rate: f64,
    resolution: Resolution,
}

impl TryFrom<TimelineRecord> for Timeline {
    type Error = CoreError;

    /// Clip ranges are checked before anything derived is computed from them.
    fn try_from(record: TimelineRecord) -> Result<Self, Self::Error> {
        for clip in record.tracks.iter().flat_map(|t| &t.clips) {
            validate_range(clip.start_time, clip.duration)?;
        }
        let mut timeline = Timeline {
            tracks: record.tracks,
            frame_rate: record.frame_rate,
            resolution: record.resolution,
            duration: TimeUs::ZERO,
            clip_index: HashMap::new(),
        };
        timeline.rebuild_derived();
        Ok(timeline)
    }
}

// ---------------------------------------------------------------------------
// ProjectSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub sample_rate: u32,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub settings: ProjectSettings,
    pub media: MediaLibrary,
    pub timeline: Timeline,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
