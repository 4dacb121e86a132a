use crate::error::{CoreError, Result};
use crate::layers::{find_layer_conflicts, ranges_overlap, resolve_layer};
use crate::types::*;
use uuid::Uuid;

/// Shortest stretch of source material a clamped trim may leave behind.
pub const MIN_SOURCE_SPAN: TimeUs = TimeUs(10_000);

impl Timeline {
    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track_id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn clip(&self, clip_id: Uuid) -> Option<&Clip> {
        let (ti, ci) = self.locate(clip_id)?;
        Some(&self.tracks[ti].clips[ci])
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.tracks.iter().flat_map(|t| t.clips.iter())
    }

    pub fn clip_count(&self) -> usize {
        self.clip_index.len()
    }

    /// End of the latest-ending clip, or zero for an empty timeline.
    pub fn duration(&self) -> TimeUs {
        self.duration
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Every clip whose `[start, end)` contains `time`, bottom layer first.
    /// Clips sharing a layer index keep track order.
    pub fn clips_at(&self, time: TimeUs) -> Vec<&Clip> {
        let mut hits: Vec<&Clip> = self.clips().filter(|c| c.contains(time)).collect();
        hits.sort_by_key(|c| c.layer_index);
        hits
    }

    /// Overlapping same-layer pairs across all tracks. Empty for any timeline
    /// built through the editing operations.
    pub fn layer_conflicts(&self) -> Vec<(Uuid, Uuid)> {
        self.tracks
            .iter()
            .flat_map(|t| find_layer_conflicts(&t.clips))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tracks
    // -----------------------------------------------------------------------

    pub fn add_track(&mut self, kind: TrackKind, name: impl Into<String>) -> Uuid {
        let track = Track::new(kind, name);
        let id = track.id;
        tracing::debug!(%id, %kind, "track added");
        self.tracks.push(track);
        id
    }

    /// Remove a track and every clip on it.
    pub fn remove_track(&mut self, track_id: Uuid) -> Result<Track> {
        let ti = self.writable_track_index(track_id)?;
        let track = self.tracks.remove(ti);
        for clip in &track.clips {
            self.clip_index.remove(&clip.id);
        }
        self.recompute_duration();
        tracing::debug!(%track_id, clips = track.clips.len(), "track removed");
        Ok(track)
    }

    /// First unlocked track of `kind`, creating one when none exists.
    pub fn track_for_kind_or_insert(&mut self, kind: TrackKind) -> Uuid {
        self.find_or_create_track(kind).0
    }

    /// Same as `track_for_kind_or_insert`, also reporting whether the track
    /// was created so a failed placement can drop it again.
    pub fn find_or_create_track(&mut self, kind: TrackKind) -> (Uuid, bool) {
        if let Some(track) = self.tracks.iter().find(|t| t.kind == kind && !t.is_locked) {
            return (track.id, false);
        }
        let n = self.tracks.iter().filter(|t| t.kind == kind).count() + 1;
        (self.add_track(kind, format!("{} {}", kind, n)), true)
    }

    /// Drop a track created for a placement that then failed.
    pub fn discard_created_track(&mut self, track_id: Uuid) {
        if let Err(err) = self.remove_track(track_id) {
            tracing::warn!(%track_id, %err, "could not discard created track");
        }
    }

    pub fn set_track_locked(&mut self, track_id: Uuid, locked: bool) -> Result<()> {
        self.track_mut(track_id)?.is_locked = locked;
        Ok(())
    }

    pub fn set_track_muted(&mut self, track_id: Uuid, muted: bool) -> Result<()> {
        self.track_mut(track_id)?.is_muted = muted;
        Ok(())
    }

    pub fn set_track_visible(&mut self, track_id: Uuid, visible: bool) -> Result<()> {
        self.track_mut(track_id)?.is_visible = visible;
        Ok(())
    }

    pub fn set_track_volume(&mut self, track_id: Uuid, volume: f64) -> Result<()> {
        self.track_mut(track_id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_track_opacity(&mut self, track_id: Uuid, opacity: f64) -> Result<()> {
        self.track_mut(track_id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Clip placement
    // -----------------------------------------------------------------------

    /// Place a clip on a track. The layer index is resolved against the
    /// track's existing clips; any layer or track id on the input is replaced.
    pub fn add_clip(&mut self, mut clip: Clip, track_id: Uuid) -> Result<Uuid> {
        let ti = self.writable_track_index(track_id)?;
        validate_range(clip.start_time, clip.duration)?;
        validate_speed(clip.speed)?;
        if self.clip_index.contains_key(&clip.id) {
            return Err(CoreError::InvalidOperation(format!(
                "clip {} is already on the timeline",
                clip.id
            )));
        }

        clip.track_id = track_id;
        clip.volume = clip.volume.clamp(0.0, 1.0);
        clip.opacity = clip.opacity.clamp(0.0, 1.0);
        clip.layer_index = resolve_layer(
            clip.start_time,
            clip.end_time(),
            &self.tracks[ti].clips,
            None,
        );

        let id = clip.id;
        tracing::debug!(%id, %track_id, start = %clip.start_time, layer = clip.layer_index, "clip added");
        self.tracks[ti].insert_sorted(clip);
        self.clip_index.insert(id, track_id);
        self.recompute_duration();
        Ok(id)
    }

    /// Move a clip to `new_start` on `new_track_id` (which may be its current
    /// track). Every check runs before the clip is detached, so a failed move
    /// leaves the timeline untouched.
    pub fn move_clip(&mut self, clip_id: Uuid, new_start: TimeUs, new_track_id: Uuid) -> Result<()> {
        let (src_ti, ci) = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.ensure_unlocked(src_ti)?;
        let dst_ti = self.writable_track_index(new_track_id)?;

        let duration = self.tracks[src_ti].clips[ci].duration;
        validate_range(new_start, duration)?;

        let layer = resolve_layer(
            new_start,
            new_start + duration,
            &self.tracks[dst_ti].clips,
            Some(clip_id),
        );

        let mut clip = self.tracks[src_ti].clips.remove(ci);
        clip.start_time = new_start;
        clip.track_id = new_track_id;
        clip.layer_index = layer;
        self.tracks[dst_ti].insert_sorted(clip);
        self.clip_index.insert(clip_id, new_track_id);
        self.recompute_duration();

        tracing::debug!(%clip_id, track_id = %new_track_id, start = %new_start, layer, "clip moved");
        Ok(())
    }

    /// Remove a clip by id. An unknown id is a no-op so retried removals are
    /// harmless; a clip on a locked track is refused.
    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<Option<Clip>> {
        let Some((ti, ci)) = self.locate(clip_id) else {
            return Ok(None);
        };
        self.ensure_unlocked(ti)?;

        let clip = self.tracks[ti].clips.remove(ci);
        self.clip_index.remove(&clip_id);
        self.recompute_duration();
        tracing::debug!(%clip_id, "clip removed");
        Ok(Some(clip))
    }

    /// Remove every clip referencing `media_id`. All or nothing: if any such
    /// clip sits on a locked track, nothing is removed.
    pub fn remove_media_cascade(&mut self, media_id: Uuid) -> Result<Vec<Clip>> {
        if let Some(locked) = self
            .tracks
            .iter()
            .find(|t| t.is_locked && t.clips.iter().any(|c| c.media_id() == Some(media_id)))
        {
            return Err(CoreError::TrackLocked(locked.id));
        }

        let mut removed = Vec::new();
        for track in &mut self.tracks {
            let (gone, kept): (Vec<Clip>, Vec<Clip>) = std::mem::take(&mut track.clips)
                .into_iter()
                .partition(|c| c.media_id() == Some(media_id));
            track.clips = kept;
            removed.extend(gone);
        }
        for clip in &removed {
            self.clip_index.remove(&clip.id);
        }
        self.recompute_duration();
        tracing::debug!(%media_id, removed = removed.len(), "media cascade");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Clip edits
    // -----------------------------------------------------------------------

    /// Set a media clip's trims. Trims that would consume the whole source
    /// are clamped rather than rejected; returns whether clamping happened.
    /// The start stays put and the duration follows the remaining source.
    pub fn trim_clip(
        &mut self,
        clip_id: Uuid,
        trim_start: TimeUs,
        trim_end: TimeUs,
        media: &MediaLibrary,
    ) -> Result<bool> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.ensure_unlocked(ti)?;

        let clip = &self.tracks[ti].clips[ci];
        let native = trimmable_length(clip, media)?;
        let (trim_start, trim_end, clamped) = match validate_trim(trim_start, trim_end, native) {
            Ok(()) => (trim_start, trim_end, false),
            Err(err) => {
                tracing::warn!(%clip_id, %err, "clamping trim");
                let (s, e) = clamp_trim(trim_start, trim_end, native);
                (s, e, true)
            }
        };

        let duration = (native - trim_start - trim_end)
            .scale(1.0 / clip.speed)
            .max(TimeUs(1));
        validate_range(clip.start_time, duration)?;
        let layer = self.relayer_if_resized(ti, ci, duration);

        let clip = &mut self.tracks[ti].clips[ci];
        clip.trim_start = trim_start;
        clip.trim_end = trim_end;
        clip.duration = duration;
        clip.layer_index = layer;
        self.recompute_duration();
        Ok(clamped)
    }

    /// Change playback speed, keeping the source span: the timeline duration
    /// becomes `source_span / speed`.
    pub fn set_speed(&mut self, clip_id: Uuid, speed: f64, media: &MediaLibrary) -> Result<()> {
        validate_speed(speed)?;
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.ensure_unlocked(ti)?;

        let clip = &self.tracks[ti].clips[ci];
        let source_span = match trimmable_length(clip, media) {
            Ok(native) => native - clip.trim_start - clip.trim_end,
            Err(_) => clip.source_span(),
        };
        let duration = source_span.scale(1.0 / speed).max(TimeUs(1));
        validate_range(clip.start_time, duration)?;
        let layer = self.relayer_if_resized(ti, ci, duration);

        let clip = &mut self.tracks[ti].clips[ci];
        clip.speed = speed;
        clip.duration = duration;
        clip.layer_index = layer;
        self.recompute_duration();
        Ok(())
    }

    /// Split a clip at a timeline position strictly inside it. The left part
    /// keeps the id; the right part gets a fresh id and the same layer, since
    /// it only covers a sub-range of the original. Returns the right part's id.
    pub fn split_clip(&mut self, clip_id: Uuid, at: TimeUs) -> Result<Uuid> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.ensure_unlocked(ti)?;

        let original = &self.tracks[ti].clips[ci];
        if at <= original.start_time || at >= original.end_time() {
            return Err(CoreError::InvalidOperation(
                "split position must be strictly between clip start and end".into(),
            ));
        }

        let left_duration = at - original.start_time;
        let right_duration = original.end_time() - at;

        let mut right = original.clone();
        right.id = Uuid::new_v4();
        right.start_time = at;
        right.duration = right_duration;
        right.trim_start = original.trim_start + left_duration.scale(original.speed);

        let left = &mut self.tracks[ti].clips[ci];
        left.trim_end = left.trim_end + right_duration.scale(left.speed);
        left.duration = left_duration;

        let right_id = right.id;
        let track_id = right.track_id;
        self.tracks[ti].insert_sorted(right);
        self.clip_index.insert(right_id, track_id);
        tracing::debug!(%clip_id, %right_id, at = %at, "clip split");
        Ok(right_id)
    }

    pub fn set_transform(&mut self, clip_id: Uuid, transform: Transform) -> Result<()> {
        self.clip_mut(clip_id)?.transform = transform;
        Ok(())
    }

    pub fn set_clip_volume(&mut self, clip_id: Uuid, volume: f64) -> Result<()> {
        self.clip_mut(clip_id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_clip_opacity(&mut self, clip_id: Uuid, opacity: f64) -> Result<()> {
        self.clip_mut(clip_id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn add_effect(&mut self, clip_id: Uuid, effect: Effect) -> Result<()> {
        self.clip_mut(clip_id)?.effects.push(effect);
        Ok(())
    }

    pub fn remove_effect(&mut self, clip_id: Uuid, effect_id: Uuid) -> Result<Option<Effect>> {
        let clip = self.clip_mut(clip_id)?;
        Ok(clip
            .effects
            .iter()
            .position(|e| e.id == effect_id)
            .map(|pos| clip.effects.remove(pos)))
    }

    /// Put back an earlier version of a clip, replacing whatever version is
    /// currently on the timeline. Used by undo. The saved layer is kept when
    /// it is still free on the destination track; if a clip placed since then
    /// occupies it, the layer is resolved again.
    pub(crate) fn restore_clip(&mut self, mut clip: Clip) -> Result<()> {
        let dst_ti = self.writable_track_index(clip.track_id)?;
        validate_range(clip.start_time, clip.duration)?;
        let current = self.locate(clip.id);
        if let Some((ti, _)) = current {
            self.ensure_unlocked(ti)?;
        }

        let (start, end) = (clip.start_time, clip.end_time());
        let taken = self.tracks[dst_ti].clips.iter().any(|c| {
            c.id != clip.id
                && c.layer_index == clip.layer_index
                && ranges_overlap(start, end, c.start_time, c.end_time())
        });
        if taken {
            let layer = resolve_layer(start, end, &self.tracks[dst_ti].clips, Some(clip.id));
            tracing::debug!(clip_id = %clip.id, from = clip.layer_index, to = layer, "restored clip moved to a free layer");
            clip.layer_index = layer;
        }

        if let Some((ti, ci)) = current {
            self.tracks[ti].clips.remove(ci);
        }
        let (id, track_id) = (clip.id, clip.track_id);
        self.tracks[dst_ti].insert_sorted(clip);
        self.clip_index.insert(id, track_id);
        self.recompute_duration();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    pub(crate) fn recompute_duration(&mut self) {
        self.duration = self
            .clips()
            .map(|c| c.end_time())
            .max()
            .unwrap_or(TimeUs::ZERO);
    }

    /// Rebuild the clip index and duration from the tracks, e.g. after loading.
    pub(crate) fn rebuild_derived(&mut self) {
        self.clip_index = self
            .tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| (c.id, t.id)))
            .collect();
        self.recompute_duration();
    }

    // -----------------------------------------------------------------------
    // Lookup helpers
    // -----------------------------------------------------------------------

    /// (track_index, clip_index) of a clip, via the id index.
    fn locate(&self, clip_id: Uuid) -> Option<(usize, usize)> {
        let track_id = self.clip_index.get(&clip_id)?;
        let ti = self.tracks.iter().position(|t| t.id == *track_id)?;
        let ci = self.tracks[ti].position_of(clip_id)?;
        Some((ti, ci))
    }

    fn writable_track_index(&self, track_id: Uuid) -> Result<usize> {
        let ti = self
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or(CoreError::TrackNotFound(track_id))?;
        self.ensure_unlocked(ti)?;
        Ok(ti)
    }

    fn ensure_unlocked(&self, ti: usize) -> Result<()> {
        let track = &self.tracks[ti];
        if track.is_locked {
            return Err(CoreError::TrackLocked(track.id));
        }
        Ok(())
    }

    fn track_mut(&mut self, track_id: Uuid) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or(CoreError::TrackNotFound(track_id))
    }

    fn clip_mut(&mut self, clip_id: Uuid) -> Result<&mut Clip> {
        let (ti, ci) = self
            .locate(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))?;
        self.ensure_unlocked(ti)?;
        Ok(&mut self.tracks[ti].clips[ci])
    }

    /// Layer for clip (ti, ci) if its duration becomes `new_duration`. The
    /// current layer is kept when the range does not change.
    fn relayer_if_resized(&self, ti: usize, ci: usize, new_duration: TimeUs) -> u32 {
        let clip = &self.tracks[ti].clips[ci];
        if new_duration == clip.duration {
            return clip.layer_index;
        }
        resolve_layer(
            clip.start_time,
            clip.start_time + new_duration,
            &self.tracks[ti].clips,
            Some(clip.id),
        )
    }
}

/// Reject negative starts, empty or negative durations, and ranges whose end
/// does not fit in a `TimeUs`.
pub fn validate_range(start: TimeUs, duration: TimeUs) -> Result<()> {
    if start < TimeUs::ZERO {
        return Err(CoreError::InvalidTimeRange(format!(
            "start {} is negative",
            start
        )));
    }
    if duration <= TimeUs::ZERO {
        return Err(CoreError::InvalidTimeRange(format!(
            "duration {} must be positive",
            duration
        )));
    }
    if start.0.checked_add(duration.0).is_none() {
        return Err(CoreError::InvalidTimeRange(format!(
            "clip starting at {} with duration {} ends past the representable range",
            start, duration
        )));
    }
    Ok(())
}

fn validate_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidSpeed(speed))
    }
}

/// Trims must be non-negative and leave some of the source.
pub fn validate_trim(trim_start: TimeUs, trim_end: TimeUs, native: TimeUs) -> Result<()> {
    if trim_start < TimeUs::ZERO || trim_end < TimeUs::ZERO || trim_start + trim_end >= native {
        return Err(CoreError::InvalidTrim {
            trim_start,
            trim_end,
            native,
        });
    }
    Ok(())
}

/// Pull trims back so at least `MIN_SOURCE_SPAN` of the source remains.
/// The in-point wins over the out-point when both must give.
pub fn clamp_trim(trim_start: TimeUs, trim_end: TimeUs, native: TimeUs) -> (TimeUs, TimeUs) {
    let budget = (native - MIN_SOURCE_SPAN).max(TimeUs::ZERO);
    let start = trim_start.clamp(TimeUs::ZERO, budget);
    let end = trim_end.clamp(TimeUs::ZERO, budget - start);
    (start, end)
}

/// Native length of the media behind a clip, when it has one to trim.
fn trimmable_length(clip: &Clip, media: &MediaLibrary) -> Result<TimeUs> {
    let media_id = clip.media_id().ok_or_else(|| {
        CoreError::InvalidOperation("text clips have no source to trim".into())
    })?;
    let native = media
        .get(media_id)
        .ok_or(CoreError::MediaNotFound(media_id))?
        .native_duration;
    if native <= TimeUs::ZERO {
        return Err(CoreError::InvalidOperation(
            "stills have no source length to trim".into(),
        ));
    }
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: i64) -> TimeUs {
        TimeUs(s * 1_000_000)
    }

    fn span(start_s: i64, end_s: i64) -> Clip {
        Clip::text("c", secs(start_s), secs(end_s - start_s))
    }

    fn make_test_timeline() -> (Timeline, Uuid) {
        let mut tl = Timeline::default();
        let track_id = tl.add_track(TrackKind::Video, "V1");
        (tl, track_id)
    }

    fn media_timeline(native_s: i64) -> (Timeline, MediaLibrary, Uuid, Uuid) {
        let (mut tl, track_id) = make_test_timeline();
        let mut lib = MediaLibrary::new();
        let media = MediaReference::new("a.mp4", "/m/a.mp4", MediaKind::Video, secs(native_s));
        lib.insert(media.clone());
        let clip_id = tl.add_clip(Clip::from_media(&media, TimeUs::ZERO), track_id).unwrap();
        (tl, lib, track_id, clip_id)
    }

    fn assert_invariants(tl: &Timeline) {
        assert!(tl.layer_conflicts().is_empty(), "layer conflict in {:?}", tl);
        let expected = tl.clips().map(|c| c.end_time()).max().unwrap_or(TimeUs::ZERO);
        assert_eq!(tl.duration(), expected);
        for track in tl.tracks() {
            assert!(track.clips().windows(2).all(|w| w[0].start_time <= w[1].start_time));
            for clip in track.clips() {
                assert_eq!(clip.track_id, track.id);
                assert_eq!(tl.clip(clip.id).map(|c| c.id), Some(clip.id));
            }
        }
    }

    // -----------------------------------------------------------------------
    // add_clip / layer assignment
    // -----------------------------------------------------------------------

    #[test]
    fn first_fit_layers_across_inserts() {
        let (mut tl, track_id) = make_test_timeline();
        let a = tl.add_clip(span(0, 5), track_id).unwrap();
        let b = tl.add_clip(span(2, 7), track_id).unwrap();
        let c = tl.add_clip(span(6, 9), track_id).unwrap();

        assert_eq!(tl.clip(a).unwrap().layer_index, 0);
        assert_eq!(tl.clip(b).unwrap().layer_index, 1);
        // Only conflicts with [2,7) on layer 1, so layer 0 is free.
        assert_eq!(tl.clip(c).unwrap().layer_index, 0);
        assert_eq!(tl.duration(), secs(9));
        assert_invariants(&tl);
    }

    #[test]
    fn removed_slot_is_reused_without_compaction() {
        let (mut tl, track_id) = make_test_timeline();
        let bottom = tl.add_clip(span(0, 10), track_id).unwrap();
        let top = tl.add_clip(span(0, 10), track_id).unwrap();
        assert_eq!(tl.clip(top).unwrap().layer_index, 1);

        tl.remove_clip(bottom).unwrap();
        // Survivor is not shifted down.
        assert_eq!(tl.clip(top).unwrap().layer_index, 1);

        let fresh = tl.add_clip(span(0, 10), track_id).unwrap();
        assert_eq!(tl.clip(fresh).unwrap().layer_index, 0);
        assert_invariants(&tl);
    }

    #[test]
    fn add_clip_to_nonexistent_track_fails() {
        let mut tl = Timeline::default();
        let result = tl.add_clip(span(0, 5), Uuid::new_v4());
        assert!(matches!(result.unwrap_err(), CoreError::TrackNotFound(_)));
        assert_eq!(tl.clip_count(), 0);
    }

    #[test]
    fn add_clip_to_locked_track_fails_without_change() {
        let (mut tl, track_id) = make_test_timeline();
        tl.add_clip(span(0, 5), track_id).unwrap();
        tl.set_track_locked(track_id, true).unwrap();
        let before = tl.clone();

        let result = tl.add_clip(span(5, 8), track_id);
        assert!(matches!(result.unwrap_err(), CoreError::TrackLocked(id) if id == track_id));
        assert_eq!(tl, before);
    }

    #[test]
    fn add_clip_rejects_bad_ranges() {
        let (mut tl, track_id) = make_test_timeline();
        let negative = Clip::text("c", TimeUs(-1), secs(1));
        assert!(matches!(
            tl.add_clip(negative, track_id).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));
        let empty = Clip::text("c", secs(1), TimeUs::ZERO);
        assert!(matches!(
            tl.add_clip(empty, track_id).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));
        let mut stalled = span(0, 1);
        stalled.speed = 0.0;
        assert!(matches!(
            tl.add_clip(stalled, track_id).unwrap_err(),
            CoreError::InvalidSpeed(_)
        ));
        assert_eq!(tl.clip_count(), 0);
        assert_eq!(tl.duration(), TimeUs::ZERO);
    }

    #[test]
    fn add_same_clip_twice_fails() {
        let (mut tl, track_id) = make_test_timeline();
        let clip = span(0, 5);
        tl.add_clip(clip.clone(), track_id).unwrap();
        assert!(matches!(
            tl.add_clip(clip, track_id).unwrap_err(),
            CoreError::InvalidOperation(_)
        ));
    }

    #[test]
    fn add_clip_overrides_track_and_clamps_mix() {
        let (mut tl, track_id) = make_test_timeline();
        let mut clip = span(0, 5);
        clip.layer_index = 7;
        clip.volume = 3.0;
        clip.opacity = -1.0;
        let id = tl.add_clip(clip, track_id).unwrap();
        let placed = tl.clip(id).unwrap();
        assert_eq!(placed.track_id, track_id);
        assert_eq!(placed.layer_index, 0);
        assert_eq!(placed.volume, 1.0);
        assert_eq!(placed.opacity, 0.0);
    }

    // -----------------------------------------------------------------------
    // remove_clip
    // -----------------------------------------------------------------------

    #[test]
    fn remove_clip_twice_is_idempotent() {
        let (mut tl, track_id) = make_test_timeline();
        let a = tl.add_clip(span(0, 5), track_id).unwrap();
        tl.add_clip(span(1, 3), track_id).unwrap();

        assert!(tl.remove_clip(a).unwrap().is_some());
        let once = tl.clone();
        assert!(tl.remove_clip(a).unwrap().is_none());
        assert_eq!(tl, once);
        assert_eq!(tl.duration(), secs(3));
    }

    #[test]
    fn remove_last_clip_resets_duration() {
        let (mut tl, track_id) = make_test_timeline();
        let a = tl.add_clip(span(4, 6), track_id).unwrap();
        tl.remove_clip(a).unwrap();
        assert_eq!(tl.duration(), TimeUs::ZERO);
    }

    #[test]
    fn remove_clip_on_locked_track_fails() {
        let (mut tl, track_id) = make_test_timeline();
        let a = tl.add_clip(span(0, 5), track_id).unwrap();
        tl.set_track_locked(track_id, true).unwrap();
        assert!(matches!(
            tl.remove_clip(a).unwrap_err(),
            CoreError::TrackLocked(_)
        ));
        assert!(tl.clip(a).is_some());
    }

    // -----------------------------------------------------------------------
    // move_clip
    // -----------------------------------------------------------------------

    #[test]
    fn move_clip_within_track_reresolves_layer() {
        let (mut tl, track_id) = make_test_timeline();
        tl.add_clip(span(0, 5), track_id).unwrap();
        let b = tl.add_clip(span(10, 12), track_id).unwrap();
        assert_eq!(tl.clip(b).unwrap().layer_index, 0);

        tl.move_clip(b, secs(3), track_id).unwrap();
        let moved = tl.clip(b).unwrap();
        assert_eq!(moved.start_time, secs(3));
        assert_eq!(moved.layer_index, 1);
        assert_eq!(tl.duration(), secs(5));
        assert_invariants(&tl);
    }

    #[test]
    fn move_clip_across_tracks_updates_index() {
        let (mut tl, v1) = make_test_timeline();
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let a = tl.add_clip(span(0, 5), v1).unwrap();
        tl.add_clip(span(0, 20), v2).unwrap();

        tl.move_clip(a, secs(1), v2).unwrap();
        assert!(tl.track(v1).unwrap().clips().is_empty());
        let moved = tl.clip(a).unwrap();
        assert_eq!(moved.track_id, v2);
        assert_eq!(moved.layer_index, 1);
        assert_invariants(&tl);
    }

    #[test]
    fn move_clip_failure_leaves_timeline_unchanged() {
        let (mut tl, v1) = make_test_timeline();
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let a = tl.add_clip(span(0, 5), v1).unwrap();
        tl.set_track_locked(v2, true).unwrap();
        let before = tl.clone();

        assert!(matches!(
            tl.move_clip(a, secs(2), v2).unwrap_err(),
            CoreError::TrackLocked(id) if id == v2
        ));
        assert!(matches!(
            tl.move_clip(a, secs(2), Uuid::new_v4()).unwrap_err(),
            CoreError::TrackNotFound(_)
        ));
        assert!(matches!(
            tl.move_clip(a, TimeUs(-5), v1).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));
        assert_eq!(tl, before);
    }

    #[test]
    fn move_clip_from_locked_track_fails() {
        let (mut tl, v1) = make_test_timeline();
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let a = tl.add_clip(span(0, 5), v1).unwrap();
        tl.set_track_locked(v1, true).unwrap();
        assert!(matches!(
            tl.move_clip(a, secs(0), v2).unwrap_err(),
            CoreError::TrackLocked(id) if id == v1
        ));
    }

    #[test]
    fn move_missing_clip_fails() {
        let (mut tl, track_id) = make_test_timeline();
        assert!(matches!(
            tl.move_clip(Uuid::new_v4(), secs(0), track_id).unwrap_err(),
            CoreError::ClipNotFound(_)
        ));
    }

    // -----------------------------------------------------------------------
    // clips_at
    // -----------------------------------------------------------------------

    #[test]
    fn clips_at_sorted_by_layer_across_tracks() {
        let (mut tl, v1) = make_test_timeline();
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let a = tl.add_clip(span(0, 10), v1).unwrap();
        let b = tl.add_clip(span(2, 8), v1).unwrap();
        let c = tl.add_clip(span(1, 6), v1).unwrap();
        let d = tl.add_clip(span(0, 4), v2).unwrap();

        let at: Vec<(Uuid, u32)> = tl
            .clips_at(secs(3))
            .iter()
            .map(|c| (c.id, c.layer_index))
            .collect();
        assert_eq!(at.len(), 4);
        assert!(at.windows(2).all(|w| w[0].1 <= w[1].1));
        // Ties keep track order: v1's layer-0 clip before v2's.
        assert_eq!(at[0].0, a);
        assert_eq!(at[1].0, d);
        assert!(at[2..].iter().any(|(id, _)| *id == b));
        assert!(at[2..].iter().any(|(id, _)| *id == c));
    }

    #[test]
    fn clips_at_excludes_end_boundary() {
        let (mut tl, track_id) = make_test_timeline();
        tl.add_clip(span(0, 5), track_id).unwrap();
        assert_eq!(tl.clips_at(secs(0)).len(), 1);
        assert!(tl.clips_at(secs(5)).is_empty());
    }

    // -----------------------------------------------------------------------
    // remove_media_cascade
    // -----------------------------------------------------------------------

    #[test]
    fn media_cascade_removes_across_tracks() {
        let mut tl = Timeline::default();
        let v1 = tl.add_track(TrackKind::Video, "V1");
        let a1 = tl.add_track(TrackKind::Audio, "A1");
        let media = MediaReference::new("a.mp4", "/m/a.mp4", MediaKind::Video, secs(4));
        let other = MediaReference::new("b.mp4", "/m/b.mp4", MediaKind::Video, secs(20));

        tl.add_clip(Clip::from_media(&media, secs(0)), v1).unwrap();
        tl.add_clip(Clip::from_media(&media, secs(10)), a1).unwrap();
        let keep = tl.add_clip(Clip::from_media(&other, secs(0)), v1).unwrap();
        assert_eq!(tl.duration(), secs(20));

        let removed = tl.remove_media_cascade(media.id).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(tl.clip_count(), 1);
        assert!(tl.clip(keep).is_some());
        assert_eq!(tl.duration(), secs(20));
        assert_invariants(&tl);
    }

    #[test]
    fn media_cascade_is_all_or_nothing() {
        let mut tl = Timeline::default();
        let v1 = tl.add_track(TrackKind::Video, "V1");
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let media = MediaReference::new("a.mp4", "/m/a.mp4", MediaKind::Video, secs(4));
        tl.add_clip(Clip::from_media(&media, secs(0)), v1).unwrap();
        tl.add_clip(Clip::from_media(&media, secs(0)), v2).unwrap();
        tl.set_track_locked(v2, true).unwrap();
        let before = tl.clone();

        assert!(matches!(
            tl.remove_media_cascade(media.id).unwrap_err(),
            CoreError::TrackLocked(id) if id == v2
        ));
        assert_eq!(tl, before);
    }

    // -----------------------------------------------------------------------
    // trim / speed / split
    // -----------------------------------------------------------------------

    #[test]
    fn trim_clip_shortens_from_both_ends() {
        let (mut tl, lib, _, clip_id) = media_timeline(10);
        let clamped = tl.trim_clip(clip_id, secs(2), secs(3), &lib).unwrap();
        assert!(!clamped);

        let clip = tl.clip(clip_id).unwrap();
        assert_eq!(clip.start_time, TimeUs::ZERO);
        assert_eq!(clip.duration, secs(5));
        assert_eq!(tl.duration(), secs(5));
    }

    #[test]
    fn trim_clip_clamps_degenerate_trims() {
        let (mut tl, lib, _, clip_id) = media_timeline(10);
        let clamped = tl.trim_clip(clip_id, secs(6), secs(6), &lib).unwrap();
        assert!(clamped);

        let clip = tl.clip(clip_id).unwrap();
        assert_eq!(clip.trim_start, secs(6));
        assert_eq!(clip.trim_end, secs(4) - MIN_SOURCE_SPAN);
        assert!(clip.trim_start + clip.trim_end < secs(10));
        assert_eq!(clip.duration, MIN_SOURCE_SPAN);
    }

    #[test]
    fn trim_clip_clamps_negative_trims() {
        let (mut tl, lib, _, clip_id) = media_timeline(10);
        assert!(tl.trim_clip(clip_id, TimeUs(-5), secs(1), &lib).unwrap());
        let clip = tl.clip(clip_id).unwrap();
        assert_eq!(clip.trim_start, TimeUs::ZERO);
        assert_eq!(clip.duration, secs(9));
    }

    #[test]
    fn trim_extension_reresolves_layer() {
        let (mut tl, lib, track_id, clip_id) = media_timeline(10);
        tl.trim_clip(clip_id, TimeUs::ZERO, secs(8), &lib).unwrap();
        tl.add_clip(span(5, 8), track_id).unwrap();
        assert_eq!(tl.clip(clip_id).unwrap().layer_index, 0);

        // Growing back to [0,10) now overlaps [5,8) which holds layer 0.
        tl.trim_clip(clip_id, TimeUs::ZERO, TimeUs::ZERO, &lib).unwrap();
        assert_eq!(tl.clip(clip_id).unwrap().layer_index, 1);
        assert_invariants(&tl);
    }

    #[test]
    fn trim_text_clip_is_invalid() {
        let (mut tl, track_id) = make_test_timeline();
        let id = tl.add_clip(span(0, 5), track_id).unwrap();
        let err = tl.trim_clip(id, secs(1), secs(1), &MediaLibrary::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn set_speed_rescales_duration() {
        let (mut tl, lib, _, clip_id) = media_timeline(10);
        tl.set_speed(clip_id, 2.0, &lib).unwrap();
        assert_eq!(tl.clip(clip_id).unwrap().duration, secs(5));
        assert_eq!(tl.duration(), secs(5));

        tl.set_speed(clip_id, 0.5, &lib).unwrap();
        assert_eq!(tl.clip(clip_id).unwrap().duration, secs(20));
        assert!(matches!(
            tl.set_speed(clip_id, -1.0, &lib).unwrap_err(),
            CoreError::InvalidSpeed(_)
        ));
    }

    #[test]
    fn split_clip_preserves_source_continuity() {
        let (mut tl, lib, _, clip_id) = media_timeline(10);
        tl.set_speed(clip_id, 2.0, &lib).unwrap(); // [0,5) covering 10s of source
        let right_id = tl.split_clip(clip_id, secs(2)).unwrap();

        let left = tl.clip(clip_id).unwrap();
        let right = tl.clip(right_id).unwrap();
        assert_eq!(left.duration, secs(2));
        assert_eq!(left.trim_end, secs(6));
        assert_eq!(right.start_time, secs(2));
        assert_eq!(right.duration, secs(3));
        assert_eq!(right.trim_start, secs(4));
        assert_eq!(right.layer_index, left.layer_index);
        assert_eq!(tl.duration(), secs(5));
        assert_invariants(&tl);
    }

    #[test]
    fn split_at_edges_fails() {
        let (mut tl, track_id) = make_test_timeline();
        let id = tl.add_clip(span(0, 5), track_id).unwrap();
        assert!(tl.split_clip(id, secs(0)).is_err());
        assert!(tl.split_clip(id, secs(5)).is_err());
        assert_eq!(tl.clip_count(), 1);
    }

    #[test]
    fn transform_and_mix_edits_keep_layer() {
        let (mut tl, track_id) = make_test_timeline();
        tl.add_clip(span(0, 5), track_id).unwrap();
        let b = tl.add_clip(span(0, 5), track_id).unwrap();

        let mut transform = Transform::default();
        transform.rotation_degrees = 90.0;
        transform.flip_h = true;
        tl.set_transform(b, transform.clone()).unwrap();
        tl.set_clip_opacity(b, 0.25).unwrap();
        tl.set_clip_volume(b, 2.0).unwrap();
        let effect = Effect::new("glow");
        let effect_id = effect.id;
        tl.add_effect(b, effect).unwrap();

        let clip = tl.clip(b).unwrap();
        assert_eq!(clip.transform, transform);
        assert_eq!(clip.opacity, 0.25);
        assert_eq!(clip.volume, 1.0);
        assert_eq!(clip.layer_index, 1);

        assert!(tl.remove_effect(b, effect_id).unwrap().is_some());
        assert!(tl.remove_effect(b, effect_id).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // tracks
    // -----------------------------------------------------------------------

    #[test]
    fn remove_track_cascades_clips() {
        let (mut tl, v1) = make_test_timeline();
        let v2 = tl.add_track(TrackKind::Video, "V2");
        let a = tl.add_clip(span(0, 20), v1).unwrap();
        tl.add_clip(span(0, 5), v2).unwrap();

        let removed = tl.remove_track(v1).unwrap();
        assert_eq!(removed.clips().len(), 1);
        assert!(tl.clip(a).is_none());
        assert_eq!(tl.clip_count(), 1);
        assert_eq!(tl.duration(), secs(5));
    }

    #[test]
    fn track_for_kind_creates_once() {
        let mut tl = Timeline::default();
        let first = tl.track_for_kind_or_insert(TrackKind::Subtitle);
        let again = tl.track_for_kind_or_insert(TrackKind::Subtitle);
        assert_eq!(first, again);
        assert_eq!(tl.track(first).unwrap().name, "Subtitle 1");

        tl.set_track_locked(first, true).unwrap();
        let second = tl.track_for_kind_or_insert(TrackKind::Subtitle);
        assert_ne!(first, second);
        assert_eq!(tl.track(second).unwrap().name, "Subtitle 2");
    }

    #[test]
    fn track_state_setters_clamp() {
        let (mut tl, track_id) = make_test_timeline();
        tl.set_track_volume(track_id, 1.5).unwrap();
        tl.set_track_opacity(track_id, -0.5).unwrap();
        tl.set_track_muted(track_id, true).unwrap();
        tl.set_track_visible(track_id, false).unwrap();
        let track = tl.track(track_id).unwrap();
        assert_eq!(track.volume, 1.0);
        assert_eq!(track.opacity, 0.0);
        assert!(track.is_muted);
        assert!(!track.is_visible);
        assert!(matches!(
            tl.set_track_muted(Uuid::new_v4(), true).unwrap_err(),
            CoreError::TrackNotFound(_)
        ));
    }

    // -----------------------------------------------------------------------
    // invariants under a long random edit sequence
    // -----------------------------------------------------------------------

    /// Small deterministic LCG so the sequence is reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % bound
        }
    }

    #[test]
    fn invariants_hold_after_every_edit() {
        let mut rng = Lcg(42);
        let mut tl = Timeline::default();
        let tracks = [
            tl.add_track(TrackKind::Video, "V1"),
            tl.add_track(TrackKind::Video, "V2"),
            tl.add_track(TrackKind::Text, "T1"),
        ];
        let mut lib = MediaLibrary::new();
        let media = MediaReference::new("m.mp4", "/m/m.mp4", MediaKind::Video, secs(8));
        lib.insert(media.clone());
        let mut ids: Vec<Uuid> = Vec::new();

        for _ in 0..800 {
            let track = tracks[rng.next(3) as usize];
            let pick = |rng: &mut Lcg, ids: &[Uuid]| ids[rng.next(ids.len() as u64) as usize];
            match rng.next(8) {
                0 => {
                    let start = TimeUs(rng.next(30) as i64 * 500_000);
                    let dur = TimeUs((rng.next(10) as i64 + 1) * 500_000);
                    ids.push(tl.add_clip(Clip::text("r", start, dur), track).unwrap());
                }
                1 => {
                    let start = TimeUs(rng.next(30) as i64 * 500_000);
                    ids.push(tl.add_clip(Clip::from_media(&media, start), track).unwrap());
                }
                2 if !ids.is_empty() => {
                    let id = pick(&mut rng, &ids);
                    let start = TimeUs(rng.next(30) as i64 * 500_000);
                    tl.move_clip(id, start, track).unwrap();
                }
                3 if !ids.is_empty() => {
                    let id = ids.swap_remove(rng.next(ids.len() as u64) as usize);
                    tl.remove_clip(id).unwrap();
                }
                4 if !ids.is_empty() => {
                    // Text clips refuse trims; media clips clamp.
                    let id = pick(&mut rng, &ids);
                    let ts = TimeUs(rng.next(20) as i64 * 500_000);
                    let te = TimeUs(rng.next(20) as i64 * 500_000);
                    let _ = tl.trim_clip(id, ts, te, &lib);
                }
                5 if !ids.is_empty() => {
                    let id = pick(&mut rng, &ids);
                    let speed = [0.5, 1.0, 2.0, 4.0][rng.next(4) as usize];
                    tl.set_speed(id, speed, &lib).unwrap();
                }
                6 if !ids.is_empty() => {
                    let id = pick(&mut rng, &ids);
                    let clip = tl.clip(id).unwrap();
                    let at = clip.start_time + TimeUs(clip.duration.0 / 2);
                    if let Ok(right) = tl.split_clip(id, at) {
                        ids.push(right);
                    }
                }
                7 if !ids.is_empty() => {
                    let id = pick(&mut rng, &ids);
                    tl.set_clip_opacity(id, 0.5).unwrap();
                }
                _ => {}
            }
            assert_invariants(&tl);
            let sample = TimeUs(rng.next(40) as i64 * 250_000);
            let at = tl.clips_at(sample);
            assert!(at.windows(2).all(|w| w[0].layer_index <= w[1].layer_index));
        }
    }

    // -----------------------------------------------------------------------
    // range overflow / restore
    // -----------------------------------------------------------------------

    #[test]
    fn ranges_ending_past_time_limit_are_rejected() {
        let (mut tl, track_id) = make_test_timeline();
        let far = Clip::text("x", TimeUs(i64::MAX - 5), TimeUs(10));
        assert!(matches!(
            tl.add_clip(far, track_id).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));

        let id = tl.add_clip(span(0, 5), track_id).unwrap();
        assert!(matches!(
            tl.move_clip(id, TimeUs(i64::MAX - 1), track_id).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));
        assert_eq!(tl.clip(id).unwrap().start_time, TimeUs::ZERO);
        assert_eq!(tl.duration(), secs(5));
    }

    #[test]
    fn extreme_slowdown_is_rejected_when_it_overflows() {
        let (mut tl, lib, track_id, clip_id) = media_timeline(10);
        tl.move_clip(clip_id, TimeUs(i64::MAX / 2), track_id).unwrap();
        assert!(matches!(
            tl.set_speed(clip_id, 1e-12, &lib).unwrap_err(),
            CoreError::InvalidTimeRange(_)
        ));
        assert_eq!(tl.clip(clip_id).unwrap().speed, 1.0);
    }

    #[test]
    fn restore_keeps_free_layer_and_reresolves_taken_one() {
        let (mut tl, track_id) = make_test_timeline();
        let a = tl.add_clip(span(0, 5), track_id).unwrap();
        let b = tl.add_clip(span(0, 5), track_id).unwrap();
        let saved_b = tl.clip(b).unwrap().clone();
        assert_eq!(saved_b.layer_index, 1);

        // Slot still free: the saved layer comes back as-is.
        tl.move_clip(b, secs(20), track_id).unwrap();
        tl.restore_clip(saved_b.clone()).unwrap();
        assert_eq!(tl.clip(b).unwrap().layer_index, 1);

        // Another clip took layer 1 over [0,5) in the meantime.
        tl.move_clip(b, secs(20), track_id).unwrap();
        let c = tl.add_clip(span(1, 4), track_id).unwrap();
        assert_eq!(tl.clip(c).unwrap().layer_index, 1);
        tl.restore_clip(saved_b).unwrap();
        assert_eq!(tl.clip(b).unwrap().layer_index, 2);
        assert_eq!(tl.clip(a).unwrap().layer_index, 0);
        assert_invariants(&tl);
    }
}
