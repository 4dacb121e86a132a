//! The engine's single owner of mutable state.
//!
//! `Controller` holds the project, undo history, playback clock and renderer,
//! and applies `EngineEvent`s one at a time. Tick sources, renderers and
//! services only ever post events, so edits, ticks and seeks never
//! interleave.

use crate::clock::{ClockSnapshot, PlaybackClock, TickOutcome};
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::events::{EditRequest, EngineEvent, EventReceiver, EventSender, Transport};
use crate::renderer::Renderer;
use crate::services::ServiceResult;
use crate::ticker::TickSource;
use cutline_core::error::CoreError;
use cutline_core::history::{
    AddClipCommand, History, MoveClipCommand, RemoveClipCommand, SetSpeedCommand,
    SplitClipCommand, TrimClipCommand,
};
use cutline_core::types::{Clip, Project, TimeUs, TrackKind};
use tokio::sync::watch;
use uuid::Uuid;

const HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct Controller<R: Renderer> {
    project: Project,
    history: History,
    clock: PlaybackClock,
    renderer: R,
    config: PlaybackConfig,
    events: EventSender,
    ticker: Option<TickSource>,
    generation: u64,
    snapshots: watch::Sender<ClockSnapshot>,
}

impl<R: Renderer> Controller<R> {
    /// `events` is the sending half of the stream later passed to `run`; the
    /// tick source posts to it.
    pub fn new(project: Project, renderer: R, config: PlaybackConfig, events: EventSender) -> Self {
        let mut clock = PlaybackClock::new(&config);
        clock.set_bound(project.timeline.duration());
        let (snapshots, _) = watch::channel(clock.snapshot());
        Self {
            project,
            history: History::new(HISTORY_DEPTH),
            clock,
            renderer,
            config,
            events,
            ticker: None,
            generation: 0,
            snapshots,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Generation of the current tick source. Ticks tagged otherwise are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clock snapshots, updated after every handled event.
    pub fn subscribe(&self) -> watch::Receiver<ClockSnapshot> {
        self.snapshots.subscribe()
    }

    /// Consume events until `Shutdown`, then hand the project back.
    /// The controller keeps a sender for its tick source, so the stream does
    /// not end on its own.
    pub async fn run(mut self, mut events: EventReceiver) -> Project {
        tracing::info!(
            clips = self.project.timeline.clip_count(),
            duration = %self.project.timeline.duration(),
            "engine running"
        );
        self.present();
        while let Some(event) = events.recv().await {
            if self.handle(event) == Flow::Shutdown {
                break;
            }
        }
        self.ticker = None;
        tracing::info!("engine stopped");
        self.project
    }

    pub fn handle(&mut self, event: EngineEvent) -> Flow {
        match event {
            EngineEvent::Edit(request) => {
                if let Err(err) = self.edit(request) {
                    tracing::warn!(%err, "edit rejected");
                }
            }
            EngineEvent::Transport(transport) => match transport {
                Transport::Play => self.play(),
                Transport::Pause => self.pause(),
                Transport::Stop => self.stop(),
                Transport::Seek(time) => {
                    self.seek(time);
                }
            },
            EngineEvent::Tick { generation } => self.on_tick(generation),
            EngineEvent::RendererPosition(reported) => {
                if self.clock.reconcile(reported) {
                    self.present();
                }
            }
            EngineEvent::Service(result) => {
                self.apply_service_result(result);
            }
            EngineEvent::Undo => {
                if let Err(err) = self.undo() {
                    tracing::debug!(%err, "undo");
                }
            }
            EngineEvent::Redo => {
                if let Err(err) = self.redo() {
                    tracing::debug!(%err, "redo");
                }
            }
            EngineEvent::Shutdown => {
                self.halt_ticker();
                self.publish();
                return Flow::Shutdown;
            }
        }
        self.publish();
        Flow::Continue
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Start playback. Must be called from within a tokio runtime.
    pub fn play(&mut self) {
        if !self.clock.play() {
            return;
        }
        self.generation += 1;
        self.ticker = Some(TickSource::spawn(
            self.config.tick_interval(),
            self.generation,
            self.events.clone(),
        ));
        self.renderer.set_playing(true);
        tracing::info!(time = %self.clock.current_time(), "playback started");
    }

    pub fn pause(&mut self) {
        if !self.clock.pause() {
            return;
        }
        self.halt_ticker();
        self.renderer.set_playing(false);
        tracing::info!(time = %self.clock.current_time(), "playback paused");
    }

    pub fn stop(&mut self) {
        let was_running = self.clock.is_running();
        self.clock.stop();
        self.halt_ticker();
        if was_running {
            self.renderer.set_playing(false);
            tracing::info!(time = %self.clock.current_time(), "playback stopped");
        }
    }

    /// Seek in any state. Returns the clamped time actually applied.
    pub fn seek(&mut self, time: TimeUs) -> TimeUs {
        let applied = self.clock.seek(time);
        self.renderer.seek(applied);
        self.present();
        applied
    }

    fn on_tick(&mut self, generation: u64) {
        if self.ticker.is_none() || generation != self.generation {
            tracing::trace!(generation, current = self.generation, "stale tick dropped");
            return;
        }
        match self.clock.tick() {
            TickOutcome::Idle => {}
            TickOutcome::Advanced(_) => self.present(),
            TickOutcome::ReachedEnd => {
                self.halt_ticker();
                self.renderer.set_playing(false);
                self.renderer.seek(TimeUs::ZERO);
                self.present();
                tracing::info!("playback reached end");
            }
        }
    }

    /// Drop the tick source and invalidate any ticks still queued from it.
    fn halt_ticker(&mut self) {
        if self.ticker.take().is_some() {
            self.generation += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Apply a user edit. Returns the id of the clip or media it created, if any.
    pub fn edit(&mut self, request: EditRequest) -> Result<Option<Uuid>> {
        let created = match request {
            EditRequest::AddClip { clip, track_id } => {
                let cmd = AddClipCommand::new(track_id, clip);
                let id = cmd.clip_id();
                self.history.execute(Box::new(cmd), &mut self.project)?;
                Some(id)
            }
            EditRequest::PlaceMedia {
                media_id,
                track_id,
                start,
            } => {
                let media = self
                    .project
                    .media
                    .get(media_id)
                    .ok_or(CoreError::MediaNotFound(media_id))?;
                let clip = Clip::from_media(media, start);
                let kind = media.kind.track_kind();
                let (track_id, created) = match track_id {
                    Some(id) => (id, false),
                    None => self.project.timeline.find_or_create_track(kind),
                };
                let cmd = AddClipCommand::new(track_id, clip);
                let id = cmd.clip_id();
                if let Err(err) = self.history.execute(Box::new(cmd), &mut self.project) {
                    if created {
                        self.project.timeline.discard_created_track(track_id);
                    }
                    return Err(err.into());
                }
                Some(id)
            }
            EditRequest::MoveClip {
                clip_id,
                new_start,
                new_track_id,
            } => {
                let cmd = MoveClipCommand::new(clip_id, new_start, new_track_id);
                self.history.execute(Box::new(cmd), &mut self.project)?;
                None
            }
            EditRequest::RemoveClip { clip_id } => {
                let cmd = RemoveClipCommand::new(clip_id);
                self.history.execute(Box::new(cmd), &mut self.project)?;
                None
            }
            EditRequest::TrimClip {
                clip_id,
                trim_start,
                trim_end,
            } => {
                let cmd = TrimClipCommand::new(clip_id, trim_start, trim_end);
                self.history.execute(Box::new(cmd), &mut self.project)?;
                None
            }
            EditRequest::SetSpeed { clip_id, speed } => {
                let cmd = SetSpeedCommand::new(clip_id, speed);
                self.history.execute(Box::new(cmd), &mut self.project)?;
                None
            }
            EditRequest::SplitClip { clip_id, at } => {
                let cmd = SplitClipCommand::new(clip_id, at);
                self.history.execute(Box::new(cmd), &mut self.project)?;
                None
            }
            EditRequest::ImportMedia(media) => Some(self.project.import_media(media)),
            EditRequest::RemoveMedia { media_id } => {
                let removed = self.project.remove_media(media_id)?;
                // Recorded edits may still refer to the removed clips.
                self.history.clear();
                tracing::debug!(%media_id, clips = removed.len(), "media removed, history cleared");
                None
            }
        };
        self.after_mutation();
        Ok(created)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.history.undo(&mut self.project)?;
        self.after_mutation();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        self.history.redo(&mut self.project)?;
        self.after_mutation();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Service results
    // -----------------------------------------------------------------------

    /// Insert the clips a service produced. Results aimed at a track that is
    /// gone or locked are dropped. Returns the ids of inserted clips.
    pub fn apply_service_result(&mut self, result: ServiceResult) -> Vec<Uuid> {
        let inserted = match result {
            ServiceResult::Subtitles { track_id, cues } => {
                if !self.track_accepts(track_id) {
                    tracing::warn!(%track_id, cues = cues.len(), "dropping stale subtitles");
                    return vec![];
                }
                let mut inserted = Vec::with_capacity(cues.len());
                for cue in cues {
                    if cue.end <= cue.start {
                        tracing::warn!(start = %cue.start, end = %cue.end, "skipping empty subtitle cue");
                        continue;
                    }
                    let clip = Clip::text(cue.text, cue.start, cue.end - cue.start);
                    match self.project.add_clip(clip, track_id) {
                        Ok(id) => inserted.push(id),
                        Err(err) => tracing::warn!(%err, "subtitle cue rejected"),
                    }
                }
                inserted
            }
            ServiceResult::GeneratedAudio {
                track_id,
                media,
                start,
            } => {
                let (track_id, created) = match track_id {
                    Some(id) if self.track_accepts(id) => (id, false),
                    Some(id) => {
                        tracing::warn!(track_id = %id, "dropping stale generated audio");
                        return vec![];
                    }
                    None => self.project.timeline.find_or_create_track(TrackKind::Audio),
                };
                let clip = Clip::from_media(&media, start);
                let newly_registered = !self.project.media.contains(media.id);
                let media_id = self.project.import_media(media);
                match self.project.add_clip(clip, track_id) {
                    Ok(id) => vec![id],
                    Err(err) => {
                        tracing::warn!(%err, "generated audio rejected");
                        if newly_registered {
                            self.project.media.remove(media_id);
                        }
                        if created {
                            self.project.timeline.discard_created_track(track_id);
                        }
                        vec![]
                    }
                }
            }
        };
        if !inserted.is_empty() {
            tracing::debug!(clips = inserted.len(), "service result applied");
            self.after_mutation();
        }
        inserted
    }

    fn track_accepts(&self, track_id: Uuid) -> bool {
        self.project
            .timeline
            .track(track_id)
            .is_some_and(|t| !t.is_locked)
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    fn after_mutation(&mut self) {
        self.clock.set_bound(self.project.timeline.duration());
        self.present();
    }

    fn present(&mut self) {
        let time = self.clock.current_time();
        let clips = self.project.timeline.clips_at(time);
        self.renderer.present(time, &clips, &self.project.media);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.clock.snapshot());
    }
}
