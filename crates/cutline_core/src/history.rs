use crate::error::{CoreError, Result};
use crate::types::*;
use uuid::Uuid;

/// A project edit that can be executed, undone, and described.
pub trait Command: std::fmt::Debug + Send {
    fn execute(&mut self, project: &mut Project) -> Result<()>;
    fn undo(&mut self, project: &mut Project) -> Result<()>;
    fn description(&self) -> &str;
}

/// Bounded undo/redo history.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_size: usize,
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Execute a command and push it onto the undo stack. Clears redo stack.
    /// A failing command is not recorded.
    pub fn execute(&mut self, mut cmd: Box<dyn Command>, project: &mut Project) -> Result<()> {
        cmd.execute(project)?;
        self.redo_stack.clear();
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    /// Undo the last command.
    pub fn undo(&mut self, project: &mut Project) -> Result<()> {
        let mut cmd = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        if let Err(err) = cmd.undo(project) {
            self.undo_stack.push(cmd);
            return Err(err);
        }
        tracing::debug!(command = cmd.description(), "undo");
        self.redo_stack.push(cmd);
        Ok(())
    }

    /// Redo the last undone command.
    pub fn redo(&mut self, project: &mut Project) -> Result<()> {
        let mut cmd = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        if let Err(err) = cmd.execute(project) {
            self.redo_stack.push(cmd);
            return Err(err);
        }
        tracing::debug!(command = cmd.description(), "redo");
        self.undo_stack.push(cmd);
        Ok(())
    }

    /// Forget every recorded command, e.g. after an edit that history
    /// cannot replay around.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|cmd| cmd.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|cmd| cmd.description())
    }
}

/// Snapshot of a clip taken before an edit, so undo puts back the exact
/// previous version (same track, same layer) instead of re-resolving.
fn snapshot(project: &Project, clip_id: Uuid) -> Result<Clip> {
    project
        .timeline
        .clip(clip_id)
        .cloned()
        .ok_or(CoreError::ClipNotFound(clip_id))
}

/// Media-backed clips may only come back while their media is registered;
/// otherwise undo would revive clips a media removal already cascaded away.
fn ensure_media(project: &Project, clip: &Clip) -> Result<()> {
    match clip.media_id() {
        Some(media_id) if !project.media.contains(media_id) => {
            Err(CoreError::MediaNotFound(media_id))
        }
        _ => Ok(()),
    }
}

fn restore(project: &mut Project, clip: Clip) -> Result<()> {
    ensure_media(project, &clip)?;
    project.timeline.restore_clip(clip)
}

fn saved<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
    slot.clone()
        .ok_or_else(|| CoreError::InvalidOperation(format!("no {} saved", what)))
}

// ---------------------------------------------------------------------------
// AddClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AddClipCommand {
    track_id: Uuid,
    clip: Clip,
}

impl AddClipCommand {
    pub fn new(track_id: Uuid, clip: Clip) -> Self {
        Self { track_id, clip }
    }

    pub fn clip_id(&self) -> Uuid {
        self.clip.id
    }
}

impl Command for AddClipCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        project.add_clip(self.clip.clone(), self.track_id).map(|_| ())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        project.timeline.remove_clip(self.clip.id).map(|_| ())
    }

    fn description(&self) -> &str {
        "Add clip"
    }
}

// ---------------------------------------------------------------------------
// RemoveClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RemoveClipCommand {
    clip_id: Uuid,
    removed: Option<Clip>,
}

impl RemoveClipCommand {
    pub fn new(clip_id: Uuid) -> Self {
        Self {
            clip_id,
            removed: None,
        }
    }
}

impl Command for RemoveClipCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        self.removed = project.timeline.remove_clip(self.clip_id)?;
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        // Removing an absent clip was a no-op; so is undoing it.
        match self.removed.clone() {
            Some(clip) => restore(project, clip),
            None => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "Remove clip"
    }
}

// ---------------------------------------------------------------------------
// MoveClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MoveClipCommand {
    clip_id: Uuid,
    new_start: TimeUs,
    new_track_id: Uuid,
    before: Option<Clip>,
}

impl MoveClipCommand {
    pub fn new(clip_id: Uuid, new_start: TimeUs, new_track_id: Uuid) -> Self {
        Self {
            clip_id,
            new_start,
            new_track_id,
            before: None,
        }
    }
}

impl Command for MoveClipCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = snapshot(project, self.clip_id)?;
        project
            .timeline
            .move_clip(self.clip_id, self.new_start, self.new_track_id)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let before = saved(&self.before, "pre-move clip")?;
        restore(project, before)
    }

    fn description(&self) -> &str {
        "Move clip"
    }
}

// ---------------------------------------------------------------------------
// TrimClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TrimClipCommand {
    clip_id: Uuid,
    trim_start: TimeUs,
    trim_end: TimeUs,
    before: Option<Clip>,
}

impl TrimClipCommand {
    pub fn new(clip_id: Uuid, trim_start: TimeUs, trim_end: TimeUs) -> Self {
        Self {
            clip_id,
            trim_start,
            trim_end,
            before: None,
        }
    }
}

impl Command for TrimClipCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = snapshot(project, self.clip_id)?;
        project.trim_clip(self.clip_id, self.trim_start, self.trim_end)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let before = saved(&self.before, "pre-trim clip")?;
        restore(project, before)
    }

    fn description(&self) -> &str {
        "Trim clip"
    }
}

// ---------------------------------------------------------------------------
// SetSpeedCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SetSpeedCommand {
    clip_id: Uuid,
    speed: f64,
    before: Option<Clip>,
}

impl SetSpeedCommand {
    pub fn new(clip_id: Uuid, speed: f64) -> Self {
        Self {
            clip_id,
            speed,
            before: None,
        }
    }
}

impl Command for SetSpeedCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = snapshot(project, self.clip_id)?;
        project.set_clip_speed(self.clip_id, self.speed)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let before = saved(&self.before, "pre-speed clip")?;
        restore(project, before)
    }

    fn description(&self) -> &str {
        "Change clip speed"
    }
}

// ---------------------------------------------------------------------------
// SplitClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SplitClipCommand {
    clip_id: Uuid,
    at: TimeUs,
    before: Option<Clip>,
    right_id: Option<Uuid>,
}

impl SplitClipCommand {
    pub fn new(clip_id: Uuid, at: TimeUs) -> Self {
        Self {
            clip_id,
            at,
            before: None,
            right_id: None,
        }
    }
}

impl Command for SplitClipCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = snapshot(project, self.clip_id)?;
        let right_id = project.timeline.split_clip(self.clip_id, self.at)?;
        self.before = Some(before);
        self.right_id = Some(right_id);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let right_id = saved(&self.right_id, "right_id")?;
        let before = saved(&self.before, "original clip")?;
        ensure_media(project, &before)?;
        project.timeline.remove_clip(right_id)?;
        restore(project, before)
    }

    fn description(&self) -> &str {
        "Split clip"
    }
}
