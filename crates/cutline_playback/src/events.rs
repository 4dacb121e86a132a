use crate::services::ServiceResult;
use cutline_core::types::{Clip, MediaReference, TimeUs};
use tokio::sync::mpsc;
use uuid::Uuid;

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Everything the controller reacts to. Events are handled one at a time,
/// in arrival order.
#[derive(Debug)]
pub enum EngineEvent {
    Edit(EditRequest),
    Transport(Transport),
    /// Posted by the tick source; ticks from a cancelled source carry a stale
    /// generation and are ignored.
    Tick { generation: u64 },
    /// Position reported back by the renderer.
    RendererPosition(TimeUs),
    Service(ServiceResult),
    Undo,
    Redo,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Play,
    Pause,
    Stop,
    Seek(TimeUs),
}

/// User edit requests. Each one maps onto a single undoable command, except
/// media library changes which are not recorded in history.
#[derive(Debug)]
pub enum EditRequest {
    AddClip { clip: Clip, track_id: Uuid },
    PlaceMedia { media_id: Uuid, track_id: Option<Uuid>, start: TimeUs },
    MoveClip { clip_id: Uuid, new_start: TimeUs, new_track_id: Uuid },
    RemoveClip { clip_id: Uuid },
    TrimClip { clip_id: Uuid, trim_start: TimeUs, trim_end: TimeUs },
    SetSpeed { clip_id: Uuid, speed: f64 },
    SplitClip { clip_id: Uuid, at: TimeUs },
    ImportMedia(MediaReference),
    RemoveMedia { media_id: Uuid },
}

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
