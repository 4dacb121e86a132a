//! Playback and synchronization for the cutline timeline engine: the
//! authoritative clock, the tick source, renderer adapters and the
//! controller that serializes edits, ticks, seeks and service results.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod mpv;
pub mod renderer;
pub mod services;
pub mod ticker;

pub use clock::{ClockSnapshot, ClockState, PlaybackClock, TickOutcome};
pub use config::PlaybackConfig;
pub use controller::{Controller, Flow};
pub use events::{EditRequest, EngineEvent, EventReceiver, EventSender, Transport};
pub use renderer::{Renderer, TracingRenderer};
pub use services::{spawn_service, ServiceResult, SubtitleCue};
