use crate::events::{EngineEvent, EventSender};
use cutline_core::types::{MediaReference, TimeUs};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub text: String,
    pub start: TimeUs,
    pub end: TimeUs,
}

impl SubtitleCue {
    pub fn new(text: impl Into<String>, start: TimeUs, end: TimeUs) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Output of an asynchronous collaborator (transcription, speech synthesis).
/// Both kinds become ordinary clip insertions once they reach the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResult {
    Subtitles {
        track_id: Uuid,
        cues: Vec<SubtitleCue>,
    },
    /// Audio produced by a service. Without a target track the first audio
    /// track is used.
    GeneratedAudio {
        track_id: Option<Uuid>,
        media: MediaReference,
        start: TimeUs,
    },
}

/// Run `job` on the runtime and post its result to the engine. Failures are
/// logged and dropped; the timeline is never touched from the task itself.
pub fn spawn_service<F, E>(name: &'static str, job: F, events: EventSender) -> JoinHandle<()>
where
    F: Future<Output = Result<ServiceResult, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        match job.await {
            Ok(result) => {
                tracing::debug!(service = name, "service finished");
                if events.send(EngineEvent::Service(result)).is_err() {
                    tracing::debug!(service = name, "engine gone, dropping service result");
                }
            }
            Err(err) => tracing::warn!(service = name, %err, "service failed"),
        }
    })
}
