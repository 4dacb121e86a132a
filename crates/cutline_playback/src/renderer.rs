use cutline_core::types::{Clip, ClipSource, MediaLibrary, TimeUs};

/// Output side of playback. The controller calls `present` with the clips
/// visible at `time` (ascending layer order) after every tick, seek and edit.
/// Renderers that play media themselves report their position back through
/// `EngineEvent::RendererPosition`.
pub trait Renderer: Send {
    fn present(&mut self, time: TimeUs, clips: &[&Clip], media: &MediaLibrary);
    fn seek(&mut self, time: TimeUs);
    fn set_playing(&mut self, playing: bool);
}

/// Headless renderer that logs what would be composited.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    presented: u64,
}

impl TracingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }
}

impl Renderer for TracingRenderer {
    fn present(&mut self, time: TimeUs, clips: &[&Clip], media: &MediaLibrary) {
        self.presented += 1;
        for clip in clips {
            let source = match &clip.source {
                ClipSource::Media(id) => media
                    .get(*id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| format!("<missing {}>", id)),
                ClipSource::Text(text) => format!("text {:?}", text),
            };
            tracing::trace!(
                %time,
                clip_id = %clip.id,
                layer = clip.layer_index,
                source_time = %clip.source_time_at(time),
                %source,
                "present"
            );
        }
        if clips.is_empty() {
            tracing::trace!(%time, "present (empty)");
        }
    }

    fn seek(&mut self, time: TimeUs) {
        tracing::debug!(%time, "renderer seek");
    }

    fn set_playing(&mut self, playing: bool) {
        tracing::debug!(playing, "renderer transport");
    }
}
