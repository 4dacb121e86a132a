//! Probe media files and register them with a project.

use std::path::PathBuf;

use anyhow::Context;
use cutline_core::types::{Project, TimeUs};
use cutline_media::probe::probe_media_async;

pub async fn run(path: PathBuf, media: Vec<PathBuf>, place: bool, at: f64) -> anyhow::Result<()> {
    let mut project = Project::load_from_file(&path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;

    let mut cursor = TimeUs::from_seconds(at);
    for file in media {
        let reference = probe_media_async(file.clone())
            .await
            .with_context(|| format!("Failed to probe {}", file.display()))?;
        println!(
            "Imported {} ({:?}, {})",
            reference.name, reference.kind, reference.native_duration
        );
        let media_id = project.import_media(reference);

        if place {
            let clip_id = project.place_media(media_id, None, cursor)?;
            if let Some(clip) = project.timeline.clip(clip_id) {
                println!("  placed at {} on layer {}", clip.start_time, clip.layer_index);
                cursor = clip.end_time();
            }
        }
    }

    project
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
