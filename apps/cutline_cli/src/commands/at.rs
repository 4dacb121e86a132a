//! List the clips visible at a timeline position, bottom layer first.

use std::path::PathBuf;

use anyhow::Context;
use cutline_core::types::{Project, TimeUs};

pub fn run(path: PathBuf, seconds: f64) -> anyhow::Result<()> {
    let project = Project::load_from_file(&path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;

    let time = TimeUs::from_seconds(seconds);
    let clips = project.timeline.clips_at(time);
    if clips.is_empty() {
        println!("Nothing visible at {time}");
        return Ok(());
    }

    println!("At {time}:");
    for clip in clips {
        let track = project
            .timeline
            .track(clip.track_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!(
            "  layer {}  {}  {}  source {}",
            clip.layer_index,
            track,
            clip.id,
            clip.source_time_at(time)
        );
    }
    Ok(())
}
