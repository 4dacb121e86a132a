//! Show project information.

use std::path::PathBuf;

use anyhow::Context;
use cutline_core::types::{ClipSource, Project};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project = Project::load_from_file(&path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;
    let timeline = &project.timeline;

    println!("Project: {}", project.name);
    println!("  ID: {}", project.id);
    println!(
        "  Settings: {}x{} @ {}fps, {} Hz",
        project.settings.width,
        project.settings.height,
        project.settings.fps,
        project.settings.sample_rate
    );
    println!("  Duration: {}", timeline.duration());
    println!();

    println!("Media ({}):", project.media.len());
    for media in project.media.iter() {
        println!(
            "  {} {:?} {} ({})",
            media.id,
            media.kind,
            media.name,
            media.native_duration
        );
    }
    println!();

    println!("Tracks ({}):", timeline.tracks().len());
    for track in timeline.tracks() {
        let mut flags = vec![];
        if track.is_locked {
            flags.push("locked");
        }
        if track.is_muted {
            flags.push("muted");
        }
        if !track.is_visible {
            flags.push("hidden");
        }
        println!(
            "  {} [{}] {} {}",
            track.name,
            track.kind,
            track.id,
            flags.join(" ")
        );
        for clip in track.clips() {
            let source = match &clip.source {
                ClipSource::Media(id) => project
                    .media
                    .get(*id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| format!("<missing {id}>")),
                ClipSource::Text(text) => format!("\"{text}\""),
            };
            println!(
                "    {} - {}  layer {}  x{}  {}",
                clip.start_time,
                clip.end_time(),
                clip.layer_index,
                clip.speed,
                source
            );
        }
    }

    let dangling = project.dangling_clips();
    if !dangling.is_empty() {
        println!();
        println!("Warning: {} missing media reference(s)", dangling.len());
    }
    let conflicts = timeline.layer_conflicts();
    if !conflicts.is_empty() {
        println!();
        println!("Warning: {} overlapping clip pair(s) share a layer", conflicts.len());
    }

    Ok(())
}
