//! Create an empty project file.

use std::path::PathBuf;

use anyhow::Context;
use cutline_core::project::preset_by_name;
use cutline_core::types::Project;

pub fn run(path: PathBuf, name: String, preset: String) -> anyhow::Result<()> {
    let settings = preset_by_name(&preset)
        .with_context(|| format!("Unknown preset '{preset}'"))?;
    let project = Project::new(name, settings);
    project
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Created project '{}' ({}x{} @ {}fps)",
        project.name, project.settings.width, project.settings.height, project.settings.fps
    );
    Ok(())
}
