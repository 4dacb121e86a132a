//! Timeline engine core: clips placed on tracks, first-fit layer resolution,
//! derived duration, undo/redo and project persistence.

pub mod editing;
pub mod error;
pub mod history;
pub mod layers;
pub mod project;
pub mod types;
