//! Media resolution: turns files on disk into `MediaReference`s by probing
//! them with `ffprobe`.

pub mod error;
pub mod probe;
