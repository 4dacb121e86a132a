pub mod at;
pub mod import;
pub mod info;
pub mod new;
pub mod play;
