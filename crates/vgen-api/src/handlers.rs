//! HTTP handlers.

pub mod download;
pub mod health;
pub mod process;

pub use download::download;
pub use health::{health, ready};
pub use process::process_video_stream;
