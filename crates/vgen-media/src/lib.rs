#![deny(unreachable_patterns)]
//! Media composition for the VGen render service.
//!
//! This crate provides:
//! - Deterministic layout of the avatar and label over the base video
//! - Raster asset generation (circular avatar, label box, label text)
//! - Overlay graph construction and `-filter_complex` rendering
//! - Type-safe FFmpeg command building and progress parsing from `-progress pipe:2`
//! - A render executor with a bounded text-less fallback

pub mod assets;
pub mod command;
pub mod error;
pub mod fallback;
pub mod geometry;
pub mod graph;
pub mod probe;
pub mod progress;
pub mod render;

pub use assets::{AssetFile, AssetGenerator, AssetSet, LabelStyle};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fallback::{render_with_fallback, RenderAttempt, RenderOutcome};
pub use geometry::{compute_geometry, LayoutConstants, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use graph::{CompositionGraph, OverlayStep, StreamRef};
pub use probe::{probe_base_video, BaseVideoInfo};
pub use progress::{FfmpegProgress, ProgressMapper, DEFAULT_ASSUMED_DURATION};
pub use render::{Encoder, EncoderInvocation, FfmpegEncoder, RenderExecutor};
