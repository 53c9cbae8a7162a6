//! Shared data models for the VGen render service.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs and their request defaults
//! - Derived placement geometry
//! - Ephemeral asset roles
//! - Push-channel event schemas
//! - Encoder output profile

pub mod asset;
pub mod events;
pub mod geometry;
pub mod job;
pub mod profile;

// Re-export common types
pub use asset::AssetRole;
pub use events::{JobEvent, JobEventType};
pub use geometry::{GeometrySpec, LabelBox, PixelPoint};
pub use job::{parse_fraction, JobId, RenderJob, DEFAULT_ANCHOR_X, DEFAULT_ANCHOR_Y, DEFAULT_LABEL};
pub use profile::OutputProfile;
