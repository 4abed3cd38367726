//! Core types for registering 3D overlays to printed fiducial markers.
//!
//! This crate is purely geometric. It knows nothing about images, windows or
//! GPUs; it only describes what a detected marker is, how a calibrated camera
//! maps the marker frame to pixels and to an OpenGL-style clip space, and
//! which markers of a frame should be suppressed because they crowd each
//! other.

mod camera;
mod conflict;
mod logger;
mod marker;

pub use camera::{CameraError, CameraModel, ImageSize};
pub use conflict::{
    find_conflicts, ConflictResolver, ExclusionPolicy, ExclusionSet, DEFAULT_CONFLICT_THRESHOLD,
};
pub use marker::{Marker, MarkerKey};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, LogFormat};
