//! Composite 3D overlays registered to printed fiducial markers over camera
//! frames.
//!
//! This crate ties the workspace together:
//! - re-exports of the core types (`marker_overlay::core`) and the renderer
//!   (`marker_overlay::render`),
//! - a JSON [`OverlayConfig`],
//! - the [`MarkerDetector`] seam through which an external vision library
//!   plugs in,
//! - the [`MarkerOverlay`] session that runs one frame at a time.
//!
//! ## Quickstart
//!
//! ```no_run
//! use marker_overlay::{MarkerOverlay, OverlayConfig, ReplayDetector, SoftwareContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OverlayConfig::load_json("overlay.json")?;
//! let detector = ReplayDetector::load_json("detections.json")?;
//! let mut overlay = MarkerOverlay::new(config, detector)?;
//!
//! let frame = image::open("frame.png")?.to_rgb8();
//! overlay.do_work(&frame);
//! overlay.process_frame(&frame);
//!
//! let mut ctx = SoftwareContext::new(overlay.window_size());
//! let stats = overlay.draw_scene(&mut ctx);
//! println!("{} overlays drawn", stats.drawn);
//! ctx.image().save("composite.png")?;
//! # Ok(())
//! # }
//! ```

pub use marker_overlay_core as core;
pub use marker_overlay_render as render;

pub use marker_overlay_core::{CameraModel, ConflictResolver, ExclusionPolicy, ImageSize, Marker};
pub use marker_overlay_render::{RecordingContext, RenderContext, RenderStats, SoftwareContext};

mod config;
mod detector;
mod error;
pub mod frame;
mod pipeline;

pub use config::{InputOrder, OverlayConfig};
pub use detector::{MarkerDetector, ReplayDetector};
pub use error::OverlayError;
pub use pipeline::MarkerOverlay;
