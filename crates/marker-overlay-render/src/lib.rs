//! Rendering of marker overlays on top of the camera image.
//!
//! The renderer talks to an immediate-mode, OpenGL-1.x style
//! [`RenderContext`]: matrix stacks, capability toggles, a pixel blit for the
//! background and line/quad primitives for the 3D overlays. Two backends
//! ship with the crate:
//! - [`RecordingContext`] records every call, for inspection and tests,
//! - [`SoftwareContext`] composites the frame into an `image::RgbImage`.
//!
//! A windowing application with a real GL context implements the trait over
//! its own bindings.

pub mod annotate;
mod context;
mod primitives;
mod raster;
mod recording;
mod scene;
mod software;

pub use context::{
    ortho_matrix, push_matrix_scope, Capability, Color, MatrixMode, MatrixScope, MatrixStacks,
    Primitive, RenderContext, Vertex,
};
pub use primitives::{axis_gizmo, draw_axis, draw_wire_cube, AxisSegment, CubeFace, WireCube};
pub use recording::{DrawCommand, RecordingContext};
pub use scene::{RenderStats, SceneParams, SceneRenderer};
pub use software::SoftwareContext;
