//! Immediate-mode rendering context abstraction.

use std::ops::{Deref, DerefMut};

use image::RgbImage;
use marker_overlay_core::ImageSize;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Which matrix stack subsequent matrix calls affect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixMode {
    ModelView,
    Projection,
}

/// Toggleable pipeline capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DepthTest,
    Texture2D,
}

/// How a vertex list is assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// Independent segments, two vertices each.
    Lines,
    /// Closed polyline through all vertices.
    LineLoop,
    /// Quads, four vertices each.
    Quads,
}

/// RGB color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Gray level, clamped to `0.0..=1.0`.
    pub fn gray(level: f32) -> Self {
        let v = level.clamp(0.0, 1.0);
        Self::new(v, v, v)
    }

    pub fn to_rgb8(self) -> image::Rgb<u8> {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        image::Rgb([q(self.r), q(self.g), q(self.b)])
    }
}

/// One immediate-mode vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Option<Vector3<f32>>,
}

impl Vertex {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    pub fn with_normal(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position,
            normal: Some(normal),
        }
    }
}

/// Immediate-mode rendering pipeline, modeled on fixed-function OpenGL.
///
/// Implementations own whatever global state their backend has; callers
/// hold the context exclusively for the duration of a frame.
pub trait RenderContext {
    fn matrix_mode(&mut self, mode: MatrixMode);
    fn load_identity(&mut self);
    /// Replace the top of the current stack.
    fn load_matrix(&mut self, m: &Matrix4<f64>);
    /// Right-multiply the top of the current stack by an orthographic projection.
    fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64);
    /// Right-multiply the top of the current stack by a translation.
    fn translate(&mut self, x: f64, y: f64, z: f64);
    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);

    fn viewport(&mut self, x: i32, y: i32, size: ImageSize);
    fn enable(&mut self, cap: Capability);
    fn disable(&mut self, cap: Capability);

    /// Scale applied to pixel blits; a negative `y` flips rows.
    fn pixel_zoom(&mut self, x: f32, y: f32);
    /// Blit origin, transformed by the current matrices.
    fn raster_pos(&mut self, x: f64, y: f64, z: f64);
    /// Blit `image` (rows top-down in memory) at the raster position.
    fn draw_pixels(&mut self, image: &RgbImage);

    /// Current color for subsequent primitives.
    fn color(&mut self, color: Color);
    fn draw(&mut self, primitive: Primitive, vertices: &[Vertex]);
}

/// Guard returned by [`push_matrix_scope`]; pops the matrix on drop.
pub struct MatrixScope<'a, C: RenderContext + ?Sized> {
    ctx: &'a mut C,
}

/// Push the current matrix and return a guard that pops it when dropped.
pub fn push_matrix_scope<C: RenderContext + ?Sized>(ctx: &mut C) -> MatrixScope<'_, C> {
    ctx.push_matrix();
    MatrixScope { ctx }
}

impl<C: RenderContext + ?Sized> Deref for MatrixScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctx
    }
}

impl<C: RenderContext + ?Sized> DerefMut for MatrixScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: RenderContext + ?Sized> Drop for MatrixScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.pop_matrix();
    }
}

/// `glOrtho` matrix.
pub fn ortho_matrix(
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
    near: f64,
    far: f64,
) -> Matrix4<f64> {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;
    Matrix4::new(
        2.0 / rl, 0.0, 0.0, -(right + left) / rl, //
        0.0, 2.0 / tb, 0.0, -(top + bottom) / tb, //
        0.0, 0.0, -2.0 / fn_, -(far + near) / fn_, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// CPU-side modelview and projection stacks.
///
/// Backends without a native matrix stack use this to track the state the
/// fixed-function pipeline would hold.
#[derive(Clone, Debug)]
pub struct MatrixStacks {
    mode: MatrixMode,
    modelview: Vec<Matrix4<f64>>,
    projection: Vec<Matrix4<f64>>,
}

impl Default for MatrixStacks {
    fn default() -> Self {
        Self {
            mode: MatrixMode::ModelView,
            modelview: vec![Matrix4::identity()],
            projection: vec![Matrix4::identity()],
        }
    }
}

impl MatrixStacks {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
    }

    fn stack(&self, mode: MatrixMode) -> &Vec<Matrix4<f64>> {
        match mode {
            MatrixMode::ModelView => &self.modelview,
            MatrixMode::Projection => &self.projection,
        }
    }

    fn stack_mut(&mut self) -> &mut Vec<Matrix4<f64>> {
        match self.mode {
            MatrixMode::ModelView => &mut self.modelview,
            MatrixMode::Projection => &mut self.projection,
        }
    }

    fn top_mut(&mut self) -> &mut Matrix4<f64> {
        let stack = self.stack_mut();
        // Stacks are created with one entry and `pop` never removes the last.
        let last = stack.len() - 1;
        &mut stack[last]
    }

    pub fn load_identity(&mut self) {
        *self.top_mut() = Matrix4::identity();
    }

    pub fn load(&mut self, m: &Matrix4<f64>) {
        *self.top_mut() = *m;
    }

    /// Right-multiply the current top by `m`.
    pub fn multiply(&mut self, m: &Matrix4<f64>) {
        let top = self.top_mut();
        *top *= m;
    }

    pub fn push(&mut self) {
        let top = *self.top_mut();
        self.stack_mut().push(top);
    }

    /// Pop the current stack. Returns `false` (and leaves the stack intact)
    /// on underflow.
    pub fn pop(&mut self) -> bool {
        let mode = self.mode;
        let stack = self.stack_mut();
        if stack.len() <= 1 {
            log::warn!("{mode:?} matrix stack underflow");
            return false;
        }
        stack.pop();
        true
    }

    /// Number of entries on the stack of `mode` (at least 1).
    pub fn depth(&self, mode: MatrixMode) -> usize {
        self.stack(mode).len()
    }

    pub fn modelview(&self) -> Matrix4<f64> {
        self.modelview[self.modelview.len() - 1]
    }

    pub fn projection(&self) -> Matrix4<f64> {
        self.projection[self.projection.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn ortho_maps_viewport_corners_to_ndc() {
        let m = ortho_matrix(0.0, 640.0, 0.0, 480.0, -1.0, 1.0);
        let lo = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let hi = m * Vector4::new(640.0, 480.0, 0.0, 1.0);
        assert_relative_eq!(lo, Vector4::new(-1.0, -1.0, 0.0, 1.0));
        assert_relative_eq!(hi, Vector4::new(1.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn push_pop_restores_top_per_mode() {
        let mut stacks = MatrixStacks::new();
        stacks.set_mode(MatrixMode::Projection);
        stacks.load(&ortho_matrix(0.0, 2.0, 0.0, 2.0, -1.0, 1.0));
        let projection = stacks.projection();

        stacks.set_mode(MatrixMode::ModelView);
        stacks.push();
        stacks.multiply(&Matrix4::new_translation(&nalgebra::Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(stacks.depth(MatrixMode::ModelView), 2);
        assert!(stacks.pop());
        assert_eq!(stacks.modelview(), Matrix4::identity());
        assert_eq!(stacks.projection(), projection);
    }

    #[test]
    fn pop_on_a_single_entry_stack_is_refused() {
        let mut stacks = MatrixStacks::new();
        assert!(!stacks.pop());
        assert_eq!(stacks.depth(MatrixMode::ModelView), 1);
    }

    #[test]
    fn gray_clamps_and_quantizes() {
        assert_eq!(Color::gray(2.5), Color::WHITE);
        assert_eq!(Color::gray(-1.0).to_rgb8(), image::Rgb([0, 0, 0]));
        assert_eq!(Color::gray(0.5).to_rgb8(), image::Rgb([128, 128, 128]));
    }
}
