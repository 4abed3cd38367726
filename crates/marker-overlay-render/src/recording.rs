use std::collections::HashSet;

use image::RgbImage;
use marker_overlay_core::ImageSize;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::context::{
    ortho_matrix, Capability, Color, MatrixMode, MatrixStacks, Primitive, RenderContext, Vertex,
};

/// One recorded [`RenderContext`] call.
///
/// Matrices are stored column-major, the layout `glLoadMatrixd` expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    MatrixMode {
        mode: MatrixMode,
    },
    LoadIdentity,
    LoadMatrix {
        m: [f64; 16],
    },
    Ortho {
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    },
    Translate {
        x: f64,
        y: f64,
        z: f64,
    },
    PushMatrix,
    PopMatrix,
    Viewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Enable {
        cap: Capability,
    },
    Disable {
        cap: Capability,
    },
    PixelZoom {
        x: f32,
        y: f32,
    },
    RasterPos {
        x: f64,
        y: f64,
        z: f64,
    },
    DrawPixels {
        width: u32,
        height: u32,
    },
    Color {
        color: Color,
    },
    Draw {
        primitive: Primitive,
        vertices: Vec<Vertex>,
    },
}

impl DrawCommand {
    /// True for calls that put pixels on screen.
    pub fn is_draw_call(&self) -> bool {
        matches!(self, Self::DrawPixels { .. } | Self::Draw { .. })
    }
}

/// Context that records every call and tracks the resulting matrix and
/// capability state.
#[derive(Clone, Debug, Default)]
pub struct RecordingContext {
    commands: Vec<DrawCommand>,
    stacks: MatrixStacks,
    enabled: HashSet<Capability>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }

    /// Number of recorded calls that draw something.
    pub fn draw_calls(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw_call()).count()
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled.contains(&cap)
    }

    pub fn stacks(&self) -> &MatrixStacks {
        &self.stacks
    }

    /// Forget the recorded calls, keeping the tracked state.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl RenderContext for RecordingContext {
    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.stacks.set_mode(mode);
        self.commands.push(DrawCommand::MatrixMode { mode });
    }

    fn load_identity(&mut self) {
        self.stacks.load_identity();
        self.commands.push(DrawCommand::LoadIdentity);
    }

    fn load_matrix(&mut self, m: &Matrix4<f64>) {
        self.stacks.load(m);
        let mut flat = [0.0; 16];
        flat.copy_from_slice(m.as_slice());
        self.commands.push(DrawCommand::LoadMatrix { m: flat });
    }

    fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.stacks
            .multiply(&ortho_matrix(left, right, bottom, top, near, far));
        self.commands.push(DrawCommand::Ortho {
            left,
            right,
            bottom,
            top,
            near,
            far,
        });
    }

    fn translate(&mut self, x: f64, y: f64, z: f64) {
        self.stacks
            .multiply(&Matrix4::new_translation(&nalgebra::Vector3::new(x, y, z)));
        self.commands.push(DrawCommand::Translate { x, y, z });
    }

    fn push_matrix(&mut self) {
        self.stacks.push();
        self.commands.push(DrawCommand::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        self.stacks.pop();
        self.commands.push(DrawCommand::PopMatrix);
    }

    fn viewport(&mut self, x: i32, y: i32, size: ImageSize) {
        self.commands.push(DrawCommand::Viewport {
            x,
            y,
            width: size.width,
            height: size.height,
        });
    }

    fn enable(&mut self, cap: Capability) {
        self.enabled.insert(cap);
        self.commands.push(DrawCommand::Enable { cap });
    }

    fn disable(&mut self, cap: Capability) {
        self.enabled.remove(&cap);
        self.commands.push(DrawCommand::Disable { cap });
    }

    fn pixel_zoom(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::PixelZoom { x, y });
    }

    fn raster_pos(&mut self, x: f64, y: f64, z: f64) {
        self.commands.push(DrawCommand::RasterPos { x, y, z });
    }

    fn draw_pixels(&mut self, image: &RgbImage) {
        self.commands.push(DrawCommand::DrawPixels {
            width: image.width(),
            height: image.height(),
        });
    }

    fn color(&mut self, color: Color) {
        self.commands.push(DrawCommand::Color { color });
    }

    fn draw(&mut self, primitive: Primitive, vertices: &[Vertex]) {
        self.commands.push(DrawCommand::Draw {
            primitive,
            vertices: vertices.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::push_matrix_scope;

    #[test]
    fn scope_guard_pops_on_drop() {
        let mut ctx = RecordingContext::new();
        {
            let mut scope = push_matrix_scope(&mut ctx);
            scope.translate(1.0, 0.0, 0.0);
            assert_eq!(scope.stacks().depth(MatrixMode::ModelView), 2);
        }
        assert_eq!(ctx.stacks().depth(MatrixMode::ModelView), 1);
        assert_eq!(ctx.stacks().modelview(), Matrix4::identity());
        assert_eq!(
            ctx.commands().last(),
            Some(&DrawCommand::PopMatrix),
            "guard must emit the pop"
        );
    }

    #[test]
    fn capabilities_toggle() {
        let mut ctx = RecordingContext::new();
        ctx.enable(Capability::DepthTest);
        assert!(ctx.is_enabled(Capability::DepthTest));
        ctx.disable(Capability::DepthTest);
        ctx.disable(Capability::DepthTest);
        assert!(!ctx.is_enabled(Capability::DepthTest));
        assert_eq!(ctx.draw_calls(), 0);
    }

    #[test]
    fn commands_serialize_with_an_op_tag() {
        let cmd = DrawCommand::Enable {
            cap: Capability::DepthTest,
        };
        let json = serde_json::to_string(&cmd).expect("json");
        assert_eq!(json, r#"{"op":"enable","cap":"depth_test"}"#);
    }
}
