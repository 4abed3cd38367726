//! Per-frame scene composition: background blit plus 3D marker overlays.

use std::fmt;
use std::sync::Arc;

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use marker_overlay_core::{CameraModel, ConflictResolver, ImageSize, Marker};
use serde::{Deserialize, Serialize};

use crate::annotate;
use crate::context::{push_matrix_scope, Capability, Color, MatrixMode, RenderContext};
use crate::primitives::{draw_axis, draw_wire_cube};

/// Id that maps to full white when shading cubes; larger ids saturate.
const CUBE_SHADE_ID_RANGE: f32 = 200.0;

/// Scene renderer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneParams {
    /// Edge length of the overlay cube and length of the gizmo axes, in the
    /// pose translation units.
    pub marker_size: f32,
    /// Near clip plane of the 3D projection.
    pub near: f64,
    /// Far clip plane of the 3D projection.
    pub far: f64,
    /// Outline detected markers into the background before the blit.
    pub annotate: bool,
    pub annotation_color: [u8; 3],
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            marker_size: 0.05,
            near: 0.01,
            far: 100.0,
            annotate: true,
            annotation_color: [0, 0, 255],
        }
    }
}

/// What one [`SceneRenderer::render`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// True when there was no background and nothing was drawn.
    pub skipped: bool,
    /// Markers that received a 3D overlay.
    pub drawn: usize,
    /// Markers suppressed by the conflict resolver.
    pub excluded: usize,
}

/// Composites a frame: background image first, then one axis gizmo and
/// wireframe cube per retained marker.
#[derive(Clone, Default)]
pub struct SceneRenderer {
    params: SceneParams,
    label_font: Option<Arc<FontVec>>,
}

impl fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("params", &self.params)
            .field("label_font", &self.label_font.is_some())
            .finish()
    }
}

impl SceneRenderer {
    pub fn new(params: SceneParams) -> Self {
        Self {
            params,
            label_font: None,
        }
    }

    /// Label annotated markers with their id using `font`.
    pub fn with_label_font(mut self, font: Arc<FontVec>) -> Self {
        self.label_font = Some(font);
        self
    }

    #[inline]
    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    #[inline]
    pub fn has_label_font(&self) -> bool {
        self.label_font.is_some()
    }

    /// Gray level used for the cube of marker `id`.
    pub fn cube_color(id: i32) -> Color {
        Color::gray(id as f32 / CUBE_SHADE_ID_RANGE)
    }

    /// Render one frame into `ctx`.
    ///
    /// `background` is the resized camera image; when annotation is enabled
    /// the marker outlines are drawn into it before it is blitted. An empty
    /// background renders nothing. The conflict resolver runs exactly once,
    /// before any marker is drawn.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip_all,
            fields(
                width = background.width(),
                height = background.height(),
                markers = markers.len()
            )
        )
    )]
    pub fn render<C: RenderContext + ?Sized>(
        &self,
        ctx: &mut C,
        background: &mut RgbImage,
        viewport: ImageSize,
        camera: &CameraModel,
        markers: &[Marker],
        resolver: &mut ConflictResolver,
    ) -> RenderStats {
        let image_size = ImageSize::new(background.width(), background.height());
        if image_size.is_empty() {
            return RenderStats {
                skipped: true,
                ..RenderStats::default()
            };
        }
        let (w, h) = (f64::from(viewport.width), f64::from(viewport.height));

        // 2D phase: orthographic projection over the viewport, rows flipped
        // by the pixel zoom so the top-down image lands upright.
        ctx.matrix_mode(MatrixMode::ModelView);
        ctx.load_identity();
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_identity();
        ctx.ortho(0.0, w, 0.0, h, -1.0, 1.0);
        ctx.viewport(0, 0, viewport);
        ctx.disable(Capability::Texture2D);
        ctx.pixel_zoom(1.0, -1.0);
        ctx.raster_pos(0.0, h, -1.0);

        if self.params.annotate {
            annotate::draw_marker_outlines(
                background,
                markers,
                Rgb(self.params.annotation_color),
                self.label_font.as_deref(),
            );
        }
        ctx.disable(Capability::DepthTest);
        ctx.draw_pixels(background);

        // 3D phase.
        ctx.enable(Capability::DepthTest);
        let projection =
            camera.gl_projection_matrix(image_size, viewport, self.params.near, self.params.far);
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_identity();
        ctx.load_matrix(&projection);

        let excluded = resolver.resolve(markers);
        let size = self.params.marker_size;
        let mut drawn = 0;
        for marker in markers {
            if !excluded.contains(marker) {
                // Re-enabled per marker since the previous one left it off.
                ctx.enable(Capability::DepthTest);
                ctx.matrix_mode(MatrixMode::ModelView);
                ctx.load_identity();
                ctx.load_matrix(&marker.gl_modelview_matrix());
                draw_axis(ctx, size);
                // Sit the cube on the marker plane instead of through it.
                ctx.translate(0.0, 0.0, f64::from(size) / 2.0);
                {
                    let mut scope = push_matrix_scope(ctx);
                    scope.color(Self::cube_color(marker.id));
                    draw_wire_cube(&mut *scope, size);
                }
                drawn += 1;
            }
            ctx.disable(Capability::DepthTest);
        }
        // Leave depth testing off whatever the marker count was.
        ctx.disable(Capability::DepthTest);

        log::debug!(
            "scene: {} marker(s), {} drawn, {} excluded",
            markers.len(),
            drawn,
            excluded.len()
        );
        RenderStats {
            skipped: false,
            drawn,
            excluded: excluded.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Primitive;
    use crate::recording::{DrawCommand, RecordingContext};
    use marker_overlay_core::ExclusionPolicy;
    use nalgebra::{Point2, Vector3};

    fn camera() -> CameraModel {
        CameraModel::new(ImageSize::new(64, 48), 60.0, 60.0, 32.0, 24.0).expect("camera")
    }

    fn marker(id: i32, x: f32, y: f32) -> Marker {
        Marker::square(id, Point2::new(x, y), 10.0)
            .with_pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0))
    }

    #[test]
    fn empty_background_draws_nothing() {
        let mut ctx = RecordingContext::new();
        let mut bg = RgbImage::new(0, 0);
        let mut resolver = ConflictResolver::default();
        let stats = SceneRenderer::default().render(
            &mut ctx,
            &mut bg,
            ImageSize::new(64, 48),
            &camera(),
            &[marker(1, 10.0, 10.0)],
            &mut resolver,
        );
        assert!(stats.skipped);
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn no_markers_blits_background_only() {
        let mut ctx = RecordingContext::new();
        let mut bg = RgbImage::new(64, 48);
        let mut resolver = ConflictResolver::default();
        let stats = SceneRenderer::default().render(
            &mut ctx,
            &mut bg,
            ImageSize::new(64, 48),
            &camera(),
            &[],
            &mut resolver,
        );
        assert_eq!(stats.drawn, 0);
        assert_eq!(ctx.draw_calls(), 1);
        assert!(ctx.commands().contains(&DrawCommand::DrawPixels {
            width: 64,
            height: 48
        }));
        assert!(ctx.commands().contains(&DrawCommand::PixelZoom { x: 1.0, y: -1.0 }));
        assert!(!ctx.is_enabled(Capability::DepthTest));
    }

    #[test]
    fn excluded_markers_get_no_overlay() {
        let mut ctx = RecordingContext::new();
        let mut bg = RgbImage::new(640, 480);
        let markers = [marker(1, 0.0, 0.0), marker(2, 50.0, 0.0), marker(3, 500.0, 0.0)];
        let mut resolver = ConflictResolver::new(130.0, ExclusionPolicy::ResetPerFrame);
        let params = SceneParams {
            annotate: false,
            ..SceneParams::default()
        };
        let stats = SceneRenderer::new(params).render(
            &mut ctx,
            &mut bg,
            ImageSize::new(640, 480),
            &camera(),
            &markers,
            &mut resolver,
        );
        assert_eq!(stats.drawn, 2);
        assert_eq!(stats.excluded, 1);
        // Blit + 2 x (3 axes + 6 faces).
        assert_eq!(ctx.draw_calls(), 1 + 2 * 9);
        assert!(!ctx.is_enabled(Capability::DepthTest));
    }

    #[test]
    fn per_marker_sequence_matches_the_overlay_protocol() {
        let mut ctx = RecordingContext::new();
        let mut bg = RgbImage::new(64, 48);
        let m = marker(100, 30.0, 20.0);
        let mut resolver = ConflictResolver::default();
        let renderer = SceneRenderer::default();
        renderer.render(
            &mut ctx,
            &mut bg,
            ImageSize::new(64, 48),
            &camera(),
            std::slice::from_ref(&m),
            &mut resolver,
        );

        let cmds = ctx.commands();
        let blit = cmds
            .iter()
            .position(|c| matches!(c, DrawCommand::DrawPixels { .. }))
            .expect("blit");
        let first_line = cmds
            .iter()
            .position(|c| matches!(c, DrawCommand::Draw { primitive: Primitive::Lines, .. }))
            .expect("axis");
        assert!(blit < first_line);

        let tail: Vec<&DrawCommand> = cmds[first_line..]
            .iter()
            .filter(|c| !matches!(c, DrawCommand::Draw { .. } | DrawCommand::Color { .. }))
            .collect();
        assert_eq!(
            tail,
            vec![
                &DrawCommand::Translate {
                    x: 0.0,
                    y: 0.0,
                    z: f64::from(0.05_f32) / 2.0
                },
                &DrawCommand::PushMatrix,
                &DrawCommand::PopMatrix,
                &DrawCommand::Disable {
                    cap: Capability::DepthTest
                },
                &DrawCommand::Disable {
                    cap: Capability::DepthTest
                },
            ]
        );
        assert!(cmds.contains(&DrawCommand::Color {
            color: Color::gray(0.5)
        }));
        assert_eq!(ctx.stacks().depth(MatrixMode::ModelView), 1);
    }

    #[test]
    fn depth_test_ends_off_for_any_marker_count() {
        let renderer = SceneRenderer::default();
        let lists: [&[Marker]; 3] = [
            &[],
            &[marker(1, 30.0, 20.0)],
            &[marker(1, 0.0, 0.0), marker(2, 500.0, 0.0)],
        ];
        for markers in lists {
            let mut ctx = RecordingContext::new();
            let mut bg = RgbImage::new(64, 48);
            let mut resolver = ConflictResolver::default();
            renderer.render(
                &mut ctx,
                &mut bg,
                ImageSize::new(64, 48),
                &camera(),
                markers,
                &mut resolver,
            );
            assert!(
                !ctx.is_enabled(Capability::DepthTest),
                "{} marker(s) left depth testing on",
                markers.len()
            );
            assert_eq!(
                ctx.commands().last(),
                Some(&DrawCommand::Disable {
                    cap: Capability::DepthTest
                })
            );
        }
    }

    #[test]
    fn annotations_are_part_of_the_background() {
        let mut ctx = RecordingContext::new();
        let mut bg = RgbImage::new(64, 48);
        let mut resolver = ConflictResolver::default();
        SceneRenderer::default().render(
            &mut ctx,
            &mut bg,
            ImageSize::new(64, 48),
            &camera(),
            &[marker(1, 30.0, 20.0)],
            &mut resolver,
        );
        assert_eq!(*bg.get_pixel(25, 15), Rgb([0, 0, 255]));
    }

    #[test]
    fn cube_shade_saturates_above_the_id_range() {
        assert_eq!(SceneRenderer::cube_color(0), Color::gray(0.0));
        assert_eq!(SceneRenderer::cube_color(100), Color::gray(0.5));
        assert_eq!(SceneRenderer::cube_color(450), Color::WHITE);
    }
}
