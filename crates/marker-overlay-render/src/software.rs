//! CPU compositor implementing [`RenderContext`].
//!
//! Good enough to produce a reviewable composite of a frame without a GPU:
//! the background blit honors the pixel zoom, and primitives are pushed
//! through projection x modelview and the viewport transform, then drawn as
//! 1-pixel lines. Quads are outlined (wireframe). There is no depth buffer,
//! so the depth-test capability is tracked but has no visual effect.

use image::{Rgb, RgbImage};
use marker_overlay_core::ImageSize;
use nalgebra::{Matrix4, Point2, Vector4};

use crate::context::{
    ortho_matrix, Capability, Color, MatrixMode, MatrixStacks, Primitive, RenderContext, Vertex,
};
use crate::raster;

pub struct SoftwareContext {
    target: RgbImage,
    stacks: MatrixStacks,
    viewport: (i32, i32, ImageSize),
    zoom: (f32, f32),
    // Window coordinates (origin bottom-left), `None` when clipped.
    raster: Option<Point2<f64>>,
    color: Rgb<u8>,
    depth_test: bool,
    texture_2d: bool,
}

impl SoftwareContext {
    /// Black framebuffer of `size` with a matching viewport.
    pub fn new(size: ImageSize) -> Self {
        Self {
            target: RgbImage::new(size.width, size.height),
            stacks: MatrixStacks::new(),
            viewport: (0, 0, size),
            zoom: (1.0, 1.0),
            raster: Some(Point2::origin()),
            color: Color::WHITE.to_rgb8(),
            depth_test: false,
            texture_2d: false,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.target
    }

    pub fn into_image(self) -> RgbImage {
        self.target
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        match cap {
            Capability::DepthTest => self.depth_test,
            Capability::Texture2D => self.texture_2d,
        }
    }

    fn mvp(&self) -> Matrix4<f64> {
        self.stacks.projection() * self.stacks.modelview()
    }

    /// Object coordinates to window coordinates (origin bottom-left).
    /// `None` for points behind the eye.
    fn to_window(&self, mvp: &Matrix4<f64>, x: f64, y: f64, z: f64) -> Option<Point2<f64>> {
        let clip = mvp * Vector4::new(x, y, z, 1.0);
        if clip.w <= f64::EPSILON {
            return None;
        }
        let (vx, vy, size) = self.viewport;
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        Some(Point2::new(
            f64::from(vx) + (ndc_x + 1.0) * 0.5 * f64::from(size.width),
            f64::from(vy) + (ndc_y + 1.0) * 0.5 * f64::from(size.height),
        ))
    }

    /// Window coordinates to framebuffer pixel coordinates (y down).
    fn to_pixel(&self, window: Point2<f64>) -> Point2<f64> {
        Point2::new(window.x, f64::from(self.target.height()) - window.y)
    }

    fn segment(&mut self, mvp: &Matrix4<f64>, a: &Vertex, b: &Vertex) {
        let pa = a.position.cast::<f64>();
        let pb = b.position.cast::<f64>();
        let (Some(wa), Some(wb)) = (
            self.to_window(mvp, pa.x, pa.y, pa.z),
            self.to_window(mvp, pb.x, pb.y, pb.z),
        ) else {
            return;
        };
        let (from, to) = (self.to_pixel(wa), self.to_pixel(wb));
        raster::draw_segment(&mut self.target, from, to, self.color);
    }
}

impl RenderContext for SoftwareContext {
    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.stacks.set_mode(mode);
    }

    fn load_identity(&mut self) {
        self.stacks.load_identity();
    }

    fn load_matrix(&mut self, m: &Matrix4<f64>) {
        self.stacks.load(m);
    }

    fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.stacks
            .multiply(&ortho_matrix(left, right, bottom, top, near, far));
    }

    fn translate(&mut self, x: f64, y: f64, z: f64) {
        self.stacks
            .multiply(&Matrix4::new_translation(&nalgebra::Vector3::new(x, y, z)));
    }

    fn push_matrix(&mut self) {
        self.stacks.push();
    }

    fn pop_matrix(&mut self) {
        self.stacks.pop();
    }

    fn viewport(&mut self, x: i32, y: i32, size: ImageSize) {
        self.viewport = (x, y, size);
    }

    fn enable(&mut self, cap: Capability) {
        match cap {
            Capability::DepthTest => self.depth_test = true,
            Capability::Texture2D => self.texture_2d = true,
        }
    }

    fn disable(&mut self, cap: Capability) {
        match cap {
            Capability::DepthTest => self.depth_test = false,
            Capability::Texture2D => self.texture_2d = false,
        }
    }

    fn pixel_zoom(&mut self, x: f32, y: f32) {
        self.zoom = (x, y);
    }

    fn raster_pos(&mut self, x: f64, y: f64, z: f64) {
        let mvp = self.mvp();
        self.raster = self.to_window(&mvp, x, y, z);
    }

    fn draw_pixels(&mut self, image: &RgbImage) {
        let Some(origin) = self.raster else {
            return;
        };
        let (zx, zy) = (f64::from(self.zoom.0), f64::from(self.zoom.1));
        if zx == 0.0 || zy == 0.0 {
            return;
        }
        let fb_h = i64::from(self.target.height());

        for (col, row, px) in image.enumerate_pixels() {
            // Memory row 0 is the first row unpacked; it goes to the raster
            // position and later rows advance by the (signed) zoom.
            let wx0 = origin.x + f64::from(col) * zx;
            let wx1 = wx0 + zx;
            let wy0 = origin.y + f64::from(row) * zy;
            let wy1 = wy0 + zy;
            let (x_lo, x_hi) = (wx0.min(wx1).round() as i64, wx0.max(wx1).round() as i64);
            let (y_lo, y_hi) = (wy0.min(wy1).round() as i64, wy0.max(wy1).round() as i64);
            for wy in y_lo..y_hi {
                let fy = fb_h - 1 - wy;
                let Ok(fy) = u32::try_from(fy) else {
                    continue;
                };
                for wx in x_lo..x_hi {
                    let Ok(wx) = u32::try_from(wx) else {
                        continue;
                    };
                    if let Some(dst) = self.target.get_pixel_mut_checked(wx, fy) {
                        *dst = *px;
                    }
                }
            }
        }
    }

    fn color(&mut self, color: Color) {
        self.color = color.to_rgb8();
    }

    fn draw(&mut self, primitive: Primitive, vertices: &[Vertex]) {
        let mvp = self.mvp();
        match primitive {
            Primitive::Lines => {
                for pair in vertices.chunks_exact(2) {
                    self.segment(&mvp, &pair[0], &pair[1]);
                }
            }
            Primitive::LineLoop => {
                for i in 0..vertices.len() {
                    let next = (i + 1) % vertices.len();
                    if next != i {
                        self.segment(&mvp, &vertices[i], &vertices[next]);
                    }
                }
            }
            Primitive::Quads => {
                for quad in vertices.chunks_exact(4) {
                    for i in 0..4 {
                        self.segment(&mvp, &quad[i], &quad[(i + 1) % 4]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn flipped_blit_keeps_image_rows_top_down() {
        let size = ImageSize::new(8, 6);
        let mut ctx = SoftwareContext::new(size);
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.load_identity();
        ctx.ortho(0.0, 8.0, 0.0, 6.0, -1.0, 1.0);
        ctx.pixel_zoom(1.0, -1.0);
        ctx.raster_pos(0.0, 6.0, -1.0);

        let bg = gradient(8, 6);
        ctx.draw_pixels(&bg);
        assert_eq!(ctx.image(), &bg);
    }

    #[test]
    fn unflipped_blit_turns_the_image_upside_down() {
        let size = ImageSize::new(4, 4);
        let mut ctx = SoftwareContext::new(size);
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.ortho(0.0, 4.0, 0.0, 4.0, -1.0, 1.0);
        ctx.raster_pos(0.0, 0.0, 0.0);

        let bg = gradient(4, 4);
        ctx.draw_pixels(&bg);
        assert_eq!(ctx.image().get_pixel(1, 3), bg.get_pixel(1, 0));
        assert_eq!(ctx.image().get_pixel(1, 0), bg.get_pixel(1, 3));
    }

    #[test]
    fn lines_go_through_the_viewport_transform() {
        let size = ImageSize::new(11, 11);
        let mut ctx = SoftwareContext::new(size);
        ctx.matrix_mode(MatrixMode::Projection);
        ctx.ortho(0.0, 11.0, 0.0, 11.0, -1.0, 1.0);
        ctx.color(Color::RED);
        // Window row y = 1 is framebuffer row 10.
        ctx.draw(
            Primitive::Lines,
            &[
                Vertex::new(Point3::new(0.0, 1.0, 0.0)),
                Vertex::new(Point3::new(10.0, 1.0, 0.0)),
            ],
        );
        assert_eq!(*ctx.image().get_pixel(5, 10), Rgb([255, 0, 0]));
        assert_eq!(*ctx.image().get_pixel(5, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn points_behind_the_eye_are_dropped() {
        let size = ImageSize::new(16, 16);
        let mut ctx = SoftwareContext::new(size);
        ctx.matrix_mode(MatrixMode::Projection);
        // Perspective-like matrix: w = -z.
        let mut p = Matrix4::identity();
        p[(3, 2)] = -1.0;
        p[(3, 3)] = 0.0;
        ctx.load_matrix(&p);
        ctx.draw(
            Primitive::Lines,
            &[
                Vertex::new(Point3::new(0.0, 0.0, 1.0)),
                Vertex::new(Point3::new(0.5, 0.5, 1.0)),
            ],
        );
        assert!(ctx.image().pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
