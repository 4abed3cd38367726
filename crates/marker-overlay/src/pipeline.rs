use image::{Rgb, RgbImage};
use marker_overlay_core::{CameraModel, ConflictResolver, ExclusionSet, ImageSize, Marker};
use marker_overlay_render::{annotate, RenderContext, RenderStats, SceneRenderer};

use crate::config::OverlayConfig;
use crate::detector::MarkerDetector;
use crate::frame::{aligned_width, resize_to, to_rgb};
use crate::OverlayError;

const PROJECTED_CUBE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// One overlay session: camera, detector, render target and the state of the
/// current frame.
///
/// The session is driven synchronously, one frame at a time:
/// [`MarkerOverlay::process_frame`] prepares the background and runs the
/// detector, then [`MarkerOverlay::draw_scene`] renders it.
pub struct MarkerOverlay<D> {
    config: OverlayConfig,
    camera: CameraModel,
    detector: D,
    resolver: ConflictResolver,
    renderer: SceneRenderer,
    window: ImageSize,
    // Color-corrected copy of the last frame, at capture resolution.
    source: Option<RgbImage>,
    resized: RgbImage,
    markers: Vec<Marker>,
}

impl<D: MarkerDetector> MarkerOverlay<D> {
    /// Create a session, loading the camera from `config.camera_path`.
    pub fn new(config: OverlayConfig, detector: D) -> Result<Self, OverlayError> {
        config.validate()?;
        let camera = CameraModel::load_json(&config.camera_path)?;
        Self::with_camera(config, camera, detector)
    }

    pub fn with_camera(
        config: OverlayConfig,
        camera: CameraModel,
        detector: D,
    ) -> Result<Self, OverlayError> {
        config.validate()?;
        let mut overlay = Self {
            resolver: config.build_resolver(),
            renderer: config.build_renderer()?,
            camera,
            detector,
            window: ImageSize::default(),
            source: None,
            resized: RgbImage::new(0, 0),
            markers: Vec::new(),
            config,
        };
        if let Some(size) = overlay.config.window_size() {
            overlay.resize(size.width, size.height);
        }
        Ok(overlay)
    }

    /// Set the render target size.
    ///
    /// The width is widened so RGB rows need no padding (see
    /// [`aligned_width`]). The current frame, if any, is resized to the new
    /// target.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window = ImageSize::new(aligned_width(width), height);
        if let Some(source) = &self.source {
            self.resized = resize_to(source, self.window);
        }
    }

    /// Rescale the camera intrinsics to a new working resolution.
    pub fn resize_camera(&mut self, size: ImageSize) {
        self.camera.resize(size);
    }

    /// Adopt the size of `image` for both the camera and the render target.
    pub fn do_work(&mut self, image: &RgbImage) {
        let size = ImageSize::new(image.width(), image.height());
        self.resize_camera(size);
        self.resize(size.width, size.height);
    }

    /// Prepare `image` as the background of the next scene and detect its
    /// markers.
    ///
    /// The frame is copied, converted to RGB and resized to the render
    /// target before detection, so marker corners are in render target
    /// pixels. Without a render target, the frame's own size is used. An
    /// empty image clears the frame state.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip_all,
            fields(width = image.width(), height = image.height())
        )
    )]
    pub fn process_frame(&mut self, image: &RgbImage) -> &[Marker] {
        if image.width() == 0 || image.height() == 0 {
            log::debug!("empty frame skipped");
            self.source = None;
            self.resized = RgbImage::new(0, 0);
            self.markers.clear();
            return &self.markers;
        }
        if self.window.is_empty() {
            self.resize(image.width(), image.height());
        }

        let source = to_rgb(image, self.config.input_order);
        self.resized = resize_to(&source, self.window);
        self.source = Some(source);
        self.markers = self
            .detector
            .detect(&self.resized, &self.camera, self.config.marker_size);
        log::debug!(
            "frame {}x{}: {} marker(s) detected",
            self.resized.width(),
            self.resized.height(),
            self.markers.len()
        );
        &self.markers
    }

    /// Render the current frame into `ctx`.
    pub fn draw_scene<C: RenderContext + ?Sized>(&mut self, ctx: &mut C) -> RenderStats {
        self.renderer.render(
            ctx,
            &mut self.resized,
            self.window,
            &self.camera,
            &self.markers,
            &mut self.resolver,
        )
    }

    /// Draw the projected axis gizmo of marker `index` into `img`.
    ///
    /// Does nothing when `index` is out of range.
    pub fn draw_3d_axis(&self, img: &mut RgbImage, index: usize) {
        if let Some(marker) = self.markers.get(index) {
            annotate::draw_projected_axis(img, marker, &self.camera, self.config.marker_size);
        }
    }

    /// Draw the projected cube of marker `index` into `img`.
    ///
    /// Does nothing when `index` is out of range.
    pub fn draw_3d_cube(&self, img: &mut RgbImage, index: usize) {
        if let Some(marker) = self.markers.get(index) {
            annotate::draw_projected_cube(
                img,
                marker,
                &self.camera,
                self.config.marker_size,
                PROJECTED_CUBE_COLOR,
            );
        }
    }

    /// Markers of the current frame, in detection order.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Markers excluded by the last rendered scene.
    pub fn excluded(&self) -> &ExclusionSet {
        self.resolver.excluded()
    }

    /// Background of the current frame, at render target size.
    pub fn resized_image(&self) -> &RgbImage {
        &self.resized
    }

    pub fn window_size(&self) -> ImageSize {
        self.window
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}
