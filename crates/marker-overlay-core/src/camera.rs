//! Pinhole camera model with Brown-Conrady distortion.
//!
//! The model is the bridge between the vision side (pixels, OpenCV camera
//! frame) and the rendering side (OpenGL clip space). Intrinsics are always
//! expressed at the camera's current working resolution; [`CameraModel::resize`]
//! rescales them when the working resolution changes.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid focal lengths (fx={fx}, fy={fy})")]
    InvalidIntrinsics { fx: f64, fy: f64 },
    #[error("invalid calibration size (width={width}, height={height})")]
    InvalidSize { width: u32, height: u32 },
    #[error("expected at most 5 distortion coefficients, got {got}")]
    DistortionLength { got: usize },
}

/// On-disk calibration layout.
#[derive(Debug, Serialize, Deserialize)]
struct CameraFile {
    width: u32,
    height: u32,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    #[serde(default)]
    distortion: Vec<f64>,
}

/// Calibrated camera at a given working resolution.
#[derive(Clone, Debug)]
pub struct CameraModel {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    /// `[k1, k2, p1, p2, k3]`.
    distortion: [f64; 5],
    size: ImageSize,
    distortion_warned: Cell<bool>,
}

impl CameraModel {
    /// Build a distortion-free camera.
    pub fn new(size: ImageSize, fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        Self::with_distortion(size, fx, fy, cx, cy, &[])
    }

    /// Build a camera with up to five `[k1, k2, p1, p2, k3]` coefficients.
    ///
    /// Missing trailing coefficients are treated as zero.
    pub fn with_distortion(
        size: ImageSize,
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        distortion: &[f64],
    ) -> Result<Self, CameraError> {
        if size.is_empty() {
            return Err(CameraError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        if !(fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0) {
            return Err(CameraError::InvalidIntrinsics { fx, fy });
        }
        if distortion.len() > 5 {
            return Err(CameraError::DistortionLength {
                got: distortion.len(),
            });
        }
        let mut coeffs = [0.0; 5];
        coeffs[..distortion.len()].copy_from_slice(distortion);

        Ok(Self {
            fx,
            fy,
            cx,
            cy,
            distortion: coeffs,
            size,
            distortion_warned: Cell::new(false),
        })
    }

    /// Parse a calibration from its JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, CameraError> {
        let file: CameraFile = serde_json::from_str(raw)?;
        Self::with_distortion(
            ImageSize::new(file.width, file.height),
            file.fx,
            file.fy,
            file.cx,
            file.cy,
            &file.distortion,
        )
    }

    /// Load a calibration file from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Write the calibration at the current working resolution as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CameraError> {
        let file = CameraFile {
            width: self.size.width,
            height: self.size.height,
            fx: self.fx,
            fy: self.fy,
            cx: self.cx,
            cy: self.cy,
            distortion: self.distortion.to_vec(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        !self.size.is_empty() && self.fx > 0.0 && self.fy > 0.0
    }

    /// Current working resolution.
    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    #[inline]
    pub fn distortion(&self) -> &[f64; 5] {
        &self.distortion
    }

    /// Intrinsic matrix K at the working resolution.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Rescale the intrinsics to a new working resolution.
    ///
    /// Does nothing when `new_size` is empty or equal to the current size.
    pub fn resize(&mut self, new_size: ImageSize) {
        if new_size.is_empty() || new_size == self.size {
            return;
        }
        let ax = f64::from(new_size.width) / f64::from(self.size.width);
        let ay = f64::from(new_size.height) / f64::from(self.size.height);
        self.fx *= ax;
        self.cx *= ax;
        self.fy *= ay;
        self.cy *= ay;
        log::debug!(
            "camera resized {}x{} -> {}x{}",
            self.size.width,
            self.size.height,
            new_size.width,
            new_size.height
        );
        self.size = new_size;
    }

    /// OpenGL projection matrix for an image of `image_size` pixels shown in a
    /// viewport of `viewport` pixels, with the given clip planes.
    ///
    /// Points are expected in the OpenGL eye frame (see
    /// [`crate::Marker::gl_modelview_matrix`]). A point projecting to pixel
    /// `(u, v)` of the image lands at NDC `(2u'/w - 1, 1 - 2v'/h)`, where
    /// `(u', v')` is the pixel scaled into the viewport, so image row 0 sits
    /// at the top of the viewport.
    ///
    /// Lens distortion cannot be expressed by a linear projection and is
    /// ignored (with a one-time warning). Empty sizes yield the identity.
    pub fn gl_projection_matrix(
        &self,
        image_size: ImageSize,
        viewport: ImageSize,
        near: f64,
        far: f64,
    ) -> Matrix4<f64> {
        if image_size.is_empty() || viewport.is_empty() {
            return Matrix4::identity();
        }
        if self.distortion.iter().any(|&k| k != 0.0) && !self.distortion_warned.replace(true) {
            log::warn!("non-zero distortion is ignored by the OpenGL projection");
        }

        let w = f64::from(viewport.width);
        let h = f64::from(viewport.height);
        let ax = w / f64::from(image_size.width);
        let ay = h / f64::from(image_size.height);
        let fx = self.fx * ax;
        let cx = self.cx * ax;
        let fy = self.fy * ay;
        let cy = self.cy * ay;

        Matrix4::new(
            2.0 * fx / w, 0.0, 1.0 - 2.0 * cx / w, 0.0, //
            0.0, 2.0 * fy / h, 2.0 * cy / h - 1.0, 0.0, //
            0.0, 0.0, -(far + near) / (far - near), -2.0 * far * near / (far - near), //
            0.0, 0.0, -1.0, 0.0,
        )
    }

    /// Project a point given in the OpenCV camera frame to pixels, applying
    /// the distortion model.
    ///
    /// Returns `None` for points at or behind the image plane.
    pub fn project_point(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        let [k1, k2, p1, p2, k3] = self.distortion;
        let x = p.x / p.z;
        let y = p.y / p.z;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        Some(Point2::new(self.fx * xd + self.cx, self.fy * yd + self.cy))
    }
}
