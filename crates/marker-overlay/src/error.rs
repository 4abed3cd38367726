use marker_overlay_core::CameraError;

/// Errors raised while setting up an overlay session.
///
/// The per-frame path never fails; everything here happens while loading
/// files or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("label font: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    #[error("marker size must be finite and positive, got {0}")]
    InvalidMarkerSize(f32),
    #[error("conflict threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f32),
    #[error("clip planes must satisfy 0 < near < far, got near={near}, far={far}")]
    InvalidClipPlanes { near: f64, far: f64 },
}
