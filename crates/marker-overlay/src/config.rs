//! JSON configuration of an overlay session.

use std::{fs, path::Path, sync::Arc};

use ab_glyph::FontVec;
use marker_overlay_core::{
    ConflictResolver, ExclusionPolicy, ImageSize, DEFAULT_CONFLICT_THRESHOLD,
};
use marker_overlay_render::{SceneParams, SceneRenderer};
use serde::{Deserialize, Serialize};

use crate::OverlayError;

/// Channel order of the frames handed to the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputOrder {
    /// Camera frames as delivered by most capture APIs; swapped to RGB.
    #[default]
    Bgr,
    Rgb,
}

fn default_camera_path() -> String {
    "camera.json".to_string()
}

fn default_marker_size() -> f32 {
    0.05
}

fn default_conflict_threshold() -> f32 {
    DEFAULT_CONFLICT_THRESHOLD
}

fn default_near() -> f64 {
    0.01
}

fn default_far() -> f64 {
    100.0
}

fn default_annotate() -> bool {
    true
}

/// Settings for a [`crate::MarkerOverlay`] session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Camera calibration JSON, see [`marker_overlay_core::CameraModel::load_json`].
    #[serde(default = "default_camera_path")]
    pub camera_path: String,
    /// Gizmo length and cube edge, in pose translation units. Also passed to
    /// the detector for pose estimation.
    #[serde(default = "default_marker_size")]
    pub marker_size: f32,
    /// Centroid distance, in pixels, under which two markers conflict.
    #[serde(default = "default_conflict_threshold")]
    pub conflict_threshold: f32,
    #[serde(default)]
    pub exclusion_policy: ExclusionPolicy,
    #[serde(default = "default_near")]
    pub near: f64,
    #[serde(default = "default_far")]
    pub far: f64,
    /// Outline detected markers on the background image.
    #[serde(default = "default_annotate")]
    pub annotate: bool,
    /// TrueType/OpenType font used to write marker ids next to the outlines.
    /// Without one, outlines are drawn unlabeled.
    #[serde(default)]
    pub label_font_path: Option<String>,
    #[serde(default)]
    pub input_order: InputOrder,
    /// Initial render target; when unset the first frame's size is used.
    #[serde(default)]
    pub window_width: Option<u32>,
    #[serde(default)]
    pub window_height: Option<u32>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            camera_path: default_camera_path(),
            marker_size: default_marker_size(),
            conflict_threshold: default_conflict_threshold(),
            exclusion_policy: ExclusionPolicy::default(),
            near: default_near(),
            far: default_far(),
            annotate: default_annotate(),
            label_font_path: None,
            input_order: InputOrder::default(),
            window_width: None,
            window_height: None,
        }
    }
}

impl OverlayConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), OverlayError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<(), OverlayError> {
        if !(self.marker_size.is_finite() && self.marker_size > 0.0) {
            return Err(OverlayError::InvalidMarkerSize(self.marker_size));
        }
        if !(self.conflict_threshold.is_finite() && self.conflict_threshold >= 0.0) {
            return Err(OverlayError::InvalidThreshold(self.conflict_threshold));
        }
        if !(self.near.is_finite() && self.far.is_finite() && self.near > 0.0 && self.far > self.near)
        {
            return Err(OverlayError::InvalidClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// Initial render target, when both dimensions are configured.
    pub fn window_size(&self) -> Option<ImageSize> {
        match (self.window_width, self.window_height) {
            (Some(w), Some(h)) => Some(ImageSize::new(w, h)),
            _ => None,
        }
    }

    pub fn scene_params(&self) -> SceneParams {
        SceneParams {
            marker_size: self.marker_size,
            near: self.near,
            far: self.far,
            annotate: self.annotate,
            ..SceneParams::default()
        }
    }

    /// Load the label font, if one is configured.
    pub fn load_label_font(&self) -> Result<Option<Arc<FontVec>>, OverlayError> {
        let Some(path) = &self.label_font_path else {
            return Ok(None);
        };
        let font = FontVec::try_from_vec(fs::read(path)?)?;
        log::debug!("loaded label font {path}");
        Ok(Some(Arc::new(font)))
    }

    /// Scene renderer for these settings, with the label font when
    /// annotation is on and a font is configured.
    pub fn build_renderer(&self) -> Result<SceneRenderer, OverlayError> {
        let renderer = SceneRenderer::new(self.scene_params());
        if !self.annotate {
            return Ok(renderer);
        }
        Ok(match self.load_label_font()? {
            Some(font) => renderer.with_label_font(font),
            None => renderer,
        })
    }

    pub fn build_resolver(&self) -> ConflictResolver {
        ConflictResolver::new(self.conflict_threshold, self.exclusion_policy)
    }
}
