//! The marker detector seam.
//!
//! Detection and pose estimation are delegated to an external vision
//! library; the pipeline only needs something implementing
//! [`MarkerDetector`].

use std::{fs, path::Path};

use image::RgbImage;
use marker_overlay_core::{CameraModel, Marker};
use serde::Deserialize;

use crate::OverlayError;

pub trait MarkerDetector {
    /// Detect markers in `image` (RGB, already resized to the render target)
    /// and estimate their poses for printed markers of side `marker_size`.
    ///
    /// Markers are returned in emission order; ids need not be unique.
    fn detect(&mut self, image: &RgbImage, camera: &CameraModel, marker_size: f32) -> Vec<Marker>;
}

impl<F> MarkerDetector for F
where
    F: FnMut(&RgbImage, &CameraModel, f32) -> Vec<Marker>,
{
    fn detect(&mut self, image: &RgbImage, camera: &CameraModel, marker_size: f32) -> Vec<Marker> {
        self(image, camera, marker_size)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
    Frames(Vec<Vec<Marker>>),
    Single(Vec<Marker>),
}

/// Replays recorded detections, one list per call.
///
/// Once the recording is exhausted it returns empty lists, or starts over
/// when looping is enabled.
#[derive(Clone, Debug, Default)]
pub struct ReplayDetector {
    frames: Vec<Vec<Marker>>,
    next: usize,
    looping: bool,
}

impl ReplayDetector {
    pub fn from_frames(frames: Vec<Vec<Marker>>) -> Self {
        Self {
            frames,
            next: 0,
            looping: false,
        }
    }

    /// Replay the same detections on every frame.
    pub fn constant(markers: Vec<Marker>) -> Self {
        Self::from_frames(vec![markers]).looping(true)
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Load a recording from JSON: either a list of frames (each a list of
    /// markers) or a single list of markers.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, OverlayError> {
        let frames = match serde_json::from_str(raw)? {
            ReplayFile::Frames(frames) => frames,
            ReplayFile::Single(markers) => vec![markers],
        };
        Ok(Self::from_frames(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl MarkerDetector for ReplayDetector {
    fn detect(&mut self, _image: &RgbImage, _camera: &CameraModel, _marker_size: f32) -> Vec<Marker> {
        if self.looping && self.next >= self.frames.len() {
            self.next = 0;
        }
        let Some(frame) = self.frames.get(self.next) else {
            return Vec::new();
        };
        self.next += 1;
        frame.clone()
    }
}
