use nalgebra::{Isometry3, Matrix4, Point2, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// One fiducial marker detected in the current frame.
///
/// Markers are plain values: a detector emits a fresh list every frame and
/// nothing keeps a marker alive across frames.
///
/// Equality compares the id and the four corners only. Two markers carrying
/// the same id at different image positions are different markers, while the
/// pose does not take part in the comparison.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Marker {
    /// Dictionary id. Not guaranteed to be unique within a frame.
    pub id: i32,
    /// Image-space corners, in the detector's (consistent) winding order.
    pub corners: [Point2<f32>; 4],
    /// Rotation of the marker frame in the camera frame, as an axis-angle
    /// (Rodrigues) vector. OpenCV camera convention: +Z forward, +Y down.
    #[serde(default)]
    pub rvec: Vector3<f64>,
    /// Position of the marker origin in the camera frame.
    #[serde(default)]
    pub tvec: Vector3<f64>,
}

impl Marker {
    /// Marker with an identity pose.
    pub fn new(id: i32, corners: [Point2<f32>; 4]) -> Self {
        Self {
            id,
            corners,
            rvec: Vector3::zeros(),
            tvec: Vector3::zeros(),
        }
    }

    /// Axis-aligned square marker of side `side` centered on `center`.
    ///
    /// Corners run TL, TR, BR, BL in image coordinates.
    pub fn square(id: i32, center: Point2<f32>, side: f32) -> Self {
        let h = side * 0.5;
        Self::new(
            id,
            [
                Point2::new(center.x - h, center.y - h),
                Point2::new(center.x + h, center.y - h),
                Point2::new(center.x + h, center.y + h),
                Point2::new(center.x - h, center.y + h),
            ],
        )
    }

    pub fn with_pose(mut self, rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        self.rvec = rvec;
        self.tvec = tvec;
        self
    }

    /// Arithmetic mean of the four corners.
    pub fn centroid(&self) -> Point2<f32> {
        let sum = self
            .corners
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum * 0.25)
    }

    /// Euclidean distance between the centroids of `self` and `other`.
    pub fn centroid_distance(&self, other: &Marker) -> f32 {
        nalgebra::distance(&self.centroid(), &other.centroid())
    }

    /// Camera-from-marker rigid transform (OpenCV camera frame).
    pub fn pose(&self) -> Isometry3<f64> {
        Isometry3::new(self.tvec, self.rvec)
    }

    /// Pose expressed in the OpenGL eye frame (+Y up, looking down -Z).
    ///
    /// The OpenCV camera frame is converted by negating the Y and Z rows.
    /// nalgebra stores matrices column-major, so `as_slice()` on the result
    /// is directly loadable as an OpenGL modelview matrix.
    pub fn gl_modelview_matrix(&self) -> Matrix4<f64> {
        let cv_to_gl = Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0));
        cv_to_gl * self.pose().to_homogeneous()
    }

    /// Hashable identity with the same semantics as `==`.
    pub fn key(&self) -> MarkerKey {
        MarkerKey {
            id: self.id,
            corners: self.corners.map(|p| [float_bits(p.x), float_bits(p.y)]),
        }
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.corners == other.corners
    }
}

/// Structural identity of a [`Marker`]: its id plus the bit patterns of its
/// corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    id: i32,
    corners: [[u32; 2]; 4],
}

impl MarkerKey {
    pub fn id(&self) -> i32 {
        self.id
    }
}

// -0.0 == 0.0 for markers, so both must hash alike.
fn float_bits(v: f32) -> u32 {
    if v == 0.0 {
        0.0_f32.to_bits()
    } else {
        v.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn centroid_is_corner_mean() {
        let m = Marker::new(
            3,
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(12.0, 8.0),
                Point2::new(2.0, 8.0),
            ],
        );
        let c = m.centroid();
        assert_relative_eq!(c.x, 6.0);
        assert_relative_eq!(c.y, 4.0);
    }

    #[test]
    fn equality_uses_id_and_corners_but_not_pose() {
        let a = Marker::square(7, Point2::new(100.0, 100.0), 40.0);
        let moved_pose = a
            .clone()
            .with_pose(Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let same_id_elsewhere = Marker::square(7, Point2::new(300.0, 100.0), 40.0);

        assert_eq!(a, moved_pose);
        assert_eq!(a.key(), moved_pose.key());
        assert_ne!(a, same_id_elsewhere);
        assert_ne!(a.key(), same_id_elsewhere.key());
    }

    #[test]
    fn signed_zero_corners_share_a_key() {
        let a = Marker::new(1, [Point2::new(0.0, 0.0); 4]);
        let b = Marker::new(1, [Point2::new(-0.0, 0.0); 4]);
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn gl_modelview_flips_y_and_z() {
        let m = Marker::new(0, [Point2::origin(); 4])
            .with_pose(Vector3::zeros(), Vector3::new(0.1, 0.2, 1.5));
        let mv = m.gl_modelview_matrix();
        let origin = mv.transform_point(&Point3::origin());
        assert_relative_eq!(origin, Point3::new(0.1, -0.2, -1.5), epsilon = 1e-12);
    }

    #[test]
    fn pose_applies_rotation_before_translation() {
        // 90 degrees about +Z maps marker +X onto camera +Y.
        let m = Marker::new(0, [Point2::origin(); 4])
            .with_pose(Vector3::new(0.0, 0.0, FRAC_PI_2), Vector3::new(0.0, 0.0, 2.0));
        let p = m.pose().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 2.0), epsilon = 1e-12);
    }
}
