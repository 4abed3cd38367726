//! Overlay geometry: the RGB axis gizmo and the wireframe cube.

use nalgebra::{Point3, Vector3};

use crate::context::{Color, Primitive, RenderContext, Vertex};

/// One gizmo axis, from the local origin to `end`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisSegment {
    pub end: Point3<f32>,
    pub color: Color,
}

/// X (red), Y (green) and Z (blue) axes of length `size`.
pub fn axis_gizmo(size: f32) -> [AxisSegment; 3] {
    [
        AxisSegment {
            end: Point3::new(size, 0.0, 0.0),
            color: Color::RED,
        },
        AxisSegment {
            end: Point3::new(0.0, size, 0.0),
            color: Color::GREEN,
        },
        AxisSegment {
            end: Point3::new(0.0, 0.0, size),
            color: Color::BLUE,
        },
    ]
}

/// Draw the axis gizmo at the current model transform.
///
/// Leaves the context color set to blue, like any immediate-mode sequence.
pub fn draw_axis<C: RenderContext + ?Sized>(ctx: &mut C, size: f32) {
    for axis in axis_gizmo(size) {
        ctx.color(axis.color);
        ctx.draw(
            Primitive::Lines,
            &[Vertex::new(Point3::origin()), Vertex::new(axis.end)],
        );
    }
}

// Vertex indices of each face, outward winding.
const CUBE_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [3, 2, 6, 7],
    [7, 6, 5, 4],
    [4, 5, 1, 0],
    [5, 6, 2, 1],
    [7, 4, 0, 3],
];

const FACE_NORMALS: [[f32; 3]; 6] = [
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

/// One cube face with its outward normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubeFace {
    pub normal: Vector3<f32>,
    pub corners: [Point3<f32>; 4],
}

/// Cube of edge `size` centered on the local origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WireCube {
    pub vertices: [Point3<f32>; 8],
}

impl WireCube {
    pub fn new(size: f32) -> Self {
        let h = size / 2.0;
        // Vertices 0-3 sit on -X, 4-7 on +X; see `CUBE_FACES` for the winding.
        let sign = [
            [-1.0, -1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [-1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 1.0, -1.0],
        ];
        Self {
            vertices: sign.map(|[x, y, z]| Point3::new(x * h, y * h, z * h)),
        }
    }

    /// Faces in emission order (last table entry first).
    pub fn faces(&self) -> impl Iterator<Item = CubeFace> + '_ {
        CUBE_FACES
            .iter()
            .zip(FACE_NORMALS.iter())
            .rev()
            .map(|(&face, n)| CubeFace {
                normal: Vector3::new(n[0], n[1], n[2]),
                corners: face.map(|i| self.vertices[i]),
            })
    }
}

/// Draw a wireframe cube of edge `size` at the current model transform,
/// in the current color.
pub fn draw_wire_cube<C: RenderContext + ?Sized>(ctx: &mut C, size: f32) {
    let cube = WireCube::new(size);
    for face in cube.faces() {
        let quad = face.corners.map(|p| Vertex::with_normal(p, face.normal));
        ctx.draw(Primitive::Quads, &quad);
    }
}
