use derive_more::{Display, From};
use glam::Vec3;

/// Opaque handle of a mesh fragment, stable for the fragment's lifetime.
#[derive(Clone, Copy, Debug, Display, From, Hash, PartialEq, Eq)]
#[display(fmt = "fragment#{}", _0)]
pub struct FragmentId(pub u64);

/// Fragment surface as delivered by spatial mapping.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::enclosing(&self.vertices)
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn enclosing(points: &[Vec3]) -> Option<Bounds> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Bounds {
            min: *first,
            max: *first,
        };
        for point in rest {
            bounds.min = bounds.min.min(*point);
            bounds.max = bounds.max.max(*point);
        }
        Some(bounds)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}
