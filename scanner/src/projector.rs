// Planar texture projection of a fragment.
//
// UVs come from the fragment's x/y extents only, i.e. the frame is projected
// along the z axis whatever direction the camera actually faced. Surfaces
// lying in a plane of constant y (floors under y-up) collapse to degenerate
// UVs and receive no pixels.

use glam::Vec2;
use log::{debug, warn};

use crate::frame::PixelBuffer;
use crate::geometry::{Bounds, Geometry};

// Twice the UV-space area below which a triangle counts as degenerate.
const DEGENERATE_AREA_EPS: f32 = 1e-7;

/// Largest texture side in pixels. Bigger extents are clamped to it.
pub const MAX_TEXTURE_SIDE: u32 = 4096;

/// Normalized per-vertex UVs: `(x - min.x) / size.x, (y - min.y) / size.y`.
/// A zero extent maps the whole axis to 0.
pub fn planar_uvs(geometry: &Geometry, bounds: &Bounds) -> Vec<Vec2> {
    let size = bounds.size();
    let normalize = |value: f32, min: f32, extent: f32| {
        if extent > 0.0 {
            (value - min) / extent
        } else {
            0.0
        }
    };
    geometry
        .vertices
        .iter()
        .map(|v| {
            Vec2::new(
                normalize(v.x, bounds.min.x, size.x),
                normalize(v.y, bounds.min.y, size.y),
            )
        })
        .collect()
}

/// Texture dimensions for a fragment: its x/y extents rounded, at least 1 and
/// at most `MAX_TEXTURE_SIDE`.
pub fn texture_size(bounds: &Bounds) -> (u32, u32) {
    let size = bounds.size();
    let round = |extent: f32| {
        let side = (extent.round() as u32).max(1);
        if side > MAX_TEXTURE_SIDE {
            warn!(
                "fragment extent {} exceeds {} texels, clamping",
                extent, MAX_TEXTURE_SIDE
            );
        }
        side.min(MAX_TEXTURE_SIDE)
    };
    (round(size.x), round(size.y))
}

/// Half-open pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    /// Pixels covered by the UV box of `uvs` in an image of `dimensions`,
    /// clamped to the image. `None` when nothing is covered.
    fn covering(uvs: &[Vec2; 3], dimensions: (u32, u32)) -> Option<PixelRect> {
        let (width, height) = (dimensions.0 as f32, dimensions.1 as f32);
        let min = uvs[0].min(uvs[1]).min(uvs[2]);
        let max = uvs[0].max(uvs[1]).max(uvs[2]);

        let x0 = (min.x * width).floor().clamp(0.0, width) as u32;
        let y0 = (min.y * height).floor().clamp(0.0, height) as u32;
        let x1 = (max.x * width).ceil().clamp(0.0, width) as u32;
        let y1 = (max.y * height).ceil().clamp(0.0, height) as u32;

        if x1 > x0 && y1 > y0 {
            Some(PixelRect { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

fn is_degenerate(uvs: &[Vec2; 3]) -> bool {
    let (a, b) = (uvs[1] - uvs[0], uvs[2] - uvs[0]);
    (a.x * b.y - a.y * b.x).abs() < DEGENERATE_AREA_EPS
}

// Nearest-neighbour remap of one rectangle onto another.
fn copy_region(
    source: &PixelBuffer,
    from: PixelRect,
    texture: &mut PixelBuffer,
    to: PixelRect,
) {
    let scale = |i: u32, src: u32, dst: u32| (i as u64 * src as u64 / dst as u64) as u32;
    for dy in 0..to.height() {
        let sy = from.y0 + scale(dy, from.height(), to.height());
        for dx in 0..to.width() {
            let sx = from.x0 + scale(dx, from.width(), to.width());
            texture.put_pixel(to.x0 + dx, to.y0 + dy, *source.get_pixel(sx, sy));
        }
    }
}

/// Samples `source` into a texture local to the fragment.
///
/// Every triangle copies the source pixels under its UV box into the same
/// box of the output texture. Triangles are taken in index order and later
/// ones overwrite earlier ones; degenerate triangles are skipped. Untouched
/// texels stay transparent black.
pub fn project(geometry: &Geometry, source: &PixelBuffer) -> PixelBuffer {
    let bounds = match geometry.bounds() {
        Some(bounds) => bounds,
        None => return PixelBuffer::new(1, 1),
    };

    let (width, height) = texture_size(&bounds);
    let mut texture = PixelBuffer::new(width, height);
    let uvs = planar_uvs(geometry, &bounds);

    let mut num_skipped = 0;
    for triangle in &geometry.triangles {
        let get = |i: u32| uvs.get(i as usize).copied();
        let tri_uvs = match (get(triangle[0]), get(triangle[1]), get(triangle[2]))
        {
            (Some(a), Some(b), Some(c)) => [a, b, c],
            _ => {
                warn!("triangle {:?} refers to a missing vertex", triangle);
                num_skipped += 1;
                continue;
            }
        };
        if is_degenerate(&tri_uvs) {
            num_skipped += 1;
            continue;
        }

        let from = PixelRect::covering(&tri_uvs, source.dimensions());
        let to = PixelRect::covering(&tri_uvs, texture.dimensions());
        match (from, to) {
            (Some(from), Some(to)) => copy_region(source, from, &mut texture, to),
            _ => num_skipped += 1,
        }
    }

    debug!(
        "projected {}x{} frame onto {}x{} texture, {} of {} triangles skipped",
        source.width(),
        source.height(),
        width,
        height,
        num_skipped,
        geometry.triangles.len()
    );
    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::Vec3;
    use image::Rgba;

    use base::assert_eq_f32;

    use crate::testing::unit_square;

    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
    const ORANGE: Rgba<u8> = Rgba([255, 128, 0, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> PixelBuffer {
        PixelBuffer::from_pixel(width, height, color)
    }

    #[test]
    fn test_planar_uvs_ignore_z() {
        let geometry = Geometry::new(
            vec![
                Vec3::new(1.0, 2.0, 5.0),
                Vec3::new(3.0, 2.0, -5.0),
                Vec3::new(2.0, 6.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let uvs = planar_uvs(&geometry, &geometry.bounds().unwrap());
        assert_eq!(uvs.len(), 3);
        assert_eq_f32!(uvs[0].x, 0.0);
        assert_eq_f32!(uvs[0].y, 0.0);
        assert_eq_f32!(uvs[1].x, 1.0);
        assert_eq_f32!(uvs[1].y, 0.0);
        assert_eq_f32!(uvs[2].x, 0.5);
        assert_eq_f32!(uvs[2].y, 1.0);
    }

    #[test]
    fn test_planar_uvs_flat_axis() {
        let geometry = Geometry::new(
            vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 3.0)],
            vec![],
        );
        let uvs = planar_uvs(&geometry, &geometry.bounds().unwrap());
        assert_eq_f32!(uvs[1].x, 1.0);
        assert_eq_f32!(uvs[1].y, 0.0);
    }

    #[test]
    fn test_texture_size() {
        let bounds = Bounds {
            min: Vec3::new(0.0, 0.0, 0.0),
            max: Vec3::new(2.4, 0.3, 9.0),
        };
        assert_eq!(texture_size(&bounds), (2, 1));
        let bounds = Bounds {
            min: Vec3::new(-1.0, -1.0, 0.0),
            max: Vec3::new(1.6, 2.5, 0.0),
        };
        assert_eq!(texture_size(&bounds), (3, 4));
    }

    #[test]
    fn test_texture_size_is_bounded() {
        let bounds = Bounds {
            min: Vec3::new(0.0, 0.0, 0.0),
            max: Vec3::new(1e5, 2.0, 0.0),
        };
        assert_eq!(texture_size(&bounds), (MAX_TEXTURE_SIDE, 2));

        let geometry = Geometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1e5, 0.0, 0.0),
                Vec3::new(1e5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let texture = project(&geometry, &solid(4, 4, ORANGE));
        assert_eq!(texture.dimensions(), (MAX_TEXTURE_SIDE, 1));
    }

    #[test]
    fn test_project_unit_square() {
        let texture = project(&unit_square(), &solid(4, 4, ORANGE));
        assert_eq!(texture.dimensions(), (1, 1));
        assert_eq!(*texture.get_pixel(0, 0), ORANGE);
    }

    #[test]
    fn test_project_leaves_uncovered_texels_clear() {
        // One triangle over the lower-left quarter; the lone far vertex only
        // stretches the bounds to 4x4.
        let geometry = Geometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(0.0, 2.0, 0.0),
                Vec3::new(4.0, 4.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let texture = project(&geometry, &solid(8, 8, ORANGE));
        assert_eq!(texture.dimensions(), (4, 4));
        for (x, y, pixel) in texture.enumerate_pixels() {
            let expected = if x < 2 && y < 2 { ORANGE } else { CLEAR };
            assert_eq!(*pixel, expected, "texel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_project_samples_matching_region() {
        // Left half red, right half blue; a triangle over the right half of
        // the fragment only picks blue.
        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);
        let source = PixelBuffer::from_fn(4, 2, |x, _| if x < 2 { red } else { blue });
        let geometry = Geometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(4.0, 2.0, 0.0),
            ],
            vec![[1, 2, 3]],
        );
        let texture = project(&geometry, &source);
        assert_eq!(texture.dimensions(), (4, 2));
        for (x, _, pixel) in texture.enumerate_pixels() {
            assert_eq!(*pixel, if x < 2 { CLEAR } else { blue });
        }
    }

    #[test]
    fn test_project_skips_degenerate_triangle() {
        let geometry = Geometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(2.0, 2.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let texture = project(&geometry, &solid(4, 4, ORANGE));
        assert_eq!(texture.dimensions(), (2, 2));
        assert!(texture.pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_project_skips_bad_indices() {
        let mut geometry = unit_square();
        geometry.triangles = vec![[0, 1, 9]];
        let texture = project(&geometry, &solid(4, 4, ORANGE));
        assert_eq!(*texture.get_pixel(0, 0), CLEAR);
    }

    #[test]
    fn test_project_empty_geometry() {
        let texture = project(&Geometry::default(), &solid(4, 4, ORANGE));
        assert_eq!(texture.dimensions(), (1, 1));
        assert_eq!(*texture.get_pixel(0, 0), CLEAR);
    }
}
