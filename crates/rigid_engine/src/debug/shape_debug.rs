//! Outline polygon sink and a collecting implementation

use crate::foundation::math::Vec3;

/// Receives outline polygons from `ShapeInstance::debug_shape`
pub trait ShapeDebugNotify {
    /// One planar (or near planar) polygon of the shape outline
    fn polygon(&mut self, vertices: &[Vec3], face_id: usize);
}

/// A polygon captured by [`DebugPolygonCollector`]
#[derive(Debug, Clone, PartialEq)]
pub struct DebugPolygon {
    /// Polygon corners in draw order
    pub vertices: Vec<Vec3>,
    /// Face id reported by the shape
    pub face_id: usize,
}

/// Stores every polygon it receives
#[derive(Debug, Clone)]
pub struct DebugPolygonCollector {
    polygons: Vec<DebugPolygon>,

    /// Master enable/disable flag
    pub enabled: bool,
}

impl Default for DebugPolygonCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugPolygonCollector {
    /// Create an empty, enabled collector
    pub fn new() -> Self {
        Self {
            polygons: Vec::new(),
            enabled: true,
        }
    }

    /// Collected polygons
    pub fn polygons(&self) -> &[DebugPolygon] {
        &self.polygons
    }

    /// Every polygon edge as a line segment, for line renderers
    pub fn edges(&self) -> Vec<(Vec3, Vec3)> {
        self.polygons
            .iter()
            .flat_map(|p| {
                let n = p.vertices.len();
                (0..n).map(move |i| (p.vertices[i], p.vertices[(i + 1) % n]))
            })
            .collect()
    }

    /// Bounds of all collected vertices, `None` when empty
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut vertices = self.polygons.iter().flat_map(|p| p.vertices.iter());
        let first = *vertices.next()?;
        Some(vertices.fold((first, first), |(min, max), v| (min.inf(v), max.sup(v))))
    }

    /// Drop everything collected so far
    pub fn clear(&mut self) {
        self.polygons.clear();
    }
}

impl ShapeDebugNotify for DebugPolygonCollector {
    fn polygon(&mut self, vertices: &[Vec3], face_id: usize) {
        if !self.enabled || vertices.is_empty() {
            return;
        }
        self.polygons.push(DebugPolygon {
            vertices: vertices.to_vec(),
            face_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform};
    use crate::physics::shape::{ShapeInstance, SharedShape};
    use approx::assert_relative_eq;

    #[test]
    fn test_box_outline() {
        let instance = ShapeInstance::new(SharedShape::cuboid(Vec3::new(1.0, 2.0, 3.0)).unwrap());
        let mut collector = DebugPolygonCollector::new();
        instance.debug_shape(&Transform::from_position(Vec3::new(10.0, 0.0, 0.0)), &mut collector);

        assert_eq!(collector.polygons().len(), 6);
        assert_eq!(collector.edges().len(), 24);
        let (min, max) = collector.bounds().unwrap();
        assert_relative_eq!(min, Vec3::new(9.0, -2.0, -3.0), epsilon = 1e-6);
        assert_relative_eq!(max, Vec3::new(11.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_scaled_sphere_outline_stays_on_surface() {
        let mut instance = ShapeInstance::new(SharedShape::sphere(1.0).unwrap());
        instance.set_scale(Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let matrix = Transform::from_position_rotation(Vec3::zeros(), Quat::identity());

        let mut collector = DebugPolygonCollector::new();
        instance.debug_shape(&matrix, &mut collector);
        assert!(!collector.polygons().is_empty());
        for polygon in collector.polygons() {
            for v in &polygon.vertices {
                // (x/2)^2 + y^2 + z^2 = 1 on the ellipsoid
                let e = (v.x * 0.5).powi(2) + v.y * v.y + v.z * v.z;
                assert_relative_eq!(e, 1.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_disabled_collector_ignores_input() {
        let mut collector = DebugPolygonCollector::new();
        collector.enabled = false;
        collector.polygon(&[Vec3::zeros()], 0);
        assert!(collector.polygons().is_empty());
        assert!(collector.bounds().is_none());
    }
}
