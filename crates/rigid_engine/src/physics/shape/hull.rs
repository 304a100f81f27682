//! Convex hull shape
//!
//! A vertex list plus an optional triangulated boundary. Hulls built from a
//! bare point cloud answer support and bounding queries but have no faces to
//! ray cast, slice or integrate.

use std::collections::BTreeSet;

use crate::foundation::math::Vec3;
use crate::physics::error::PhysicsError;
use crate::physics::primitives::{Segment, Triangle};

/// Convex polyhedron
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    vertices: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
}

impl ConvexHull {
    /// Build a hull from vertices and triangle indices.
    ///
    /// Faces are re-wound so every normal points away from the vertex
    /// centroid.
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Result<Self, PhysicsError> {
        if vertices.is_empty() {
            return Err(PhysicsError::InvalidArgument("convex hull needs at least one vertex".to_string()));
        }
        if !vertices.iter().all(|v| v.iter().all(|c| c.is_finite())) {
            return Err(PhysicsError::InvalidArgument("convex hull vertex is not finite".to_string()));
        }
        let count = vertices.len();
        if let Some(face) = faces.iter().find(|f| f.iter().any(|&i| i as usize >= count)) {
            return Err(PhysicsError::InvalidArgument(format!(
                "convex hull face {face:?} indexes past {count} vertices"
            )));
        }

        let mut hull = Self { vertices, faces };
        hull.orient_faces();
        Ok(hull)
    }

    /// Point cloud hull without boundary faces
    pub fn from_points(vertices: Vec<Vec3>) -> Result<Self, PhysicsError> {
        Self::new(vertices, Vec::new())
    }

    /// Axis aligned box as a hull, useful for scenery
    pub fn cuboid(half_extents: Vec3) -> Result<Self, PhysicsError> {
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -half_extents.x } else { half_extents.x },
                    if i & 2 == 0 { -half_extents.y } else { half_extents.y },
                    if i & 4 == 0 { -half_extents.z } else { half_extents.z },
                )
            })
            .collect();
        let faces = vec![
            [0, 2, 6], [0, 6, 4], // -x
            [1, 5, 7], [1, 7, 3], // +x
            [0, 4, 5], [0, 5, 1], // -y
            [2, 3, 7], [2, 7, 6], // +y
            [0, 1, 3], [0, 3, 2], // -z
            [4, 6, 7], [4, 7, 5], // +z
        ];
        Self::new(vertices, faces)
    }

    fn orient_faces(&mut self) {
        let centroid = self.centroid();
        for face in &mut self.faces {
            let [a, b, c] = face.map(|i| self.vertices[i as usize]);
            let tri = Triangle::new(a, b, c);
            if tri.scaled_normal().dot(&(tri.centroid() - centroid)) < 0.0 {
                face.swap(1, 2);
            }
        }
    }

    /// Average of the vertices
    pub fn centroid(&self) -> Vec3 {
        let sum: Vec3 = self.vertices.iter().sum();
        sum / self.vertices.len() as f32
    }

    /// Hull vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Triangle indices, wound outward
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// True when the hull has a closed boundary
    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Replace the geometry; every instance sharing this hull sees the change
    pub fn set_geometry(&mut self, vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Result<(), PhysicsError> {
        *self = Self::new(vertices, faces)?;
        Ok(())
    }

    /// Face triangles
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|f| {
            let [a, b, c] = f.map(|i| self.vertices[i as usize]);
            Triangle::new(a, b, c)
        })
    }

    /// Unique edges as sorted index pairs
    pub fn edges(&self) -> Vec<(u32, u32)> {
        let mut edges = BTreeSet::new();
        for face in &self.faces {
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges.into_iter().collect()
    }

    /// Farthest vertex along `dir`, lowest index wins ties
    pub fn support(&self, dir: &Vec3) -> (Vec3, usize) {
        let mut best = 0;
        let mut best_dist = f32::NEG_INFINITY;
        for (i, v) in self.vertices.iter().enumerate() {
            let dist = v.dot(dir);
            if dist > best_dist {
                best = i;
                best_dist = dist;
            }
        }
        (self.vertices[best], best)
    }

    /// Strictly inside every face plane
    pub fn contains(&self, point: &Vec3) -> bool {
        self.has_faces() && self.triangles().all(|t| t.scaled_normal().dot(&(point - t.v0)) < 0.0)
    }

    /// First boundary crossing along the segment, with the face normal
    pub fn ray_cast_entry(&self, segment: &Segment) -> Option<(f32, Vec3)> {
        self.triangles()
            .filter_map(|tri| tri.intersect_segment(segment).map(|t| (t, tri.scaled_normal())))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(t, n)| (t, n.normalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> ConvexHull {
        ConvexHull::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            // deliberately mixed winding
            vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_faces_point_outward() {
        let hull = tetrahedron();
        let centroid = hull.centroid();
        for tri in hull.triangles() {
            assert!(tri.scaled_normal().dot(&(tri.centroid() - centroid)) > 0.0);
        }
    }

    #[test]
    fn test_support_tie_break_is_lowest_index() {
        let hull = ConvexHull::cuboid(Vec3::repeat(1.0)).unwrap();
        let (_, index) = hull.support(&Vec3::x());
        assert_eq!(index, 1);
        assert_eq!(hull.edges().len(), 18);
    }

    #[test]
    fn test_bad_index_rejected() {
        let result = ConvexHull::new(vec![Vec3::zeros()], vec![[0, 1, 2]]);
        assert!(matches!(result, Err(PhysicsError::InvalidArgument(_))));
    }

    #[test]
    fn test_ray_entry() {
        let hull = ConvexHull::cuboid(Vec3::repeat(1.0)).unwrap();
        let segment = Segment::new(Vec3::new(-3.0, 0.1, 0.2), Vec3::new(3.0, 0.1, 0.2));
        let (t, n) = hull.ray_cast_entry(&segment).unwrap();
        assert_relative_eq!(t, 1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(n, -Vec3::x(), epsilon = 1e-5);
    }
}
