//! Geometric primitives shared by shapes, bodies and contact sources
//!
//! Segments for ray casting, axis aligned boxes for the broad phase, triangles
//! for hull queries, and the contact record handed to bodies each tick.

use crate::foundation::collections::BodyHandle;
use crate::foundation::math::Vec3;

/// Padding added on every side of a shape's bounding box
pub const BOX_PADDING: f32 = 1.0 / 16.0;

/// A finite segment `p0 -> p1` used for ray casts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start point
    pub p0: Vec3,
    /// End point
    pub p1: Vec3,
}

impl Segment {
    /// Create a segment between two points
    pub fn new(p0: Vec3, p1: Vec3) -> Self {
        Self { p0, p1 }
    }

    /// Unnormalized direction `p1 - p0`
    pub fn delta(&self) -> Vec3 {
        self.p1 - self.p0
    }

    /// Point at fraction `t` of the segment
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.p0 + self.delta() * t
    }

    /// True when the segment is too short to have a direction
    pub fn is_degenerate(&self) -> bool {
        !(self.delta().norm_squared() > 1.0e-12)
    }
}

/// Result of a shape ray cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRayHit {
    /// Fraction along the segment, in `[0, 1]`
    pub fraction: f32,
    /// Unit surface normal at the hit point
    pub normal: Vec3,
    /// Hit point
    pub point: Vec3,
}

/// Axis aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros())
    }
}

impl Aabb {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Grow the box by `amount` on every side
    pub fn padded(&self, amount: f32) -> Self {
        let pad = Vec3::repeat(amount);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Check if the box contains a point (boundary inclusive)
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }
}

/// A triangle of a convex hull face
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal (right-hand rule)
    pub fn scaled_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Centroid of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Möller-Trumbore intersection against a segment.
    ///
    /// Returns the segment fraction of the hit, double sided.
    pub fn intersect_segment(&self, segment: &Segment) -> Option<f32> {
        const EPSILON: f32 = 1.0e-9;

        let direction = segment.delta();
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = direction.cross(&edge2);
        let a = edge1.dot(&h);
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = segment.p0 - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (0.0..=1.0).contains(&t).then_some(t)
    }
}

/// One resolved contact between a body and something else
///
/// The normal points away from the other surface, into the body it is
/// reported to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World space contact position
    pub position: Vec3,
    /// Unit contact normal
    pub normal: Vec3,
    /// Penetration depth, negative while separated inside the skin
    pub penetration: f32,
    /// Contact id, stable within a tick
    pub contact_id: u32,
    /// The other body, `None` for static scenery
    pub other_body: Option<BodyHandle>,
    /// Velocity of the other surface at the contact
    pub other_velocity: Vec3,
}

impl ContactPoint {
    /// Contact against static scenery
    pub fn new(position: Vec3, normal: Vec3, penetration: f32, contact_id: u32) -> Self {
        Self {
            position,
            normal,
            penetration,
            contact_id,
            other_body: None,
            other_velocity: Vec3::zeros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangle_segment_hit() {
        let tri = Triangle::new(
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let segment = Segment::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -2.0, 0.0));
        let t = tri.intersect_segment(&segment).unwrap();
        assert_relative_eq!(t, 0.5, epsilon = 1e-6);

        let short = Segment::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert!(tri.intersect_segment(&short).is_none());
    }

    #[test]
    fn test_aabb_padding() {
        let a = Aabb::new(Vec3::zeros(), Vec3::repeat(1.0));
        assert_eq!(a.center(), Vec3::repeat(0.5));
        assert_eq!(a.extents(), Vec3::repeat(0.5));

        let padded = a.padded(BOX_PADDING);
        assert!(padded.contains_point(&Vec3::new(1.05, 0.5, -0.05)));
        assert!(!a.contains_point(&Vec3::new(1.05, 0.5, -0.05)));
    }
}
