//! Collision shapes and shape instances
//!
//! A [`Shape`] is raw, unscaled geometry in its own frame. Shapes are shared
//! between instances through [`SharedShape`]; every [`ShapeInstance`] adds a
//! placement, a scale envelope and a material on top of one shared shape.

pub mod compound;
pub mod convex;
pub mod hull;
pub mod instance;
pub mod mass;
pub mod material;
pub mod scale;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::physics::error::PhysicsError;
use crate::physics::primitives::Segment;

pub use compound::Compound;
pub use hull::ConvexHull;
pub use instance::{ShapeInfo, ShapeInstance};
pub use mass::MassProperties;
pub use material::ShapeMaterial;
pub use scale::{ScaleEnvelope, ScaleType};

use mass::VolumeMoments;

/// Relative distance within which a ray start counts as on the surface
const SURFACE_TOLERANCE: f32 = 1.0e-5;

/// Shape discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Empty shape, collides with nothing
    Null,
    /// Sphere
    Sphere,
    /// Box
    Box,
    /// Capsule along X
    Capsule,
    /// Cylinder along X
    Cylinder,
    /// Convex hull
    ConvexHull,
    /// Compound of convex instances
    Compound,
}

/// Raw collision geometry
#[derive(Debug, Clone)]
pub enum Shape {
    /// Empty shape
    Null,
    /// Sphere centred on the origin
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Box centred on the origin
    Box {
        /// Half size per axis
        half_extents: Vec3,
    },
    /// Capsule along X
    Capsule {
        /// Radius of the rounded ends
        radius: f32,
        /// Half length of the straight section
        half_height: f32,
    },
    /// Cylinder along X
    Cylinder {
        /// Radius
        radius: f32,
        /// Half length
        half_height: f32,
    },
    /// Convex hull
    ConvexHull(ConvexHull),
    /// Compound of convex instances
    Compound(Compound),
}

impl Shape {
    /// Shape discriminant
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Null => ShapeKind::Null,
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Capsule { .. } => ShapeKind::Capsule,
            Shape::Cylinder { .. } => ShapeKind::Cylinder,
            Shape::ConvexHull(_) => ShapeKind::ConvexHull,
            Shape::Compound(_) => ShapeKind::Compound,
        }
    }

    /// Support point in shape space and the selected vertex, if discrete
    pub(crate) fn support(&self, dir: &Vec3) -> (Vec3, Option<usize>) {
        match self {
            Shape::Null => (Vec3::zeros(), None),
            Shape::Sphere { radius } => (convex::sphere_support(*radius, dir), None),
            Shape::Box { half_extents } => {
                let (vertex, index) = convex::box_support(half_extents, dir);
                (vertex, Some(index))
            }
            Shape::Capsule { radius, half_height } => (convex::capsule_support(*radius, *half_height, dir), None),
            Shape::Cylinder { radius, half_height } => (convex::cylinder_support(*radius, *half_height, dir), None),
            Shape::ConvexHull(hull) => {
                let (vertex, index) = hull.support(dir);
                (vertex, Some(index))
            }
            Shape::Compound(compound) => (compound.support(dir), None),
        }
    }

    /// Skin eroded support: rounded shapes report their core skeleton
    pub(crate) fn support_special(&self, dir: &Vec3, skin: f32) -> (Vec3, Option<usize>) {
        match self {
            Shape::Sphere { .. } => (Vec3::zeros(), Some(0)),
            Shape::Capsule { half_height, .. } => {
                let end = if dir.x >= 0.0 { 1 } else { 0 };
                (Vec3::new(if end == 1 { *half_height } else { -half_height }, 0.0, 0.0), Some(end))
            }
            Shape::Box { half_extents } => {
                let (vertex, index) = convex::box_special(half_extents, dir, skin);
                (vertex, Some(index))
            }
            Shape::Cylinder { radius, half_height } => {
                (convex::cylinder_special(*radius, *half_height, dir, skin), None)
            }
            Shape::Null | Shape::ConvexHull(_) | Shape::Compound(_) => self.support(dir),
        }
    }

    /// Inflate a point returned by [`Shape::support_special`] back to the surface
    pub(crate) fn special_project(&self, point: &Vec3, dir: &Vec3, skin: f32) -> Vec3 {
        let unit = crate::foundation::math::utils::try_normalize(dir).unwrap_or_else(Vec3::x);
        match self {
            Shape::Sphere { radius } | Shape::Capsule { radius, .. } => point + unit * *radius,
            Shape::Box { half_extents } => convex::box_project(half_extents, point, dir, skin),
            Shape::Cylinder { radius, half_height } => {
                convex::cylinder_project(*radius, *half_height, point, dir, skin)
            }
            Shape::Null | Shape::ConvexHull(_) | Shape::Compound(_) => *point,
        }
    }

    fn contains(&self, point: &Vec3) -> bool {
        match self {
            Shape::Null | Shape::Compound(_) => false,
            Shape::Sphere { radius } => convex::sphere_contains(*radius, point),
            Shape::Box { half_extents } => convex::box_contains(half_extents, point),
            Shape::Capsule { radius, half_height } => convex::capsule_contains(*radius, *half_height, point),
            Shape::Cylinder { radius, half_height } => convex::cylinder_contains(*radius, *half_height, point),
            Shape::ConvexHull(hull) => hull.contains(point),
        }
    }

    fn ray_entry(&self, segment: &Segment) -> Option<(f32, Vec3)> {
        match self {
            Shape::Null => None,
            Shape::Sphere { radius } => convex::sphere_entry(*radius, segment),
            Shape::Box { half_extents } => convex::box_entry(half_extents, segment),
            Shape::Capsule { radius, half_height } => convex::capsule_entry(*radius, *half_height, segment),
            Shape::Cylinder { radius, half_height } => convex::cylinder_entry(*radius, *half_height, segment),
            Shape::ConvexHull(hull) => hull.ray_cast_entry(segment),
            Shape::Compound(compound) => compound.ray_cast(segment),
        }
    }

    /// First boundary crossing in shape space: `(fraction, outward normal)`.
    ///
    /// A segment starting on the surface enters at fraction zero. A segment
    /// starting inside reports where it leaves the shape.
    pub(crate) fn ray_cast(&self, segment: &Segment) -> Option<(f32, Vec3)> {
        if segment.is_degenerate() {
            return None;
        }

        // back off the start so surface points classify as outside
        let delta = segment.delta();
        let length = delta.norm();
        let backoff = SURFACE_TOLERANCE * (1.0 + segment.p0.norm());
        let start = segment.p0 - delta * (backoff / length);

        if self.contains(&start) {
            if self.contains(&segment.p1) {
                return None;
            }
            let reversed = Segment::new(segment.p1, segment.p0);
            return self.ray_entry(&reversed).map(|(t, n)| (1.0 - t, n));
        }

        let extended = Segment::new(start, segment.p1);
        self.ray_entry(&extended)
            .map(|(t, n)| (((t * (length + backoff) - backoff) / length).max(0.0), n))
    }

    /// Contact section with the plane `normal . x = offset`, `normal` unit length
    pub(crate) fn plane_section(&self, normal: &Vec3, offset: f32) -> Vec<Vec3> {
        match self {
            Shape::Null => Vec::new(),
            Shape::Sphere { radius } => axis_section(*radius, 0.0, normal, offset),
            Shape::Capsule { radius, half_height } => axis_section(*radius, *half_height, normal, offset),
            Shape::Box { half_extents } => {
                convex::slice_polyhedron(&convex::box_vertices(half_extents), &convex::box_edges(), normal, offset)
            }
            Shape::Cylinder { radius, half_height } => {
                let (vertices, edges) = convex::cylinder_prism(*radius, *half_height);
                convex::slice_polyhedron(&vertices, &edges, normal, offset)
            }
            Shape::ConvexHull(hull) => convex::slice_polyhedron(hull.vertices(), &hull.edges(), normal, offset),
            Shape::Compound(compound) => compound.plane_section(normal, offset),
        }
    }

    pub(crate) fn moments(&self) -> Result<VolumeMoments, PhysicsError> {
        match self {
            Shape::Null => Err(PhysicsError::UnsupportedShape("null shape inertia")),
            Shape::Sphere { radius } => Ok(VolumeMoments::sphere(*radius)),
            Shape::Box { half_extents } => Ok(VolumeMoments::cuboid(half_extents)),
            Shape::Capsule { radius, half_height } => Ok(VolumeMoments::capsule(*radius, *half_height)),
            Shape::Cylinder { radius, half_height } => Ok(VolumeMoments::cylinder(*radius, *half_height)),
            Shape::ConvexHull(hull) => VolumeMoments::hull(hull),
            Shape::Compound(compound) => compound.moments(),
        }
    }

    /// Enclosed volume, zero for shapes without one
    pub fn volume(&self) -> f32 {
        self.moments().map_or(0.0, |m| m.volume)
    }

    /// Oriented box in shape space: `(origin, half_size)`
    pub fn obb(&self) -> (Vec3, Vec3) {
        match self {
            Shape::Null => (Vec3::zeros(), Vec3::zeros()),
            Shape::Sphere { radius } => (Vec3::zeros(), Vec3::repeat(*radius)),
            Shape::Box { half_extents } => (Vec3::zeros(), *half_extents),
            Shape::Capsule { radius, half_height } => {
                (Vec3::zeros(), Vec3::new(half_height + radius, *radius, *radius))
            }
            Shape::Cylinder { radius, half_height } => (Vec3::zeros(), Vec3::new(*half_height, *radius, *radius)),
            Shape::ConvexHull(hull) => {
                let (min, max) = hull.vertices().iter().fold(
                    (Vec3::repeat(f32::MAX), Vec3::repeat(f32::MIN)),
                    |(min, max), v| (min.inf(v), max.sup(v)),
                );
                ((min + max) * 0.5, (max - min) * 0.5)
            }
            Shape::Compound(compound) => compound.obb(),
        }
    }

    /// Number of discrete vertices the special support can select
    pub fn vertex_count(&self) -> usize {
        match self {
            Shape::Null => 0,
            Shape::Sphere { .. } => 1,
            Shape::Capsule { .. } => 2,
            Shape::Box { .. } => 8,
            Shape::Cylinder { .. } => 2 * convex::CYLINDER_SLICE_SEGMENTS,
            Shape::ConvexHull(hull) => hull.vertices().len(),
            Shape::Compound(compound) => compound.children().iter().map(ShapeInstance::convex_vertex_count).sum(),
        }
    }

    /// Flat faces for debug display, `None` for curved shapes
    pub(crate) fn debug_faces(&self) -> Option<Vec<Vec<Vec3>>> {
        match self {
            Shape::Box { half_extents } => {
                let v = convex::box_vertices(half_extents);
                // each face keeps one index bit fixed
                let faces = [
                    [0, 2, 6, 4], [1, 5, 7, 3],
                    [0, 4, 5, 1], [2, 3, 7, 6],
                    [0, 1, 3, 2], [4, 6, 7, 5],
                ];
                Some(faces.iter().map(|f| f.iter().map(|&i| v[i]).collect()).collect())
            }
            Shape::ConvexHull(hull) if hull.has_faces() => {
                Some(hull.triangles().map(|t| vec![t.v0, t.v1, t.v2]).collect())
            }
            _ => None,
        }
    }
}

/// Section of a sphere swept along X with the plane `normal . x = offset`
fn axis_section(radius: f32, half_height: f32, normal: &Vec3, offset: f32) -> Vec<Vec3> {
    // parallel axis: both ends touch
    const PARALLEL: f32 = 1.0e-3;

    let ends = [Vec3::new(-half_height, 0.0, 0.0), Vec3::new(half_height, 0.0, 0.0)];
    let dists = ends.map(|e| normal.dot(&e) - offset);
    if dists[0].min(dists[1]) > radius || dists[0].max(dists[1]) < -radius {
        return Vec::new();
    }

    let project = |p: Vec3| p - normal * (normal.dot(&p) - offset);
    if half_height > 0.0 && normal.x.abs() < PARALLEL {
        return ends.iter().map(|&e| project(e)).collect();
    }

    let x = if normal.x.abs() < PARALLEL {
        0.0
    } else {
        (offset / normal.x).clamp(-half_height, half_height)
    };
    vec![project(Vec3::new(x, 0.0, 0.0))]
}

/// Weak back-reference to a shared shape
#[derive(Debug, Clone, Default)]
pub struct WeakShape(Weak<RwLock<Shape>>);

impl WeakShape {
    /// The shape, if any instance still holds it
    pub fn upgrade(&self) -> Option<SharedShape> {
        self.0.upgrade().map(SharedShape)
    }
}

/// Reference counted shape shared by any number of instances
#[derive(Debug, Clone)]
pub struct SharedShape(Arc<RwLock<Shape>>);

fn positive(value: f32, what: &str) -> Result<f32, PhysicsError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidArgument(format!("{what} must be positive, got {value}")))
    }
}

impl SharedShape {
    /// Wrap a shape
    pub fn new(shape: Shape) -> Self {
        Self(Arc::new(RwLock::new(shape)))
    }

    /// Empty shape
    pub fn null() -> Self {
        Self::new(Shape::Null)
    }

    /// Sphere of `radius`
    pub fn sphere(radius: f32) -> Result<Self, PhysicsError> {
        Ok(Self::new(Shape::Sphere { radius: positive(radius, "sphere radius")? }))
    }

    /// Box with the given half extents
    pub fn cuboid(half_extents: Vec3) -> Result<Self, PhysicsError> {
        for c in half_extents.iter() {
            positive(*c, "box half extent")?;
        }
        Ok(Self::new(Shape::Box { half_extents }))
    }

    /// Capsule along X; `half_height` may be zero
    pub fn capsule(radius: f32, half_height: f32) -> Result<Self, PhysicsError> {
        let radius = positive(radius, "capsule radius")?;
        if !(half_height >= 0.0 && half_height.is_finite()) {
            return Err(PhysicsError::InvalidArgument(format!(
                "capsule half height must be non-negative, got {half_height}"
            )));
        }
        Ok(Self::new(Shape::Capsule { radius, half_height }))
    }

    /// Cylinder along X
    pub fn cylinder(radius: f32, half_height: f32) -> Result<Self, PhysicsError> {
        Ok(Self::new(Shape::Cylinder {
            radius: positive(radius, "cylinder radius")?,
            half_height: positive(half_height, "cylinder half height")?,
        }))
    }

    /// Convex hull
    pub fn convex_hull(hull: ConvexHull) -> Self {
        Self::new(Shape::ConvexHull(hull))
    }

    /// Empty compound; fill it with [`SharedShape::add_child`]
    pub fn compound() -> Self {
        Self::new(Shape::Compound(Compound::default()))
    }

    /// Read access. A poisoned lock is recovered; shapes hold no invariants a
    /// panicking writer could break halfway.
    pub fn read(&self) -> RwLockReadGuard<'_, Shape> {
        self.0.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Shape> {
        self.0.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Shape discriminant
    pub fn kind(&self) -> ShapeKind {
        self.read().kind()
    }

    /// Identity of the shared allocation, stable while any holder lives
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// True when both handles name the same shape
    pub fn ptr_eq(&self, other: &SharedShape) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live holders
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub(crate) fn downgrade(&self) -> WeakShape {
        WeakShape(Arc::downgrade(&self.0))
    }

    /// Edit the geometry in place; every instance sharing it sees the edit.
    ///
    /// Compounds are edited through [`SharedShape::add_child`] and
    /// [`SharedShape::remove_child`], and no shape may be turned into one.
    pub fn modify<R>(&self, edit: impl FnOnce(&mut Shape) -> R) -> Result<R, PhysicsError> {
        let mut guard = self.write();
        if guard.kind() == ShapeKind::Compound {
            return Err(PhysicsError::InvalidArgument(
                "compound shapes are edited through add_child/remove_child".to_string(),
            ));
        }
        let previous = guard.clone();
        let result = edit(&mut *guard);
        if guard.kind() == ShapeKind::Compound {
            *guard = previous;
            return Err(PhysicsError::NestedCompound);
        }
        Ok(result)
    }

    /// Append a child instance to a compound, returning its index
    pub fn add_child(&self, mut child: ShapeInstance) -> Result<usize, PhysicsError> {
        if child.shape().ptr_eq(self) || child.shape().kind() == ShapeKind::Compound {
            return Err(PhysicsError::NestedCompound);
        }

        let mut guard = self.write();
        let Shape::Compound(compound) = &mut *guard else {
            return Err(PhysicsError::InvalidArgument("add_child needs a compound shape".to_string()));
        };
        child.set_parent(Some(self.downgrade()));
        Ok(compound.push(child))
    }

    /// Take a child out of a compound; its parent link is cleared
    pub fn remove_child(&self, index: usize) -> Result<ShapeInstance, PhysicsError> {
        let mut guard = self.write();
        let Shape::Compound(compound) = &mut *guard else {
            return Err(PhysicsError::InvalidArgument("remove_child needs a compound shape".to_string()));
        };
        let mut child = compound.remove(index).ok_or_else(|| {
            PhysicsError::InvalidArgument(format!("compound has no child {index}"))
        })?;
        child.set_parent(None);
        Ok(child)
    }

    /// Number of compound children, zero for convex shapes
    pub fn child_count(&self) -> usize {
        match &*self.read() {
            Shape::Compound(compound) => compound.children().len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constructors_reject_bad_dimensions() {
        assert!(SharedShape::sphere(0.0).is_err());
        assert!(SharedShape::cuboid(Vec3::new(1.0, -1.0, 1.0)).is_err());
        assert!(SharedShape::capsule(1.0, f32::NAN).is_err());
        assert!(SharedShape::capsule(1.0, 0.0).is_ok());
    }

    #[test]
    fn test_sphere_ray_from_inside_reports_exit() {
        let shape = Shape::Sphere { radius: 1.0 };
        let segment = Segment::new(Vec3::zeros(), Vec3::new(4.0, 0.0, 0.0));
        let (t, n) = shape.ray_cast(&segment).unwrap();
        assert_relative_eq!(t, 0.25, epsilon = 1e-6);
        assert_relative_eq!(n, Vec3::x(), epsilon = 1e-6);
    }

    #[test]
    fn test_sphere_ray_from_surface_enters_at_start() {
        let radius = 1.3;
        let shape = Shape::Sphere { radius };
        for i in 0..40 {
            let polar = std::f32::consts::PI * (i as f32 + 0.5) / 40.0;
            for j in 0..40 {
                let azimuth = std::f32::consts::TAU * j as f32 / 40.0;
                let n = Vec3::new(polar.sin() * azimuth.cos(), polar.sin() * azimuth.sin(), polar.cos());
                let segment = Segment::new(n * radius, Vec3::zeros());
                let (t, normal) = shape.ray_cast(&segment).unwrap_or_else(|| panic!("missed from {:?}", n * radius));
                assert!(t.abs() < 1e-4, "fraction {t} from {:?}", n * radius);
                assert!(normal.dot(&n) > 0.99);
            }
        }
    }

    #[test]
    fn test_ray_from_face_enters_at_start() {
        let shapes = [
            Shape::Box { half_extents: Vec3::new(0.7, 1.1, 0.3) },
            Shape::Capsule { radius: 0.6, half_height: 0.9 },
            Shape::Cylinder { radius: 0.6, half_height: 0.9 },
            Shape::ConvexHull(ConvexHull::cuboid(Vec3::new(0.7, 1.1, 0.3)).unwrap()),
        ];
        for shape in &shapes {
            let top = shape.support(&Vec3::z()).0.z;
            for k in 0..25 {
                let p0 = Vec3::new(0.03 + 0.2 * k as f32 / 24.0, 0.0, top);
                let (t, normal) = shape.ray_cast(&Segment::new(p0, Vec3::zeros())).unwrap();
                assert!(t.abs() < 1e-4, "{:?} fraction {t} from {:?}", shape.kind(), p0);
                assert!(normal.z > 0.9);
            }
        }

        let sphere = Shape::Sphere { radius: 1.0 };
        assert!(sphere.ray_cast(&Segment::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0))).is_none());
    }

    #[test]
    fn test_capsule_section_lying_flat() {
        let shape = Shape::Capsule { radius: 0.5, half_height: 1.0 };
        let section = shape.plane_section(&Vec3::y(), -0.4);
        assert_eq!(section.len(), 2);
        for p in &section {
            assert_relative_eq!(p.y, -0.4, epsilon = 1e-6);
        }

        let upright = shape.plane_section(&Vec3::x(), -1.2);
        assert_eq!(upright.len(), 1);
        assert_relative_eq!(upright[0], Vec3::new(-1.2, 0.0, 0.0), epsilon = 1e-6);

        assert!(shape.plane_section(&Vec3::y(), 2.0).is_empty());
    }

    #[test]
    fn test_modify_cannot_create_compound() {
        let shape = SharedShape::sphere(1.0).unwrap();
        let result = shape.modify(|s| *s = Shape::Compound(Compound::default()));
        assert!(matches!(result, Err(PhysicsError::NestedCompound)));
        assert_eq!(shape.kind(), ShapeKind::Sphere);
    }
}
