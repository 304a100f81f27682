//! Volume integrals for inertia computation
//!
//! Shapes report their volume, centroid and second moment `E[x x^T]` about
//! the origin. Moments compose under affine maps and volume weighted sums,
//! which is all compounds and scaled instances need. The inertia tensor per
//! unit mass about the centroid is derived at the end.

use crate::foundation::math::{constants::PI, Affine, Mat3, Vec3};
use crate::physics::error::PhysicsError;
use crate::physics::shape::hull::ConvexHull;

/// Mass properties of a shape instance, per unit mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Enclosed volume
    pub volume: f32,
    /// Centre of mass
    pub center_of_mass: Vec3,
    /// Inertia tensor per unit mass about the centre of mass
    pub inertia: Mat3,
}

impl MassProperties {
    /// Box approximation, used when a shape has no closed form
    pub fn from_box(center: Vec3, half_extents: Vec3) -> Self {
        let moments = VolumeMoments::cuboid(&half_extents).transformed(&Affine::new(Mat3::identity(), center));
        moments.mass_properties()
    }

    /// Inertia scaled to a body of `mass`
    pub fn inertia_for_mass(&self, mass: f32) -> Mat3 {
        self.inertia * mass
    }
}

/// Volume, mean and second moment of a solid
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VolumeMoments {
    pub volume: f32,
    pub mean: Vec3,
    pub second: Mat3,
}

impl VolumeMoments {
    pub fn zero() -> Self {
        Self {
            volume: 0.0,
            mean: Vec3::zeros(),
            second: Mat3::zeros(),
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self {
            volume: 4.0 / 3.0 * PI * radius.powi(3),
            mean: Vec3::zeros(),
            second: Mat3::identity() * (radius * radius / 5.0),
        }
    }

    pub fn cuboid(half: &Vec3) -> Self {
        Self {
            volume: 8.0 * half.x * half.y * half.z,
            mean: Vec3::zeros(),
            second: Mat3::from_diagonal(&half.map(|h| h * h / 3.0)),
        }
    }

    /// Cylinder along X
    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        let r2 = radius * radius;
        Self {
            volume: 2.0 * PI * r2 * half_height,
            mean: Vec3::zeros(),
            second: Mat3::from_diagonal(&Vec3::new(half_height * half_height / 3.0, r2 / 4.0, r2 / 4.0)),
        }
    }

    /// Capsule along X: a cylinder plus two hemispherical caps
    pub fn capsule(radius: f32, half_height: f32) -> Self {
        let r2 = radius * radius;
        let caps = Self {
            volume: 4.0 / 3.0 * PI * radius.powi(3),
            mean: Vec3::zeros(),
            // cap centroid sits 3r/8 beyond the segment end
            second: Mat3::from_diagonal(&Vec3::new(
                r2 / 5.0 + 0.75 * half_height * radius + half_height * half_height,
                r2 / 5.0,
                r2 / 5.0,
            )),
        };
        Self::cylinder(radius, half_height).combined(&caps)
    }

    /// Tetrahedral decomposition of a closed, outward wound hull
    pub fn hull(hull: &ConvexHull) -> Result<Self, PhysicsError> {
        if !hull.has_faces() {
            return Err(PhysicsError::UnsupportedShape("point cloud hull inertia"));
        }

        let origin = hull.centroid();
        let mut volume = 0.0;
        let mut first = Vec3::zeros();
        let mut second = Mat3::zeros();
        for tri in hull.triangles() {
            let (a, b, c) = (tri.v0 - origin, tri.v1 - origin, tri.v2 - origin);
            let v = a.dot(&b.cross(&c)) / 6.0;
            let s = a + b + c;
            volume += v;
            first += s * (v / 4.0);
            second += (a * a.transpose() + b * b.transpose() + c * c.transpose() + s * s.transpose()) * (v / 20.0);
        }

        if !(volume > 0.0) {
            return Err(PhysicsError::UnsupportedShape("flat hull inertia"));
        }

        let local = Self {
            volume,
            mean: first / volume,
            second: second / volume,
        };
        Ok(local.transformed(&Affine::new(Mat3::identity(), origin)))
    }

    /// Moments of the image of the solid under `map`
    pub fn transformed(&self, map: &Affine) -> Self {
        let l = map.linear;
        let t = map.translation;
        let lm = l * self.mean;
        Self {
            volume: self.volume * l.determinant().abs(),
            mean: lm + t,
            second: l * self.second * l.transpose() + lm * t.transpose() + t * lm.transpose() + t * t.transpose(),
        }
    }

    /// Volume weighted union of two disjoint solids
    pub fn combined(&self, other: &Self) -> Self {
        let volume = self.volume + other.volume;
        if volume <= 0.0 {
            return Self::zero();
        }
        let (wa, wb) = (self.volume / volume, other.volume / volume);
        Self {
            volume,
            mean: self.mean * wa + other.mean * wb,
            second: self.second * wa + other.second * wb,
        }
    }

    /// Inertia about the centroid, `tr(C) I - C` for the central moment `C`
    pub fn mass_properties(&self) -> MassProperties {
        let central = self.second - self.mean * self.mean.transpose();
        MassProperties {
            volume: self.volume,
            center_of_mass: self.mean,
            inertia: Mat3::identity() * central.trace() - central,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_inertia() {
        let props = VolumeMoments::sphere(2.0).mass_properties();
        assert_relative_eq!(props.inertia, Mat3::identity() * (0.4 * 4.0), epsilon = 1e-5);
        assert_relative_eq!(props.volume, 4.0 / 3.0 * PI * 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_hull_matches_box() {
        let half = Vec3::new(1.0, 2.0, 0.5);
        let hull = ConvexHull::cuboid(half).unwrap();
        let from_hull = VolumeMoments::hull(&hull).unwrap().mass_properties();
        let from_box = VolumeMoments::cuboid(&half).mass_properties();
        assert_relative_eq!(from_hull.volume, from_box.volume, epsilon = 1e-4);
        assert_relative_eq!(from_hull.center_of_mass, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(from_hull.inertia, from_box.inertia, epsilon = 1e-4);
    }

    #[test]
    fn test_parallel_axis() {
        let offset = Vec3::new(3.0, 0.0, 0.0);
        let moments = VolumeMoments::sphere(1.0).transformed(&Affine::new(Mat3::identity(), offset));
        let props = moments.mass_properties();
        // central inertia is unchanged by a translation
        assert_relative_eq!(props.center_of_mass, offset, epsilon = 1e-6);
        assert_relative_eq!(props.inertia, Mat3::identity() * 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_capsule_reduces_to_sphere() {
        let capsule = VolumeMoments::capsule(1.0, 0.0).mass_properties();
        assert_relative_eq!(capsule.inertia, Mat3::identity() * 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_point_cloud_unsupported() {
        let hull = ConvexHull::from_points(vec![Vec3::zeros(), Vec3::x()]).unwrap();
        assert!(matches!(VolumeMoments::hull(&hull), Err(PhysicsError::UnsupportedShape(_))));
    }
}
