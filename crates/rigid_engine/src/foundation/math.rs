//! Math utilities and types
//!
//! Provides the fundamental math types used by the shape and body layers.
//! Column-vector convention throughout: `a.combine(&b)` applies `b` first.

pub use nalgebra::{
    Vector3,
    Matrix3,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid transform: rotation followed by translation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a transform from an orthonormal rotation matrix and a position
    pub fn from_rotation_matrix(rotation: &Mat3, position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::from_matrix(rotation),
        }
    }

    /// Rotation part as a 3x3 matrix
    pub fn rotation_matrix(&self) -> Mat3 {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    /// Apply the inverse of this transform to a point
    pub fn untransform_point(&self, point: &Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(point - self.position))
    }

    /// Rotate a vector (translation ignored)
    pub fn rotate_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Rotate a vector by the inverse rotation
    pub fn unrotate_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(vector)
    }

    /// Combine this transform with another (`other` is applied first)
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.inverse();
        Transform {
            position: inv_rotation * (-self.position),
            rotation: inv_rotation,
        }
    }
}

/// General affine map: `linear * p + translation`
///
/// Used for the scaled shape transforms, which are not rigid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    /// Linear part (rotation, scale and alignment combined)
    pub linear: Mat3,
    /// Translation part
    pub translation: Vec3,
}

impl Affine {
    /// Identity map
    pub fn identity() -> Self {
        Self {
            linear: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Build from parts
    pub fn new(linear: Mat3, translation: Vec3) -> Self {
        Self { linear, translation }
    }

    /// Map a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.linear * point + self.translation
    }

    /// Map a direction (no translation)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.linear * vector
    }

    /// Compose `self` after `other`
    pub fn combine(&self, other: &Affine) -> Affine {
        Affine {
            linear: self.linear * other.linear,
            translation: self.linear * other.translation + self.translation,
        }
    }
}

impl From<Transform> for Affine {
    fn from(transform: Transform) -> Self {
        Self {
            linear: transform.rotation_matrix(),
            translation: transform.position,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Wrap an angle into `[-PI, PI)`
    pub fn wrap_angle(angle: f32) -> f32 {
        (angle + constants::PI).rem_euclid(constants::TAU) - constants::PI
    }

    /// Normalize, or `None` when the vector is too short to have a direction
    pub fn try_normalize(v: &Vec3) -> Option<Vec3> {
        let len_sq = v.norm_squared();
        if len_sq > 1.0e-12 && len_sq.is_finite() {
            Some(v / len_sq.sqrt())
        } else {
            None
        }
    }

    /// True when every component is finite
    pub fn is_finite(v: &Vec3) -> bool {
        v.iter().all(|c| c.is_finite())
    }

    /// Replace non-finite components with zero
    pub fn sanitize(v: &Vec3) -> Vec3 {
        v.map(|c| if c.is_finite() { c } else { 0.0 })
    }

    /// Any unit vector perpendicular to `n`
    pub fn any_perpendicular(n: &Vec3) -> Vec3 {
        let helper = if n.x.abs() < 0.57 { Vec3::x() } else { Vec3::y() };
        n.cross(&helper).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_combine_and_inverse() {
        let a = Transform::from_position_rotation(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
        );
        let b = Transform::from_position(Vec3::new(-2.0, 0.5, 4.0));
        let p = Vec3::new(0.3, -1.0, 2.0);

        let combined = a.combine(&b);
        assert_relative_eq!(
            combined.transform_point(&p),
            a.transform_point(&b.transform_point(&p)),
            epsilon = 1e-5
        );

        let back = a.inverse().transform_point(&a.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-5);
        assert_relative_eq!(a.untransform_point(&a.transform_point(&p)), p, epsilon = 1e-5);
    }

    #[test]
    fn test_affine_combine() {
        let scale = Affine::new(Mat3::from_diagonal(&Vec3::new(2.0, 0.5, 4.0)), Vec3::zeros());
        let placed: Affine = Transform::from_position(Vec3::new(1.0, 0.0, -1.0)).into();
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(placed.combine(&scale).transform_point(&p), Vec3::new(3.0, 1.0, 11.0), epsilon = 1e-5);
        assert_relative_eq!(placed.transform_vector(&p), p, epsilon = 1e-6);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(utils::wrap_angle(1.5 * constants::PI), -0.5 * constants::PI, epsilon = 1e-5);
        assert_relative_eq!(utils::wrap_angle(0.25), 0.25, epsilon = 1e-6);
    }
}
