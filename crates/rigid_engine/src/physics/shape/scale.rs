//! Scale envelope of a shape instance
//!
//! The instance maps shape space into its parent frame through
//! `local_matrix * diag(scale) * alignment`. The alignment rotation is only
//! non-identity for [`ScaleType::Global`], which arises when a non-uniform
//! scale is applied in a frame that is rotated relative to the shape.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat3, Vec3};
use crate::physics::error::PhysicsError;

/// Relative tolerance used to classify scale proportions
const SCALE_TOLERANCE: f32 = 1.0e-4;

/// Scale classification, picks the fast path of every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleType {
    /// `scale == (1, 1, 1)`, no scale math at all
    Unit,
    /// All three components equal
    Uniform,
    /// Axis aligned non-uniform scale
    NonUniform,
    /// Non-uniform scale with a shape-side alignment rotation
    Global,
}

/// Scale, its inverse and the alignment rotation, always consistent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleEnvelope {
    scale: Vec3,
    inv_scale: Vec3,
    max_scale: f32,
    scale_type: ScaleType,
    alignment: Mat3,
}

impl Default for ScaleEnvelope {
    fn default() -> Self {
        Self::unit()
    }
}

fn validate(scale: &Vec3) -> Result<(), PhysicsError> {
    if scale.iter().all(|c| c.is_finite() && *c > 0.0) {
        Ok(())
    } else {
        Err(PhysicsError::InvalidScale(*scale))
    }
}

fn is_identity(m: &Mat3) -> bool {
    (m - Mat3::identity()).abs().max() < SCALE_TOLERANCE
}

impl ScaleEnvelope {
    /// The identity envelope
    pub fn unit() -> Self {
        Self {
            scale: Vec3::repeat(1.0),
            inv_scale: Vec3::repeat(1.0),
            max_scale: 1.0,
            scale_type: ScaleType::Unit,
            alignment: Mat3::identity(),
        }
    }

    /// Axis aligned scale.
    ///
    /// Near-uniform scales snap to their x component and near-unit scales
    /// snap to exactly one, so the stored scale always agrees with the type.
    pub fn new(scale: Vec3) -> Result<Self, PhysicsError> {
        validate(&scale)?;

        let max = scale.max();
        let uniform = (scale.x - scale.y).abs() <= SCALE_TOLERANCE * max
            && (scale.x - scale.z).abs() <= SCALE_TOLERANCE * max;

        if uniform && (scale.x - 1.0).abs() <= SCALE_TOLERANCE {
            return Ok(Self::unit());
        }

        let (scale, scale_type) = if uniform {
            (Vec3::repeat(scale.x), ScaleType::Uniform)
        } else {
            (scale, ScaleType::NonUniform)
        };

        Ok(Self {
            scale,
            inv_scale: scale.map(f32::recip),
            max_scale: scale.max(),
            scale_type,
            alignment: Mat3::identity(),
        })
    }

    /// Scale applied after an alignment rotation.
    ///
    /// Falls back to the axis aligned classification when the alignment is
    /// the identity or the scale is uniform.
    pub fn global(scale: Vec3, alignment: Mat3) -> Result<Self, PhysicsError> {
        let envelope = Self::new(scale)?;
        if is_identity(&alignment) || matches!(envelope.scale_type, ScaleType::Unit | ScaleType::Uniform) {
            return Ok(envelope);
        }
        Ok(Self {
            scale_type: ScaleType::Global,
            alignment,
            ..envelope
        })
    }

    /// Scale per axis
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Component-wise inverse of the scale
    pub fn inv_scale(&self) -> Vec3 {
        self.inv_scale
    }

    /// Largest scale component
    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    /// Scale classification
    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    /// Shape-side alignment rotation
    pub fn alignment(&self) -> Mat3 {
        self.alignment
    }

    /// `diag(scale) * alignment`
    pub fn linear(&self) -> Mat3 {
        match self.scale_type {
            ScaleType::Unit => Mat3::identity(),
            ScaleType::Uniform | ScaleType::NonUniform => Mat3::from_diagonal(&self.scale),
            ScaleType::Global => Mat3::from_diagonal(&self.scale) * self.alignment,
        }
    }

    /// Volume ratio between the scaled and the unscaled shape
    pub fn volume_factor(&self) -> f32 {
        self.scale.x * self.scale.y * self.scale.z
    }

    /// Direction to query the unscaled shape with, `linear^T * dir`.
    ///
    /// Uniform scale does not change support directions.
    pub fn shape_direction(&self, dir: &Vec3) -> Vec3 {
        match self.scale_type {
            ScaleType::Unit | ScaleType::Uniform => *dir,
            ScaleType::NonUniform => self.scale.component_mul(dir),
            ScaleType::Global => self.alignment.transpose() * self.scale.component_mul(dir),
        }
    }

    /// Map a shape space point into instance space
    pub fn scale_point(&self, point: &Vec3) -> Vec3 {
        match self.scale_type {
            ScaleType::Unit => *point,
            ScaleType::Uniform => point * self.scale.x,
            ScaleType::NonUniform => self.scale.component_mul(point),
            ScaleType::Global => self.scale.component_mul(&(self.alignment * point)),
        }
    }

    /// Map an instance space point back into shape space
    pub fn unscale_point(&self, point: &Vec3) -> Vec3 {
        match self.scale_type {
            ScaleType::Unit => *point,
            ScaleType::Uniform => point * self.inv_scale.x,
            ScaleType::NonUniform => self.inv_scale.component_mul(point),
            ScaleType::Global => self.alignment.transpose() * self.inv_scale.component_mul(point),
        }
    }

    /// Map a shape space normal into instance space (not normalized)
    pub fn scale_normal(&self, normal: &Vec3) -> Vec3 {
        match self.scale_type {
            ScaleType::Unit | ScaleType::Uniform => *normal,
            ScaleType::NonUniform => self.inv_scale.component_mul(normal),
            ScaleType::Global => self.inv_scale.component_mul(&(self.alignment * normal)),
        }
    }
}

/// Split `m` into `rotation * diag(scale) * alignment`.
///
/// Both rotations are proper (determinant +1). `m` must have a positive
/// determinant.
pub fn polar_decompose(m: &Mat3) -> Result<(Mat3, Vec3, Mat3), PhysicsError> {
    let svd = m.svd(true, true);
    let (Some(mut u), Some(mut v_t)) = (svd.u, svd.v_t) else {
        return Err(PhysicsError::InvalidArgument(
            "scale matrix could not be decomposed".to_string(),
        ));
    };

    // Both factors are reflections when one is, since det(m) > 0
    if u.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
        v_t.row_mut(2).neg_mut();
    }

    Ok((u, svd.singular_values, v_t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_classification() {
        assert_eq!(ScaleEnvelope::new(Vec3::repeat(1.0)).unwrap().scale_type(), ScaleType::Unit);
        assert_eq!(ScaleEnvelope::new(Vec3::repeat(2.0)).unwrap().scale_type(), ScaleType::Uniform);
        assert_eq!(
            ScaleEnvelope::new(Vec3::new(1.0, 2.0, 1.0)).unwrap().scale_type(),
            ScaleType::NonUniform
        );
    }

    #[test]
    fn test_rejects_degenerate_scale() {
        assert!(ScaleEnvelope::new(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(ScaleEnvelope::new(Vec3::new(-1.0, 1.0, 1.0)).is_err());
        assert!(ScaleEnvelope::new(Vec3::new(f32::NAN, 1.0, 1.0)).is_err());
        assert!(ScaleEnvelope::new(Vec3::new(f32::INFINITY, 1.0, 1.0)).is_err());
    }

    #[test]
    fn test_point_round_trip_global() {
        let alignment = Quat::from_axis_angle(&Vec3::z_axis(), 0.4)
            .to_rotation_matrix()
            .into_inner();
        let envelope = ScaleEnvelope::global(Vec3::new(1.0, 3.0, 0.5), alignment).unwrap();
        assert_eq!(envelope.scale_type(), ScaleType::Global);

        let p = Vec3::new(0.2, -1.0, 4.0);
        assert_relative_eq!(envelope.unscale_point(&envelope.scale_point(&p)), p, epsilon = 1e-5);
        assert_relative_eq!(envelope.scale_point(&p), envelope.linear() * p, epsilon = 1e-5);
    }

    #[test]
    fn test_polar_decompose_reconstructs() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), 0.9)
            .to_rotation_matrix()
            .into_inner();
        let m = Mat3::from_diagonal(&Vec3::new(2.0, 1.0, 0.5)) * rotation;

        let (u, s, v_t) = polar_decompose(&m).unwrap();
        assert_relative_eq!(u.determinant(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(v_t.determinant(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(u * Mat3::from_diagonal(&s) * v_t, m, epsilon = 1e-4);
    }
}
