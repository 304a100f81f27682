//! Kinematic body: script driven pose, velocities and one collision shape

use crate::foundation::math::{Mat3, Quat, Transform, Vec3};
use crate::physics::body::PhysicsBody;
use crate::physics::error::PhysicsError;
use crate::physics::primitives::Aabb;
use crate::physics::shape::{MassProperties, ShapeInstance};

/// Body moved by its own velocities; contacts never push it
#[derive(Debug, Clone)]
pub struct KinematicBody {
    matrix: Transform,
    veloc: Vec3,
    omega: Vec3,
    mass: f32,
    inv_mass: f32,
    center_of_mass: Vec3,
    inertia: Mat3,
    inv_inertia: Mat3,
    gravity: Vec3,
    shape: ShapeInstance,
    aabb: Aabb,
}

impl KinematicBody {
    /// Body at the origin owning `shape`.
    ///
    /// Shapes without closed form inertia fall back to their bounding box.
    pub fn new(shape: ShapeInstance, mass: f32) -> Result<Self, PhysicsError> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(PhysicsError::InvalidArgument(format!("body mass must be positive, got {mass}")));
        }

        let props = match shape.calculate_inertia() {
            Ok(props) => props,
            Err(err) => {
                let aabb = shape.calculate_aabb(shape.local_matrix());
                log::warn!("{}; approximating inertia with the bounding box {:?}", err, aabb);
                MassProperties::from_box(aabb.center(), aabb.extents())
            }
        };

        let inertia = props.inertia_for_mass(mass);
        let mut body = Self {
            matrix: Transform::identity(),
            veloc: Vec3::zeros(),
            omega: Vec3::zeros(),
            mass,
            inv_mass: 1.0 / mass,
            center_of_mass: props.center_of_mass,
            inertia,
            inv_inertia: inertia.try_inverse().unwrap_or_else(Mat3::zeros),
            gravity: Vec3::zeros(),
            shape,
            aabb: Aabb::default(),
        };
        body.refresh();
        Ok(body)
    }

    /// Body pose
    pub fn matrix(&self) -> &Transform {
        &self.matrix
    }

    /// Teleport the body
    pub fn set_matrix(&mut self, matrix: Transform) {
        self.matrix = matrix;
        self.refresh();
    }

    /// Linear velocity
    pub fn velocity(&self) -> Vec3 {
        self.veloc
    }

    /// Set the linear velocity
    pub fn set_velocity(&mut self, veloc: Vec3) {
        self.veloc = veloc;
    }

    /// Angular velocity
    pub fn omega(&self) -> Vec3 {
        self.omega
    }

    /// Set the angular velocity
    pub fn set_omega(&mut self, omega: Vec3) {
        self.omega = omega;
    }

    /// Mass
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Centre of mass in the body frame
    pub fn center_of_mass(&self) -> Vec3 {
        self.center_of_mass
    }

    /// Inertia tensor in the body frame
    pub fn inertia(&self) -> &Mat3 {
        &self.inertia
    }

    /// Inverse inertia tensor in the body frame
    pub fn inv_inertia(&self) -> &Mat3 {
        &self.inv_inertia
    }

    /// Override the inverse inertia; zero locks rotation under contact
    pub fn set_inv_inertia(&mut self, inv_inertia: Mat3) {
        self.inv_inertia = inv_inertia;
    }

    /// Gravity acting on bodies that choose to integrate it
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Set the gravity
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Collision shape
    pub fn shape(&self) -> &ShapeInstance {
        &self.shape
    }

    /// Mutable collision shape; call [`Self::refresh`] after moving or scaling it
    pub fn shape_mut(&mut self) -> &mut ShapeInstance {
        &mut self.shape
    }

    /// World bounding box as of the last refresh
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Recompute the shape's global matrix and the world bounding box
    pub fn refresh(&mut self) {
        self.shape.update_global_matrix(&self.matrix);
        self.aabb = self.shape.calculate_aabb(&self.shape.frame());
    }

    /// Advance the pose by the current velocities
    pub fn integrate(&mut self, timestep: f32) {
        if !(timestep > 0.0 && timestep.is_finite()) {
            return;
        }
        self.matrix.position += self.veloc * timestep;
        let spin = Quat::from_scaled_axis(self.omega * timestep);
        self.matrix.rotation = Quat::new_normalize((spin * self.matrix.rotation).into_inner());
        self.refresh();
    }
}

impl PhysicsBody for KinematicBody {
    fn kinematic(&self) -> &KinematicBody {
        self
    }

    fn kinematic_mut(&mut self) -> &mut KinematicBody {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::shape::SharedShape;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_body_inertia() {
        let body = KinematicBody::new(ShapeInstance::new(SharedShape::sphere(1.0).unwrap()), 10.0).unwrap();
        assert_relative_eq!(*body.inertia(), Mat3::identity() * 4.0, epsilon = 1e-4);
        assert_relative_eq!(*body.inv_inertia(), Mat3::identity() * 0.25, epsilon = 1e-4);
        assert_relative_eq!(body.inv_mass(), 0.1);
    }

    #[test]
    fn test_null_shape_falls_back_to_box() {
        let body = KinematicBody::new(ShapeInstance::new(SharedShape::null()), 2.0).unwrap();
        // padded bounding box of a point is a small cube
        assert!(body.inertia().diagonal().iter().all(|c| *c > 0.0));
    }

    #[test]
    fn test_rejects_bad_mass() {
        let shape = ShapeInstance::new(SharedShape::sphere(1.0).unwrap());
        assert!(KinematicBody::new(shape.clone(), 0.0).is_err());
        assert!(KinematicBody::new(shape, f32::NAN).is_err());
    }

    #[test]
    fn test_integrate_moves_aabb() {
        let mut body = KinematicBody::new(ShapeInstance::new(SharedShape::sphere(1.0).unwrap()), 1.0).unwrap();
        body.set_velocity(Vec3::new(6.0, 0.0, 0.0));
        body.set_omega(Vec3::new(0.0, 1.0, 0.0));
        body.integrate(0.5);

        assert_relative_eq!(body.matrix().position, Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(body.matrix().rotation.angle(), 0.5, epsilon = 1e-5);
        assert_relative_eq!(body.aabb().center(), Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(body.shape().global_matrix().position, Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-6);

        body.integrate(0.0);
        assert_relative_eq!(body.matrix().position, Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-6);
    }
}
