//! Scene contact sources
//!
//! The world does not run a general narrow phase. Instead a
//! [`SceneContacts`] implementation resolves, once per tick, the contacts
//! every body sees against the static scene.

use crate::foundation::collections::{BodyHandle, BodyMap, SecondaryMap};
use crate::foundation::math::{utils, Vec3};
use crate::physics::body::PhysicsBody;
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::error::PhysicsError;
use crate::physics::primitives::ContactPoint;
use crate::physics::shape::{ShapeInstance, ShapeMaterial};

/// Resolves the contacts of all bodies for one tick
pub trait SceneContacts: Send + Sync {
    /// Contacts per body, normals pointing into the body
    fn resolve_contacts(&mut self, bodies: &BodyMap<Box<dyn PhysicsBody>>) -> SecondaryMap<BodyHandle, Vec<ContactPoint>>;
}

/// Empty scene
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContacts;

impl SceneContacts for NoContacts {
    fn resolve_contacts(&mut self, _bodies: &BodyMap<Box<dyn PhysicsBody>>) -> SecondaryMap<BodyHandle, Vec<ContactPoint>> {
        SecondaryMap::new()
    }
}

/// Infinite ground plane, optionally moving like a conveyor
#[derive(Debug, Clone)]
pub struct PlaneGroundContacts {
    normal: Vec3,
    point: Vec3,
    material: ShapeMaterial,
    velocity: Vec3,
}

impl PlaneGroundContacts {
    /// Plane through `point` facing `normal`
    pub fn new(normal: Vec3, point: Vec3) -> Result<Self, PhysicsError> {
        let normal = utils::try_normalize(&normal)
            .ok_or_else(|| PhysicsError::InvalidArgument("ground normal is degenerate".to_string()))?;
        if !utils::is_finite(&point) {
            return Err(PhysicsError::InvalidArgument("ground point must be finite".to_string()));
        }
        Ok(Self {
            normal,
            point,
            material: ShapeMaterial {
                layer: CollisionLayers::STATIC,
                ..ShapeMaterial::default()
            },
            velocity: Vec3::zeros(),
        })
    }

    /// Horizontal ground at height `y`
    pub fn horizontal(y: f32) -> Self {
        Self {
            normal: Vec3::y(),
            point: Vec3::new(0.0, y, 0.0),
            material: ShapeMaterial {
                layer: CollisionLayers::STATIC,
                ..ShapeMaterial::default()
            },
            velocity: Vec3::zeros(),
        }
    }

    /// Surface velocity reported with every contact
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Replace the ground material
    pub fn with_material(mut self, material: ShapeMaterial) -> Self {
        self.material = material;
        self
    }

    /// Plane normal
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Contacts of one instance already placed by its global matrix
    pub fn contacts_for(&self, instance: &ShapeInstance) -> Vec<ContactPoint> {
        if !instance.collision_mode() || !instance.material().collides_with(&self.material) {
            return Vec::new();
        }

        let frame = instance.frame();
        let local_normal = frame.unrotate_vector(&self.normal);
        let deepest = frame.transform_point(&instance.support_vertex(&-local_normal));
        let penetration = self.normal.dot(&(self.point - deepest));
        if penetration < -instance.skin_margin() {
            return Vec::new();
        }

        let mut points: Vec<Vec3> = instance
            .calculate_plane_intersection(&local_normal, &frame.untransform_point(&self.point))
            .iter()
            .map(|p| frame.transform_point(p))
            .collect();
        if points.is_empty() {
            points.push(deepest);
        }

        points
            .iter()
            .zip(0u32..)
            .map(|(p, id)| {
                let on_plane = p - self.normal * self.normal.dot(&(p - self.point));
                ContactPoint {
                    other_velocity: self.velocity,
                    ..ContactPoint::new(on_plane, self.normal, penetration, id)
                }
            })
            .collect()
    }
}

impl SceneContacts for PlaneGroundContacts {
    fn resolve_contacts(&mut self, bodies: &BodyMap<Box<dyn PhysicsBody>>) -> SecondaryMap<BodyHandle, Vec<ContactPoint>> {
        let mut resolved = SecondaryMap::new();
        for (handle, body) in bodies {
            let contacts = self.contacts_for(body.kinematic().shape());
            if !contacts.is_empty() {
                resolved.insert(handle, contacts);
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::physics::shape::SharedShape;
    use approx::assert_relative_eq;

    fn placed_sphere(y: f32) -> ShapeInstance {
        let mut instance = ShapeInstance::new(SharedShape::sphere(1.0).unwrap());
        instance.update_global_matrix(&Transform::from_position(Vec3::new(0.0, y, 0.0)));
        instance
    }

    #[test]
    fn test_resting_sphere_touches_once() {
        let ground = PlaneGroundContacts::horizontal(0.0);
        let contacts = ground.contacts_for(&placed_sphere(0.99));
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].position, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(contacts[0].penetration, 0.01, epsilon = 1e-5);
        assert_eq!(contacts[0].normal, Vec3::y());
    }

    #[test]
    fn test_skin_margin_and_separation() {
        let ground = PlaneGroundContacts::horizontal(0.0);
        let within_skin = ground.contacts_for(&placed_sphere(1.005));
        assert_eq!(within_skin.len(), 1);
        assert!(within_skin[0].penetration < 0.0);
        assert!(ground.contacts_for(&placed_sphere(2.0)).is_empty());
    }

    #[test]
    fn test_box_face_contact_has_four_corners() {
        let ground = PlaneGroundContacts::horizontal(0.0);
        let mut instance = ShapeInstance::new(SharedShape::cuboid(Vec3::new(1.0, 0.5, 1.0)).unwrap());
        instance.update_global_matrix(&Transform::from_position(Vec3::new(0.0, 0.45, 0.0)));
        let contacts = ground.contacts_for(&instance);
        assert_eq!(contacts.len(), 4);
        for contact in &contacts {
            assert_relative_eq!(contact.position.y, 0.0, epsilon = 1e-5);
            assert_relative_eq!(contact.penetration, 0.05, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_layer_filtering() {
        let ground = PlaneGroundContacts::horizontal(0.0);
        let mut instance = placed_sphere(0.5);
        instance.material_mut().mask = CollisionLayers::PLAYER;
        assert!(ground.contacts_for(&instance).is_empty());
    }

    #[test]
    fn test_rejects_degenerate_normal() {
        assert!(PlaneGroundContacts::new(Vec3::zeros(), Vec3::zeros()).is_err());
    }
}
