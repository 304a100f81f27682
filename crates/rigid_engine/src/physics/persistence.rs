//! Save and load of shapes, instances and bodies
//!
//! Shapes are written once per document no matter how many instances share
//! them. [`ShapeSaveCache`] hands out ids keyed by shape identity while
//! saving and [`ShapeLoaderCache`] maps the ids back to one [`SharedShape`]
//! each while loading, so sharing survives a round trip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{Mat3, Quat, Transform, Vec3};
use crate::physics::body::{KinematicBody, PhysicsBody, PlayerCapsuleBody};
use crate::physics::error::PhysicsError;
use crate::physics::shape::{ConvexHull, ScaleEnvelope, ScaleType, Shape, ShapeInstance, ShapeMaterial, SharedShape};
use crate::physics::world::PhysicsWorld;

/// Serialised shape geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeDescriptor {
    /// Empty shape
    Null,
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Box
    Box {
        /// Half size per axis
        half_extents: Vec3,
    },
    /// Capsule along X
    Capsule {
        /// Cap radius
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
    ConvexHull {
        /// Vertices
        vertices: Vec<Vec3>,
        /// Outward facing triangles, may be empty
        faces: Vec<[u32; 3]>,
    },
    /// Compound; children reference shapes saved before it
    Compound {
        /// Child instances
        children: Vec<InstanceDescriptor>,
    },
}

/// A shape with its document id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// Id referenced by instance descriptors
    pub id: u32,
    /// Geometry
    pub descriptor: ShapeDescriptor,
}

/// Serialised shape instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Id of the shared shape
    pub shape_id: u32,
    /// Placement in the parent frame
    pub local_matrix: Transform,
    /// Scale per axis
    pub scale: Vec3,
    /// Scale type when saved
    pub scale_type: ScaleType,
    /// Alignment of a global scale
    pub alignment: Quat,
    /// Material
    pub material: ShapeMaterial,
    /// Whether the instance generates contacts
    pub collision_mode: bool,
    /// Contact skin
    pub skin_margin: f32,
}

/// Serialised kinematic body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    /// Pose
    pub matrix: Transform,
    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity
    pub omega: Vec3,
    /// Mass
    pub mass: f32,
    /// Collision shape
    pub shape: InstanceDescriptor,
}

/// Serialised player capsule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCapsuleDescriptor {
    /// Pose
    pub matrix: Transform,
    /// Linear velocity
    pub velocity: Vec3,
    /// Columns front, up, right
    pub local_axis: Mat3,
    /// Mass
    pub mass: f32,
    /// Waist radius
    pub radius: f32,
    /// Height, feet to top
    pub height: f32,
    /// Step height
    pub step_height: f32,
    /// Forward speed intent
    pub forward_speed: f32,
    /// Lateral speed intent
    pub lateral_speed: f32,
    /// Heading intent
    pub heading_angle: f32,
    /// Collision shape
    pub shape: InstanceDescriptor,
}

/// Assigns document ids to shapes while saving
#[derive(Debug, Default)]
pub struct ShapeSaveCache {
    ids: HashMap<usize, u32>,
    records: Vec<ShapeRecord>,
}

impl ShapeSaveCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `shape`, writing its record on first sight
    pub fn shape_id(&mut self, shape: &SharedShape) -> u32 {
        if let Some(id) = self.ids.get(&shape.id()) {
            return *id;
        }

        let descriptor = {
            let geometry = shape.read();
            match &*geometry {
                Shape::Null => ShapeDescriptor::Null,
                Shape::Sphere { radius } => ShapeDescriptor::Sphere { radius: *radius },
                Shape::Box { half_extents } => ShapeDescriptor::Box {
                    half_extents: *half_extents,
                },
                Shape::Capsule { radius, half_height } => ShapeDescriptor::Capsule {
                    radius: *radius,
                    half_height: *half_height,
                },
                Shape::Cylinder { radius, half_height } => ShapeDescriptor::Cylinder {
                    radius: *radius,
                    half_height: *half_height,
                },
                Shape::ConvexHull(hull) => ShapeDescriptor::ConvexHull {
                    vertices: hull.vertices().to_vec(),
                    faces: hull.faces().to_vec(),
                },
                Shape::Compound(compound) => ShapeDescriptor::Compound {
                    children: compound.children().iter().map(|child| child.to_descriptor(self)).collect(),
                },
            }
        };

        // children were recorded first, so ids follow dependency order
        let id = u32::try_from(self.records.len()).unwrap_or(u32::MAX);
        self.ids.insert(shape.id(), id);
        self.records.push(ShapeRecord { id, descriptor });
        id
    }

    /// Records written so far
    pub fn records(&self) -> &[ShapeRecord] {
        &self.records
    }

    /// Take the records
    pub fn into_records(self) -> Vec<ShapeRecord> {
        self.records
    }
}

/// Rebuilds shapes from records while loading
#[derive(Debug, Default)]
pub struct ShapeLoaderCache {
    shapes: HashMap<u32, SharedShape>,
}

impl ShapeLoaderCache {
    /// Build every record; compounds may only reference earlier records
    pub fn new(records: &[ShapeRecord]) -> Result<Self, PhysicsError> {
        let mut cache = Self::default();
        for record in records {
            let shape = cache.build(&record.descriptor)?;
            cache.shapes.insert(record.id, shape);
        }
        log::debug!("Loaded {} shared shapes", cache.shapes.len());
        Ok(cache)
    }

    fn build(&self, descriptor: &ShapeDescriptor) -> Result<SharedShape, PhysicsError> {
        match descriptor {
            ShapeDescriptor::Null => Ok(SharedShape::null()),
            ShapeDescriptor::Sphere { radius } => SharedShape::sphere(*radius),
            ShapeDescriptor::Box { half_extents } => SharedShape::cuboid(*half_extents),
            ShapeDescriptor::Capsule { radius, half_height } => SharedShape::capsule(*radius, *half_height),
            ShapeDescriptor::Cylinder { radius, half_height } => SharedShape::cylinder(*radius, *half_height),
            ShapeDescriptor::ConvexHull { vertices, faces } => {
                Ok(SharedShape::convex_hull(ConvexHull::new(vertices.clone(), faces.clone())?))
            }
            ShapeDescriptor::Compound { children } => {
                let compound = SharedShape::compound();
                for child in children {
                    compound.add_child(ShapeInstance::from_descriptor(child, self)?)?;
                }
                Ok(compound)
            }
        }
    }

    /// Shape by document id
    pub fn shape(&self, id: u32) -> Result<SharedShape, PhysicsError> {
        self.shapes.get(&id).cloned().ok_or(PhysicsError::UnknownShape(id))
    }
}

impl ShapeInstance {
    /// Descriptor for saving; the shape itself goes into `cache`
    pub fn to_descriptor(&self, cache: &mut ShapeSaveCache) -> InstanceDescriptor {
        let envelope = self.envelope();
        InstanceDescriptor {
            shape_id: cache.shape_id(self.shape()),
            local_matrix: *self.local_matrix(),
            scale: envelope.scale(),
            scale_type: envelope.scale_type(),
            alignment: Quat::from_matrix(&envelope.alignment()),
            material: *self.material(),
            collision_mode: self.collision_mode(),
            skin_margin: self.skin_margin(),
        }
    }

    /// Rebuild an instance; the shape comes from `cache`
    pub fn from_descriptor(descriptor: &InstanceDescriptor, cache: &ShapeLoaderCache) -> Result<Self, PhysicsError> {
        let mut instance = Self::new(cache.shape(descriptor.shape_id)?);
        instance.set_local_matrix(descriptor.local_matrix);
        let envelope = match descriptor.scale_type {
            ScaleType::Global => ScaleEnvelope::global(descriptor.scale, descriptor.alignment.to_rotation_matrix().into_inner())?,
            _ => ScaleEnvelope::new(descriptor.scale)?,
        };
        instance.set_envelope(envelope);
        instance.set_material(descriptor.material);
        instance.set_collision_mode(descriptor.collision_mode);
        instance.set_skin_margin(descriptor.skin_margin)?;
        Ok(instance)
    }
}

impl KinematicBody {
    /// Descriptor for saving
    pub fn save(&self, cache: &mut ShapeSaveCache) -> BodyDescriptor {
        BodyDescriptor {
            matrix: *self.matrix(),
            velocity: self.velocity(),
            omega: self.omega(),
            mass: self.mass(),
            shape: self.shape().to_descriptor(cache),
        }
    }

    /// Rebuild a saved body
    pub fn from_descriptor(descriptor: &BodyDescriptor, cache: &ShapeLoaderCache) -> Result<Self, PhysicsError> {
        let mut body = Self::new(ShapeInstance::from_descriptor(&descriptor.shape, cache)?, descriptor.mass)?;
        body.set_matrix(descriptor.matrix);
        body.set_velocity(descriptor.velocity);
        body.set_omega(descriptor.omega);
        Ok(body)
    }
}

/// Everything needed to rebuild a world's bodies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    /// Shared shapes, in dependency order
    pub shapes: Vec<ShapeRecord>,
    /// Plain kinematic bodies
    pub bodies: Vec<BodyDescriptor>,
    /// Player capsules
    pub players: Vec<PlayerCapsuleDescriptor>,
}

impl Config for SceneDocument {}

impl SceneDocument {
    /// Snapshot every body of `world`
    pub fn capture(world: &PhysicsWorld) -> Self {
        let mut cache = ShapeSaveCache::new();
        let mut bodies = Vec::new();
        let mut players = Vec::new();
        for (_, body) in world.bodies() {
            match body.as_player_capsule() {
                Some(player) => players.push(player.save(&mut cache)),
                None => bodies.push(body.kinematic().save(&mut cache)),
            }
        }
        log::debug!("Captured {} bodies and {} players", bodies.len(), players.len());
        Self {
            shapes: cache.into_records(),
            bodies,
            players,
        }
    }

    /// Add every saved body to `world`, returning the new handles
    pub fn restore(&self, world: &mut PhysicsWorld) -> Result<Vec<BodyHandle>, PhysicsError> {
        let cache = ShapeLoaderCache::new(&self.shapes)?;
        let mut restored: Vec<Box<dyn PhysicsBody>> = Vec::new();
        for descriptor in &self.bodies {
            restored.push(Box::new(KinematicBody::from_descriptor(descriptor, &cache)?));
        }
        for descriptor in &self.players {
            let player = PlayerCapsuleBody::from_descriptor(descriptor, &cache, &world.config().player)?;
            restored.push(Box::new(player));
        }
        Ok(restored.into_iter().map(|body| world.add_body(body)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_shape_saved_once() {
        let shape = SharedShape::cuboid(Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let a = ShapeInstance::new(shape.clone());
        let mut b = ShapeInstance::new(shape);
        b.set_scale(Vec3::new(2.0, 1.0, 1.0)).unwrap();

        let mut cache = ShapeSaveCache::new();
        let da = a.to_descriptor(&mut cache);
        let db = b.to_descriptor(&mut cache);
        assert_eq!(da.shape_id, db.shape_id);
        assert_eq!(cache.records().len(), 1);

        let loader = ShapeLoaderCache::new(cache.records()).unwrap();
        let la = ShapeInstance::from_descriptor(&da, &loader).unwrap();
        let lb = ShapeInstance::from_descriptor(&db, &loader).unwrap();
        assert!(la.shape().ptr_eq(lb.shape()));
        assert_eq!(lb.scale(), Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(lb.scale_type(), ScaleType::NonUniform);
    }

    #[test]
    fn test_compound_children_precede_parent() {
        let hull = SharedShape::convex_hull(ConvexHull::cuboid(Vec3::new(0.5, 0.5, 0.5)).unwrap());
        let compound = SharedShape::compound();
        compound.add_child(ShapeInstance::new(hull.clone())).unwrap();
        compound.add_child(ShapeInstance::new(hull)).unwrap();

        let mut cache = ShapeSaveCache::new();
        let id = cache.shape_id(&compound);
        assert_eq!(id, 1);
        assert_eq!(cache.records().len(), 2);

        let loader = ShapeLoaderCache::new(cache.records()).unwrap();
        let loaded = loader.shape(id).unwrap();
        assert_eq!(loaded.child_count(), 2);
    }

    #[test]
    fn test_unknown_shape_id() {
        let loader = ShapeLoaderCache::new(&[]).unwrap();
        assert!(matches!(loader.shape(7), Err(PhysicsError::UnknownShape(7))));
    }

    #[test]
    fn test_global_scale_survives() {
        let mut instance = ShapeInstance::new(SharedShape::cuboid(Vec3::new(1.0, 1.0, 1.0)).unwrap());
        instance
            .set_local_matrix(Transform::from_position_rotation(Vec3::zeros(), Quat::from_axis_angle(&Vec3::z_axis(), 0.6)));
        instance.set_global_scale(Vec3::new(3.0, 1.0, 1.0)).unwrap();

        let mut cache = ShapeSaveCache::new();
        let descriptor = instance.to_descriptor(&mut cache);
        let loader = ShapeLoaderCache::new(cache.records()).unwrap();
        let loaded = ShapeInstance::from_descriptor(&descriptor, &loader).unwrap();

        assert_eq!(loaded.scale_type(), instance.scale_type());
        let dir = Vec3::new(0.3, 0.8, -0.2);
        approx::assert_relative_eq!(loaded.support_vertex(&dir), instance.support_vertex(&dir), epsilon = 1e-4);
    }
}
