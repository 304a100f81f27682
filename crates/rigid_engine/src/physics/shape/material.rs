//! Per-instance surface material

use serde::{Deserialize, Serialize};

use crate::physics::collision_layers::CollisionLayers;

/// Surface properties and filtering data carried by a shape instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeMaterial {
    /// Application defined id, reported by `ShapeInstance::user_data_id`
    pub user_id: u64,
    /// Friction coefficient at rest
    pub static_friction: f32,
    /// Friction coefficient while sliding
    pub kinetic_friction: f32,
    /// Restitution (bounciness)
    pub restitution: f32,
    /// What this shape is
    pub layer: CollisionLayers,
    /// What this shape collides with
    pub mask: CollisionLayers,
    /// Free application parameters
    pub user_params: [f32; 4],
}

impl Default for ShapeMaterial {
    fn default() -> Self {
        Self {
            user_id: 0,
            static_friction: 0.9,
            kinetic_friction: 0.5,
            restitution: 0.4,
            layer: CollisionLayers::DYNAMIC,
            mask: CollisionLayers::all(),
            user_params: [0.0; 4],
        }
    }
}

impl ShapeMaterial {
    /// True when contacts between the two materials should be generated
    pub fn collides_with(&self, other: &ShapeMaterial) -> bool {
        CollisionLayers::should_collide(self.layer, self.mask, other.layer, other.mask)
    }
}
