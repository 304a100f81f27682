//! Collision layer flags for filtering contact generation
//!
//! Every shape material carries a layer (what it is) and a mask (what it
//! collides with). A pair collides only when each side's layer is in the
//! other side's mask.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Collision layer bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionLayers: u32 {
        /// Static environment geometry
        const STATIC = 1 << 0;
        /// Simulated rigid bodies
        const DYNAMIC = 1 << 1;
        /// Script driven bodies
        const KINEMATIC = 1 << 2;
        /// Player character controllers
        const PLAYER = 1 << 3;
        /// Trigger volumes (no physical response)
        const TRIGGER = 1 << 4;
        /// Debris and small props
        const DEBRIS = 1 << 5;
        /// Vehicles
        const VEHICLE = 1 << 6;
        /// Projectiles
        const PROJECTILE = 1 << 7;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::all()
    }
}

impl CollisionLayers {
    /// Check if two shapes should collide based on their layers and masks
    ///
    /// ```
    /// use rigid_engine::physics::CollisionLayers;
    ///
    /// let player = (CollisionLayers::PLAYER, CollisionLayers::STATIC | CollisionLayers::DYNAMIC);
    /// let ground = (CollisionLayers::STATIC, CollisionLayers::all());
    /// assert!(CollisionLayers::should_collide(player.0, player.1, ground.0, ground.1));
    /// ```
    pub fn should_collide(
        layer_a: CollisionLayers,
        mask_a: CollisionLayers,
        layer_b: CollisionLayers,
        mask_b: CollisionLayers,
    ) -> bool {
        mask_b.intersects(layer_a) && mask_a.intersects(layer_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_symmetric_requirement() {
        let debris = CollisionLayers::DEBRIS;
        let debris_mask = CollisionLayers::STATIC;
        let player = CollisionLayers::PLAYER;
        let player_mask = CollisionLayers::all();

        // Player accepts debris but debris ignores players
        assert!(!CollisionLayers::should_collide(debris, debris_mask, player, player_mask));
        assert!(CollisionLayers::should_collide(
            debris,
            debris_mask,
            CollisionLayers::STATIC,
            CollisionLayers::all()
        ));
    }

    #[test]
    fn test_empty_mask_never_collides() {
        assert!(!CollisionLayers::should_collide(
            CollisionLayers::PLAYER,
            CollisionLayers::empty(),
            CollisionLayers::STATIC,
            CollisionLayers::all()
        ));
    }
}
