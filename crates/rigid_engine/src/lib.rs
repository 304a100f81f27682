//! # Rigid Engine
//!
//! Shape instancing and a capsule character controller for a rigid-body
//! physics core.
//!
//! ## Features
//!
//! - **Shared shapes**: one geometry, many placed and scaled instances
//! - **Scale envelopes**: unit, uniform, non-uniform and global scale
//! - **Character controller**: floor, step and wall aware capsule player
//! - **Persistence**: RON and TOML scene documents that keep shape sharing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rigid_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut world = PhysicsWorld::new(PhysicsConfig::default(), Box::new(PlaneGroundContacts::horizontal(0.0)))?;
//!     let player = world.add_player(Mat3::identity(), 80.0, 0.4, 1.8, 0.3)?;
//!
//!     if let Some(body) = world.player_mut(player) {
//!         body.set_forward_speed(4.0);
//!     }
//!     world.update(1.0 / 30.0);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod debug;
pub mod foundation;
pub mod physics;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PhysicsConfig, PlayerControllerConfig},
        debug::{DebugPolygonCollector, ShapeDebugNotify},
        foundation::math::{Mat3, Quat, Transform, Vec3},
        physics::{
            CollisionLayers, ContactPoint, FloorState, KinematicBody, PhysicsBody, PhysicsError, PhysicsWorld,
            PlaneGroundContacts, PlayerCapsuleBody, SceneDocument, ShapeInstance, ShapeMaterial, SharedShape,
        },
    };
}
