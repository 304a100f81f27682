//! Physics module: shape instances, bodies and the stepping world
//!
//! Shapes are shared geometry ([`SharedShape`]) placed by
//! [`ShapeInstance`]s. Bodies own one instance each and are stepped by the
//! [`PhysicsWorld`], which gets its contacts from a [`SceneContacts`] source.

pub mod body;
pub mod collision_layers;
pub mod error;
pub mod persistence;
pub mod primitives;
pub mod scene;
pub mod shape;
pub mod world;

#[cfg(test)]
mod tests;

pub use body::{
    ContactSummary, ControlPolicy, ControlPolicyTable, FloorState, KinematicBody, PhysicsBody, PlayerCapsuleBody,
};
pub use collision_layers::CollisionLayers;
pub use error::PhysicsError;
pub use persistence::{SceneDocument, ShapeLoaderCache, ShapeSaveCache};
pub use primitives::{Aabb, ContactPoint, Segment, ShapeRayHit};
pub use scene::{NoContacts, PlaneGroundContacts, SceneContacts};
pub use shape::{
    Compound, ConvexHull, MassProperties, ScaleType, Shape, ShapeInfo, ShapeInstance, ShapeKind, ShapeMaterial,
    SharedShape,
};
pub use world::{PhysicsWorld, PreparedContact};
