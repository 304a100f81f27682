//! Bodies driven by the physics world
//!
//! Every body wraps a [`KinematicBody`] (matrix, velocities, mass and one
//! collision shape instance). Specialised bodies such as the
//! [`PlayerCapsuleBody`] hook into the per-tick pipeline through the
//! [`PhysicsBody`] trait.

pub mod floor;
pub mod kinematic;
pub mod player_capsule;

use crate::foundation::math::Vec3;

pub use floor::{ContactSummary, ControlPolicy, ControlPolicyTable, FloorState};
pub use kinematic::KinematicBody;
pub use player_capsule::PlayerCapsuleBody;

use crate::physics::primitives::ContactPoint;

/// Per-tick hooks of a simulated body
///
/// The world calls, in order: [`PhysicsBody::update_contacts`],
/// [`PhysicsBody::apply_inputs`], [`PhysicsBody::contact_friction_callback`]
/// once per resolved contact, and [`PhysicsBody::integrate`].
pub trait PhysicsBody: Send + Sync + std::fmt::Debug {
    /// Shared kinematic state
    fn kinematic(&self) -> &KinematicBody;

    /// Mutable kinematic state
    fn kinematic_mut(&mut self) -> &mut KinematicBody;

    /// Receive this tick's resolved contacts
    fn update_contacts(&mut self, _contacts: &[ContactPoint]) {}

    /// Turn control intent into velocities
    fn apply_inputs(&mut self, _timestep: f32) {}

    /// Friction for one contact during contact preparation; must not
    /// mutate the body
    fn contact_friction_callback(
        &self,
        _position: &Vec3,
        _normal: &Vec3,
        _contact_id: u32,
        _other: Option<&KinematicBody>,
    ) -> f32 {
        self.kinematic().shape().material().static_friction
    }

    /// Advance the pose by one step
    fn integrate(&mut self, timestep: f32) {
        self.kinematic_mut().integrate(timestep);
    }

    /// Downcast to a player capsule
    fn as_player_capsule(&self) -> Option<&PlayerCapsuleBody> {
        None
    }

    /// Mutable downcast to a player capsule
    fn as_player_capsule_mut(&mut self) -> Option<&mut PlayerCapsuleBody> {
        None
    }
}
