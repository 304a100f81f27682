//! Physics world: body storage and the fixed-step tick
//!
//! One tick runs, in order:
//!
//! 1. contact resolution against the scene ([`SceneContacts`]);
//! 2. per-body contact classification;
//! 3. per-body input application, on a rayon pool when more than one worker
//!    thread is configured;
//! 4. contact preparation, which evaluates every friction callback;
//! 5. integration, which refreshes every collision matrix and bounding box.

use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::PhysicsConfig;
use crate::foundation::collections::{BodyHandle, BodyMap, SecondaryMap};
use crate::foundation::math::{Mat3, Vec3};
use crate::physics::body::{PhysicsBody, PlayerCapsuleBody};
use crate::physics::error::PhysicsError;
use crate::physics::primitives::ContactPoint;
use crate::physics::scene::SceneContacts;
use crate::physics::shape::{ShapeInstance, SharedShape};

/// A resolved contact with the friction its body reported for it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedContact {
    /// Body the contact belongs to
    pub body: BodyHandle,
    /// The contact
    pub contact: ContactPoint,
    /// Result of the body's friction callback
    pub friction: f32,
}

/// Owns the bodies and steps them
pub struct PhysicsWorld {
    config: PhysicsConfig,
    bodies: BodyMap<Box<dyn PhysicsBody>>,
    scene: Box<dyn SceneContacts>,
    contacts: SecondaryMap<BodyHandle, Vec<ContactPoint>>,
    prepared: Vec<PreparedContact>,
    pool: Option<ThreadPool>,
    accumulator: f32,
    tick: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.bodies.len())
            .field("tick", &self.tick)
            .field("accumulator", &self.accumulator)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Create an empty world
    pub fn new(config: PhysicsConfig, scene: Box<dyn SceneContacts>) -> Result<Self, PhysicsError> {
        config
            .validate()
            .map_err(|e| PhysicsError::InvalidArgument(e.to_string()))?;
        let pool = if config.worker_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("physics-worker-{i}"))
                .build()
                .map_err(|e| PhysicsError::InvalidArgument(format!("worker pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        log::info!(
            "Physics world: timestep {:.4}s, {} substeps max, {} worker thread(s)",
            config.timestep,
            config.max_substeps,
            config.worker_threads
        );
        Ok(Self {
            config,
            bodies: BodyMap::with_key(),
            scene,
            contacts: SecondaryMap::new(),
            prepared: Vec::new(),
            pool,
            accumulator: 0.0,
            tick: 0,
        })
    }

    /// World configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Ticks run so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Swap the contact source
    pub fn set_scene(&mut self, scene: Box<dyn SceneContacts>) {
        self.scene = scene;
    }

    /// New instance of `shape` carrying the configured skin margin
    pub fn new_instance(&self, shape: SharedShape) -> ShapeInstance {
        let mut instance = ShapeInstance::new(shape);
        if let Err(err) = instance.set_skin_margin(self.config.shape.default_skin_margin) {
            log::warn!("Keeping default skin margin: {}", err);
        }
        instance
    }

    /// Add a body; the world takes over its gravity and its shape's owner link
    pub fn add_body(&mut self, mut body: Box<dyn PhysicsBody>) -> BodyHandle {
        let gravity = self.config.gravity;
        self.bodies.insert_with_key(|handle| {
            let kinematic = body.kinematic_mut();
            kinematic.set_gravity(gravity);
            kinematic.shape_mut().set_owner_body(Some(handle));
            kinematic.refresh();
            body
        })
    }

    /// Build a player with the configured controller tuning and add it
    pub fn add_player(
        &mut self,
        local_axis: Mat3,
        mass: f32,
        radius: f32,
        height: f32,
        step_height: f32,
    ) -> Result<BodyHandle, PhysicsError> {
        let player = PlayerCapsuleBody::new(local_axis, mass, radius, height, step_height, &self.config.player)?;
        Ok(self.add_body(Box::new(player)))
    }

    /// Remove a body and clear its shape's owner link
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<Box<dyn PhysicsBody>, PhysicsError> {
        let Some(mut body) = self.bodies.remove(handle) else {
            log::warn!("remove_body: unknown handle {:?}", handle);
            return Err(PhysicsError::UnknownBody);
        };
        self.contacts.remove(handle);
        body.kinematic_mut().shape_mut().detach();
        Ok(body)
    }

    /// Number of bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all bodies
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &dyn PhysicsBody)> {
        self.bodies.iter().map(|(handle, body)| (handle, &**body))
    }

    /// Body by handle
    pub fn body(&self, handle: BodyHandle) -> Option<&dyn PhysicsBody> {
        self.bodies.get(handle).map(|body| &**body)
    }

    /// Mutable body by handle
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut (dyn PhysicsBody + 'static)> {
        self.bodies.get_mut(handle).map(|body| &mut **body)
    }

    /// Player by handle; `None` for other body types
    pub fn player(&self, handle: BodyHandle) -> Option<&PlayerCapsuleBody> {
        self.bodies.get(handle)?.as_player_capsule()
    }

    /// Mutable player by handle
    pub fn player_mut(&mut self, handle: BodyHandle) -> Option<&mut PlayerCapsuleBody> {
        self.bodies.get_mut(handle)?.as_player_capsule_mut()
    }

    /// Contacts resolved for a body on the last tick
    pub fn contacts(&self, handle: BodyHandle) -> &[ContactPoint] {
        self.contacts.get(handle).map_or(&[][..], Vec::as_slice)
    }

    /// Contacts with their friction from the last tick
    pub fn prepared_contacts(&self) -> &[PreparedContact] {
        &self.prepared
    }

    /// Advance by real time; runs whole fixed steps and returns how many.
    ///
    /// Backlog beyond `max_substeps` is dropped.
    pub fn update(&mut self, delta_time: f32) -> u32 {
        if !(delta_time > 0.0 && delta_time.is_finite()) {
            return 0;
        }

        let timestep = self.config.timestep;
        self.accumulator += delta_time;
        let mut steps = 0;
        while self.accumulator >= timestep && steps < self.config.max_substeps {
            self.step();
            self.accumulator -= timestep;
            steps += 1;
        }

        if self.accumulator >= timestep {
            log::debug!("Dropping {:.4}s of simulation backlog", self.accumulator);
            self.accumulator = 0.0;
        }
        steps
    }

    /// Run one fixed tick
    pub fn step(&mut self) {
        let timestep = self.config.timestep;

        self.contacts = self.scene.resolve_contacts(&self.bodies);

        for (handle, body) in &mut self.bodies {
            let contacts = self.contacts.get(handle).map_or(&[][..], Vec::as_slice);
            body.update_contacts(contacts);
        }

        self.apply_inputs(timestep);
        self.prepare_contacts();

        for body in self.bodies.values_mut() {
            body.integrate(timestep);
        }

        self.tick += 1;
        log::trace!("Tick {} done, {} prepared contacts", self.tick, self.prepared.len());
    }

    fn apply_inputs(&mut self, timestep: f32) {
        match &self.pool {
            Some(pool) if self.bodies.len() > 1 => {
                let mut bodies: Vec<&mut Box<dyn PhysicsBody>> = self.bodies.values_mut().collect();
                pool.install(|| {
                    bodies.par_iter_mut().for_each(|body| body.apply_inputs(timestep));
                });
            }
            _ => {
                for body in self.bodies.values_mut() {
                    body.apply_inputs(timestep);
                }
            }
        }
    }

    fn prepare_contacts(&mut self) {
        self.prepared.clear();
        for (handle, contacts) in &self.contacts {
            let Some(body) = self.bodies.get(handle) else {
                continue;
            };
            for contact in contacts {
                let other = contact
                    .other_body
                    .and_then(|other| self.bodies.get(other))
                    .map(|other| other.kinematic());
                let friction =
                    body.contact_friction_callback(&contact.position, &contact.normal, contact.contact_id, other);
                self.prepared.push(PreparedContact {
                    body: handle,
                    contact: *contact,
                    friction,
                });
            }
        }
    }

    /// Total linear momentum, for diagnostics
    pub fn linear_momentum(&self) -> Vec3 {
        self.bodies
            .values()
            .map(|body| body.kinematic().velocity() * body.kinematic().mass())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::KinematicBody;
    use crate::physics::scene::{NoContacts, PlaneGroundContacts};
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default(), Box::new(NoContacts)).unwrap()
    }

    #[test]
    fn test_add_and_remove_sets_owner() {
        let mut world = world();
        let body = KinematicBody::new(world.new_instance(SharedShape::sphere(1.0).unwrap()), 1.0).unwrap();
        let handle = world.add_body(Box::new(body));
        assert_eq!(world.body(handle).unwrap().kinematic().shape().owner_body(), Some(handle));

        world.body_mut(handle).unwrap().kinematic_mut().set_velocity(Vec3::x());
        assert_eq!(world.body(handle).unwrap().kinematic().velocity(), Vec3::x());

        let removed = world.remove_body(handle).unwrap();
        assert_eq!(removed.kinematic().shape().owner_body(), None);
        assert!(matches!(world.remove_body(handle), Err(PhysicsError::UnknownBody)));
    }

    #[test]
    fn test_update_runs_fixed_steps() {
        let mut world = world();
        assert_eq!(world.update(1.0 / 60.0 + 1.0e-4), 1);
        assert_eq!(world.update(0.0), 0);
        // far behind: capped, backlog dropped
        assert_eq!(world.update(1.0), world.config().max_substeps);
        assert_eq!(world.update(1.0e-3), 0);
    }

    #[test]
    fn test_player_lands_and_walks() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), Box::new(PlaneGroundContacts::horizontal(0.0))).unwrap();
        let handle = world.add_player(Mat3::identity(), 80.0, 0.5, 2.0, 0.3).unwrap();
        world.player_mut(handle).unwrap().set_forward_speed(3.0);

        for _ in 0..10 {
            world.step();
        }

        let player = world.player(handle).unwrap();
        assert!(player.is_on_floor());
        assert_relative_eq!(player.kinematic().velocity(), Vec3::new(3.0, 0.0, 0.0), epsilon = 1e-4);
        assert!(world
            .prepared_contacts()
            .iter()
            .all(|c| c.friction == world.config().player.policy.grounded.floor_friction));
        assert!(!world.prepared_contacts().is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PhysicsConfig {
            timestep: -1.0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            PhysicsWorld::new(config, Box::new(NoContacts)),
            Err(PhysicsError::InvalidArgument(_))
        ));
    }
}
