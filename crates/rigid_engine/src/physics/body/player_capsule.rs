//! Capsule character controller
//!
//! The player is a kinematic capsule standing on its feet at the body
//! origin. Each tick it sorts its contacts into floor, step and wall
//! contacts, then turns the forward/lateral/heading intent into velocities:
//!
//! - grounded, the planar velocity follows the intent with the grounded
//!   authority and rides the floor's velocity;
//! - airborne, the planar velocity only drifts towards the intent with the
//!   reduced airborne authority while gravity accumulates;
//! - steps no higher than `step_height` in front of the player lift it,
//!   anything taller is a wall and only deflects it.

use crate::config::PlayerControllerConfig;
use crate::foundation::math::{utils, Mat3, Quat, Transform, Unit, Vec3};
use crate::physics::body::floor::{ContactSummary, FloorState, FloorThresholds};
use crate::physics::body::kinematic::KinematicBody;
use crate::physics::body::PhysicsBody;
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::error::PhysicsError;
use crate::physics::persistence::{PlayerCapsuleDescriptor, ShapeLoaderCache, ShapeSaveCache};
use crate::physics::primitives::ContactPoint;
use crate::physics::shape::{ShapeInstance, SharedShape};

/// Shortest straight section of the capsule
const MIN_CAPSULE_LENGTH: f32 = 0.1;

fn checked(value: f32, what: &str, allow_zero: bool) -> Result<f32, PhysicsError> {
    let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if ok {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidArgument(format!("player {what} out of range: {value}")))
    }
}

fn clamp_speed(speed: f32, max_speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(-max_speed, max_speed)
    } else {
        0.0
    }
}

/// Kinematic capsule driven by speed and heading intents
#[derive(Debug, Clone)]
pub struct PlayerCapsuleBody {
    body: KinematicBody,
    /// Columns: front, up, right
    local_axis: Mat3,
    radius: f32,
    height: f32,
    step_height: f32,
    forward_speed: f32,
    lateral_speed: f32,
    heading_angle: f32,
    floor_state: FloorState,
    contacts: ContactSummary,
    config: PlayerControllerConfig,
}

impl PlayerCapsuleBody {
    /// Build a player.
    ///
    /// `local_axis` supplies the front direction in column 0 and the up
    /// direction in column 1; the frame is re-orthonormalized and completed
    /// with `right = front x up`.
    pub fn new(
        local_axis: Mat3,
        mass: f32,
        radius: f32,
        height: f32,
        step_height: f32,
        config: &PlayerControllerConfig,
    ) -> Result<Self, PhysicsError> {
        let (radius, height, step_height) = Self::checked_dimensions(radius, height, step_height, config)?;
        let local_axis = Self::orthonormal_axis(&local_axis)?;

        // capsule runs along its X axis; the waist is widened by scale
        let up = local_axis.column(1).into_owned();
        let front = local_axis.column(0).into_owned();
        let waist = config.waist_scale;
        let cap_radius = radius / waist;
        let length = (height - 2.0 * cap_radius).max(MIN_CAPSULE_LENGTH);
        let mut shape = ShapeInstance::new(SharedShape::capsule(cap_radius, length * 0.5)?);
        shape.set_scale(Vec3::new(1.0, waist, waist))?;
        shape.set_local_matrix(Transform::from_rotation_matrix(
            &Mat3::from_columns(&[up, front, up.cross(&front)]),
            up * (height * 0.5),
        ));
        shape.material_mut().layer = CollisionLayers::PLAYER;

        Self::assemble(shape, local_axis, mass, radius, height, step_height, config)
    }

    fn checked_dimensions(
        radius: f32,
        height: f32,
        step_height: f32,
        config: &PlayerControllerConfig,
    ) -> Result<(f32, f32, f32), PhysicsError> {
        let radius = checked(radius, "radius", false)?;
        let height = checked(height, "height", false)?;
        let step_height = checked(step_height, "step height", true)?;
        config.validate().map_err(|e| PhysicsError::InvalidArgument(e.to_string()))?;
        Ok((radius, height, step_height))
    }

    fn orthonormal_axis(local_axis: &Mat3) -> Result<Mat3, PhysicsError> {
        let up = utils::try_normalize(&local_axis.column(1).into_owned())
            .ok_or_else(|| PhysicsError::InvalidArgument("player up axis is degenerate".to_string()))?;
        let front = local_axis.column(0).into_owned();
        let front = utils::try_normalize(&(front - up * front.dot(&up)))
            .ok_or_else(|| PhysicsError::InvalidArgument("player front axis is parallel to up".to_string()))?;
        Ok(Mat3::from_columns(&[front, up, front.cross(&up)]))
    }

    fn assemble(
        shape: ShapeInstance,
        local_axis: Mat3,
        mass: f32,
        radius: f32,
        height: f32,
        step_height: f32,
        config: &PlayerControllerConfig,
    ) -> Result<Self, PhysicsError> {
        let mut body = KinematicBody::new(shape, mass)?;
        // contacts never spin the player
        body.set_inv_inertia(Mat3::zeros());

        log::debug!(
            "Created player capsule: radius {}, height {}, step {}, mass {}",
            radius,
            height,
            step_height,
            mass
        );

        Ok(Self {
            body,
            local_axis,
            radius,
            height,
            step_height,
            forward_speed: 0.0,
            lateral_speed: 0.0,
            heading_angle: 0.0,
            floor_state: FloorState::Airborne,
            contacts: ContactSummary::default(),
            config: config.clone(),
        })
    }

    /// Frame with columns front, up, right, fixed at construction
    pub fn local_axis(&self) -> &Mat3 {
        &self.local_axis
    }

    fn local_front(&self) -> Vec3 {
        self.local_axis.column(0).into_owned()
    }

    fn local_up(&self) -> Vec3 {
        self.local_axis.column(1).into_owned()
    }

    fn local_right(&self) -> Vec3 {
        self.local_axis.column(2).into_owned()
    }

    /// Current up axis in world space
    pub fn up(&self) -> Vec3 {
        self.body.matrix().rotate_vector(&self.local_up())
    }

    /// Current front axis in world space
    pub fn front(&self) -> Vec3 {
        self.body.matrix().rotate_vector(&self.local_front())
    }

    /// Capsule radius at the waist
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Capsule height, feet to top
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Highest obstacle stepped onto automatically
    pub fn step_height(&self) -> f32 {
        self.step_height
    }

    /// Intended speed along the heading's front axis
    pub fn forward_speed(&self) -> f32 {
        self.forward_speed
    }

    /// Intended speed along the heading's right axis
    pub fn lateral_speed(&self) -> f32 {
        self.lateral_speed
    }

    /// Intended heading, radians about the up axis
    pub fn heading_angle(&self) -> f32 {
        self.heading_angle
    }

    /// Set the forward speed intent
    pub fn set_forward_speed(&mut self, speed: f32) {
        self.forward_speed = speed;
    }

    /// Set the lateral speed intent
    pub fn set_lateral_speed(&mut self, speed: f32) {
        self.lateral_speed = speed;
    }

    /// Set the heading intent
    pub fn set_heading_angle(&mut self, angle: f32) {
        self.heading_angle = angle;
    }

    /// Set all three intents
    pub fn set_inputs(&mut self, forward_speed: f32, lateral_speed: f32, heading_angle: f32) {
        self.forward_speed = forward_speed;
        self.lateral_speed = lateral_speed;
        self.heading_angle = heading_angle;
    }

    /// Floor state from the last contact update
    pub fn floor_state(&self) -> FloorState {
        self.floor_state
    }

    /// True while standing on a floor contact
    pub fn is_on_floor(&self) -> bool {
        self.floor_state == FloorState::Grounded
    }

    /// Contact digest from the last contact update
    pub fn contact_summary(&self) -> &ContactSummary {
        &self.contacts
    }

    /// Controller tuning
    pub fn config(&self) -> &PlayerControllerConfig {
        &self.config
    }

    /// Split the body rotation into `tilt * yaw`, yaw about the local up axis.
    ///
    /// Returns the tilt and the yaw angle.
    fn split_heading(&self) -> (Quat, f32) {
        let rotation = self.body.matrix().rotation;
        let up = self.local_up();
        let q = rotation.quaternion();
        let along = q.imag().dot(&up);
        // half turn about an axis perpendicular to up: no yaw to extract
        let yaw = if along.abs() < 1.0e-7 && q.w.abs() < 1.0e-7 {
            0.0
        } else {
            utils::wrap_angle(2.0 * along.atan2(q.w))
        };
        let twist = Quat::from_axis_angle(&Unit::new_unchecked(up), yaw);
        (rotation * twist.inverse(), yaw)
    }

    /// Heading of the body about its up axis, measured from the local front
    pub fn current_heading(&self) -> f32 {
        self.split_heading().1
    }

    /// Sort contacts and refresh the floor state
    pub fn classify_contacts(&mut self, contacts: &[ContactPoint]) {
        let thresholds = FloorThresholds {
            up: self.up(),
            floor_slope_cos: self.config.floor_slope_cos,
            step_height: self.step_height,
            skin_margin: self.body.shape().skin_margin(),
        };
        self.contacts = ContactSummary::classify(contacts, &self.body.matrix().position, &thresholds);

        let state = self.contacts.floor_state();
        if state != self.floor_state {
            log::trace!("Player floor state {:?} -> {:?}", self.floor_state, state);
        }
        self.floor_state = state;
    }

    /// Per-tick controller step; a non-positive or non-finite timestep does nothing
    pub fn update_velocity(&mut self, timestep: f32) {
        if !(timestep > 0.0 && timestep.is_finite()) {
            return;
        }

        let forward = clamp_speed(self.forward_speed, self.config.max_speed);
        let lateral = clamp_speed(self.lateral_speed, self.config.max_speed);
        let (tilt, current_heading) = self.split_heading();
        let heading = if self.heading_angle.is_finite() {
            self.heading_angle
        } else {
            current_heading
        };

        // heading frame in world space: the body's tilt with the yaw replaced
        let heading_frame = tilt * Quat::from_axis_angle(&Unit::new_unchecked(self.local_up()), heading);
        let intent = heading_frame * (self.local_front() * forward + self.local_right() * lateral);

        let world_up = tilt * self.local_up();
        let veloc = utils::sanitize(&self.body.velocity());
        let vertical = world_up * veloc.dot(&world_up);
        let planar = veloc - vertical;

        let policy = *self.config.policy.for_state(self.floor_state);
        let ground_velocity = utils::sanitize(&self.contacts.ground_velocity);
        let target = match self.floor_state {
            FloorState::Grounded => intent + (ground_velocity - world_up * ground_velocity.dot(&world_up)),
            FloorState::Airborne => intent,
        };
        let planar = planar + (target - planar) * policy.control_authority;
        let mut veloc = planar + vertical + self.body.gravity() * timestep;

        if let (FloorState::Grounded, Some(normal)) = (self.floor_state, self.contacts.ground_normal) {
            let into = (veloc - ground_velocity).dot(&normal);
            if into < 0.0 {
                veloc -= normal * into;
            }
        }

        if let Some(step) = self.contacts.step {
            if intent.dot(&step.normal) < 0.0 {
                let climb = step.height / timestep;
                let rise = veloc.dot(&world_up);
                if rise < climb {
                    veloc += world_up * (climb - rise);
                }
            }
        }

        for wall in &self.contacts.walls {
            let into = veloc.dot(wall);
            if into < 0.0 {
                veloc -= wall * into;
            }
        }

        let error = utils::wrap_angle(heading - current_heading);
        let rate = (error * self.config.heading_gain / timestep)
            .clamp(-self.config.max_turn_rate, self.config.max_turn_rate);

        self.body.set_velocity(utils::sanitize(&veloc));
        self.body.set_omega(utils::sanitize(&(world_up * rate)));
    }

    /// Friction for one contact: floor-like normals use the current floor
    /// policy, steep ones the wall friction
    pub fn friction_for(&self, normal: &Vec3) -> f32 {
        if normal.dot(&self.up()) >= self.config.floor_slope_cos {
            self.config.policy.for_state(self.floor_state).floor_friction
        } else {
            self.config.wall_friction
        }
    }

    /// Descriptor for saving
    pub fn save(&self, cache: &mut ShapeSaveCache) -> PlayerCapsuleDescriptor {
        PlayerCapsuleDescriptor {
            matrix: *self.body.matrix(),
            velocity: self.body.velocity(),
            local_axis: self.local_axis,
            mass: self.body.mass(),
            radius: self.radius,
            height: self.height,
            step_height: self.step_height,
            forward_speed: self.forward_speed,
            lateral_speed: self.lateral_speed,
            heading_angle: self.heading_angle,
            shape: self.body.shape().to_descriptor(cache),
        }
    }

    /// Rebuild a saved player
    pub fn from_descriptor(
        descriptor: &PlayerCapsuleDescriptor,
        cache: &ShapeLoaderCache,
        config: &PlayerControllerConfig,
    ) -> Result<Self, PhysicsError> {
        let (radius, height, step_height) =
            Self::checked_dimensions(descriptor.radius, descriptor.height, descriptor.step_height, config)?;
        let local_axis = Self::orthonormal_axis(&descriptor.local_axis)?;
        let shape = ShapeInstance::from_descriptor(&descriptor.shape, cache)?;
        let mut player = Self::assemble(shape, local_axis, descriptor.mass, radius, height, step_height, config)?;
        player.body.set_matrix(descriptor.matrix);
        player.body.set_velocity(descriptor.velocity);
        player.set_inputs(descriptor.forward_speed, descriptor.lateral_speed, descriptor.heading_angle);
        Ok(player)
    }
}

impl PhysicsBody for PlayerCapsuleBody {
    fn kinematic(&self) -> &KinematicBody {
        &self.body
    }

    fn kinematic_mut(&mut self) -> &mut KinematicBody {
        &mut self.body
    }

    fn update_contacts(&mut self, contacts: &[ContactPoint]) {
        self.classify_contacts(contacts);
    }

    fn apply_inputs(&mut self, timestep: f32) {
        self.update_velocity(timestep);
    }

    fn contact_friction_callback(
        &self,
        _position: &Vec3,
        normal: &Vec3,
        _contact_id: u32,
        _other: Option<&KinematicBody>,
    ) -> f32 {
        self.friction_for(normal)
    }

    fn as_player_capsule(&self) -> Option<&PlayerCapsuleBody> {
        Some(self)
    }

    fn as_player_capsule_mut(&mut self) -> Option<&mut PlayerCapsuleBody> {
        Some(self)
    }
}
