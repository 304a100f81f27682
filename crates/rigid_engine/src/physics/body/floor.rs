//! Floor state of a character controller
//!
//! Resolved contacts are sorted into floor, step and wall contacts once per
//! tick. The floor state then selects a [`ControlPolicy`] that scales the
//! player's planar control and the friction reported for floor contacts.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::physics::primitives::ContactPoint;

/// Whether the controller stands on something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FloorState {
    /// At least one floor contact this tick
    Grounded,
    /// No floor contact
    #[default]
    Airborne,
}

/// Control multipliers for one floor state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPolicy {
    /// Fraction of the gap between current and intended planar velocity
    /// closed per tick, in `[0, 1]`
    pub control_authority: f32,
    /// Friction reported for floor-like contacts
    pub floor_friction: f32,
}

/// One policy per floor state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPolicyTable {
    /// Policy while grounded
    pub grounded: ControlPolicy,
    /// Policy while airborne
    pub airborne: ControlPolicy,
}

impl Default for ControlPolicyTable {
    fn default() -> Self {
        Self {
            grounded: ControlPolicy {
                control_authority: 1.0,
                floor_friction: 2.0,
            },
            airborne: ControlPolicy {
                control_authority: 0.3,
                floor_friction: 0.0,
            },
        }
    }
}

impl ControlPolicyTable {
    /// Policy for a floor state
    pub fn for_state(&self, state: FloorState) -> &ControlPolicy {
        match state {
            FloorState::Grounded => &self.grounded,
            FloorState::Airborne => &self.airborne,
        }
    }

    /// Authorities in `[0, 1]` with airborne no stronger than grounded,
    /// frictions non-negative
    pub fn validate(&self) -> Result<(), String> {
        for (name, policy) in [("grounded", &self.grounded), ("airborne", &self.airborne)] {
            if !(0.0..=1.0).contains(&policy.control_authority) {
                return Err(format!(
                    "{name} control_authority must be in [0, 1], got {}",
                    policy.control_authority
                ));
            }
            if !(policy.floor_friction >= 0.0 && policy.floor_friction.is_finite()) {
                return Err(format!(
                    "{name} floor_friction must be non-negative, got {}",
                    policy.floor_friction
                ));
            }
        }
        if self.airborne.control_authority > self.grounded.control_authority {
            return Err("airborne control_authority exceeds grounded".to_string());
        }
        Ok(())
    }
}

/// Thresholds used to sort contacts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorThresholds {
    /// Controller up axis in world space
    pub up: Vec3,
    /// Minimum `normal . up` of a floor contact
    pub floor_slope_cos: f32,
    /// Highest obstacle the controller steps onto
    pub step_height: f32,
    /// Contacts separated by less than this still count
    pub skin_margin: f32,
}

/// A steep contact low enough to step over
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContact {
    /// Height above the feet
    pub height: f32,
    /// Contact normal
    pub normal: Vec3,
}

/// Per-tick digest of the contacts of one controller
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactSummary {
    /// Averaged floor normal, `None` when airborne
    pub ground_normal: Option<Vec3>,
    /// Velocity of the deepest floor contact's surface
    pub ground_velocity: Vec3,
    /// Highest steppable obstacle
    pub step: Option<StepContact>,
    /// Normals of contacts too high to step over
    pub walls: Vec<Vec3>,
}

impl ContactSummary {
    /// Sort `contacts` relative to the feet at `feet`
    pub fn classify(contacts: &[ContactPoint], feet: &Vec3, thresholds: &FloorThresholds) -> Self {
        let mut summary = Self::default();
        let mut normal_sum = Vec3::zeros();
        let mut deepest = f32::NEG_INFINITY;

        for contact in contacts {
            let height = (contact.position - feet).dot(&thresholds.up);
            let slope = contact.normal.dot(&thresholds.up);

            if slope >= thresholds.floor_slope_cos {
                if contact.penetration >= -thresholds.skin_margin && height <= thresholds.step_height {
                    normal_sum += contact.normal;
                    if contact.penetration > deepest {
                        deepest = contact.penetration;
                        summary.ground_velocity = contact.other_velocity;
                    }
                }
                continue;
            }

            if height > 0.0 && height <= thresholds.step_height {
                if summary.step.map_or(true, |s| height > s.height) {
                    summary.step = Some(StepContact {
                        height,
                        normal: contact.normal,
                    });
                }
            } else {
                summary.walls.push(contact.normal);
            }
        }

        summary.ground_normal = crate::foundation::math::utils::try_normalize(&normal_sum);
        summary
    }

    /// Floor state implied by the summary
    pub fn floor_state(&self) -> FloorState {
        if self.ground_normal.is_some() {
            FloorState::Grounded
        } else {
            FloorState::Airborne
        }
    }
}
