//! Integration tests for the capsule controller running inside a world
//!
//! Covers floor detection against a ground plane, control authority per
//! floor state and the threaded input pass.

use crate::config::PhysicsConfig;
use crate::foundation::math::{Mat3, Transform, Vec3};
use crate::physics::body::{FloorState, PhysicsBody};
use crate::physics::scene::{NoContacts, PlaneGroundContacts, SceneContacts};
use crate::physics::world::PhysicsWorld;
use crate::foundation::collections::BodyHandle;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world_with(scene: Box<dyn SceneContacts>, config: PhysicsConfig) -> PhysicsWorld {
        crate::foundation::logging::init_for_tests();
        PhysicsWorld::new(config, scene).unwrap()
    }

    fn spawn_player(world: &mut PhysicsWorld, position: Vec3) -> BodyHandle {
        let handle = world.add_player(Mat3::identity(), 80.0, 0.5, 2.0, 0.3).unwrap();
        world
            .body_mut(handle)
            .unwrap()
            .kinematic_mut()
            .set_matrix(Transform::from_position(position));
        handle
    }

    #[test]
    fn test_grounded_player_reaches_commanded_speed() {
        let mut world = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let handle = spawn_player(&mut world, Vec3::zeros());
        world.player_mut(handle).unwrap().set_forward_speed(5.0);

        world.step();

        let player = world.player(handle).unwrap();
        assert_eq!(player.floor_state(), FloorState::Grounded);
        let veloc = player.kinematic().velocity();
        assert_relative_eq!(veloc.norm(), 5.0, epsilon = 1e-4);
        assert_relative_eq!(veloc.normalize(), Vec3::x(), epsilon = 1e-4);
    }

    #[test]
    fn test_airborne_authority_below_grounded() {
        let mut grounded = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let mut airborne = world_with(Box::new(NoContacts), PhysicsConfig::default());
        let a = spawn_player(&mut grounded, Vec3::zeros());
        let b = spawn_player(&mut airborne, Vec3::new(0.0, 10.0, 0.0));

        grounded.player_mut(a).unwrap().set_lateral_speed(4.0);
        airborne.player_mut(b).unwrap().set_lateral_speed(4.0);
        grounded.step();
        airborne.step();

        let ground_lateral = grounded.player(a).unwrap().kinematic().velocity().z;
        let air_veloc = airborne.player(b).unwrap().kinematic().velocity();
        assert!(!airborne.player(b).unwrap().is_on_floor());
        assert!(air_veloc.z < ground_lateral);
        assert_relative_eq!(air_veloc.z, 4.0 * 0.3, epsilon = 1e-5);
        // gravity accumulates while airborne
        assert_relative_eq!(air_veloc.y, -9.81 / 60.0, epsilon = 1e-5);
    }

    #[test]
    fn test_player_falls_onto_ground() {
        let mut world = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let handle = spawn_player(&mut world, Vec3::new(0.0, 0.5, 0.0));

        let mut landed = false;
        for _ in 0..120 {
            world.step();
            if world.player(handle).unwrap().is_on_floor() {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert!(world.player(handle).unwrap().kinematic().matrix().position.y > -0.3);
    }

    #[test]
    fn test_friction_callback_does_not_change_state() {
        let mut world = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let handle = spawn_player(&mut world, Vec3::zeros());
        world.player_mut(handle).unwrap().set_forward_speed(2.0);
        world.step();

        let player = world.player(handle).unwrap();
        let veloc = player.kinematic().velocity();
        let matrix = *player.kinematic().matrix();
        let frictions: Vec<f32> = world
            .contacts(handle)
            .iter()
            .map(|c| player.contact_friction_callback(&c.position, &c.normal, c.contact_id, None))
            .collect();

        assert!(!frictions.is_empty());
        let prepared: Vec<f32> = world.prepared_contacts().iter().map(|c| c.friction).collect();
        assert_eq!(frictions, prepared);
        assert_eq!(player.kinematic().velocity(), veloc);
        assert_eq!(*player.kinematic().matrix(), matrix);
    }

    #[test]
    fn test_zero_delta_time_changes_nothing() {
        let mut world = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let handle = spawn_player(&mut world, Vec3::zeros());
        world.player_mut(handle).unwrap().set_forward_speed(5.0);

        assert_eq!(world.update(0.0), 0);
        assert_eq!(world.update(f32::NAN), 0);
        assert_eq!(world.tick(), 0);
        assert_eq!(world.player(handle).unwrap().kinematic().velocity(), Vec3::zeros());
    }

    #[test]
    fn test_threaded_inputs_match_inline() {
        let threaded_config = PhysicsConfig {
            worker_threads: 4,
            ..PhysicsConfig::default()
        };
        let mut inline = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), PhysicsConfig::default());
        let mut threaded = world_with(Box::new(PlaneGroundContacts::horizontal(0.0)), threaded_config);

        for i in 0..7 {
            let position = Vec3::new(i as f32 * 3.0, (i % 2) as f32, 0.0);
            for world in [&mut inline, &mut threaded] {
                let handle = spawn_player(world, position);
                world
                    .player_mut(handle)
                    .unwrap()
                    .set_inputs(i as f32, 1.0 - i as f32 * 0.5, i as f32 * 0.3);
            }
        }

        for _ in 0..20 {
            inline.step();
            threaded.step();
        }

        for ((_, a), (_, b)) in inline.bodies().zip(threaded.bodies()) {
            assert_eq!(a.kinematic().velocity(), b.kinematic().velocity());
            assert_eq!(a.kinematic().omega(), b.kinematic().omega());
            assert_eq!(a.kinematic().matrix(), b.kinematic().matrix());
        }
    }
}
