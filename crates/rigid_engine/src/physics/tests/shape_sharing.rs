//! Integration tests for shared shapes
//!
//! Geometry edits seen through compounds, analytic ray casts through a
//! scaled instance and scene documents that keep sharing across a save.

use crate::config::{Config, PhysicsConfig};
use crate::foundation::math::{Mat3, Transform, Vec3};
use crate::physics::body::KinematicBody;
use crate::physics::persistence::SceneDocument;
use crate::physics::scene::NoContacts;
use crate::physics::shape::{ConvexHull, Shape, ShapeInstance, SharedShape};
use crate::physics::world::PhysicsWorld;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn placed(shape: &SharedShape, x: f32) -> ShapeInstance {
        let mut instance = ShapeInstance::new(shape.clone());
        instance.set_local_matrix(Transform::from_position(Vec3::new(x, 0.0, 0.0)));
        instance
    }

    #[test]
    fn test_compound_children_see_hull_edit() {
        let hull = SharedShape::convex_hull(ConvexHull::cuboid(Vec3::repeat(0.5)).unwrap());
        let compound = SharedShape::compound();
        compound.add_child(placed(&hull, 2.0)).unwrap();
        compound.add_child(placed(&hull, -2.0)).unwrap();
        let instance = ShapeInstance::new(compound.clone());

        assert_relative_eq!(instance.support_vertex(&Vec3::x()).x, 2.5, epsilon = 1e-5);
        assert_relative_eq!(instance.support_vertex(&-Vec3::x()).x, -2.5, epsilon = 1e-5);

        let bigger = ConvexHull::cuboid(Vec3::repeat(1.0)).unwrap();
        hull.modify(|shape| match shape {
            Shape::ConvexHull(geometry) => geometry.set_geometry(bigger.vertices().to_vec(), bigger.faces().to_vec()),
            _ => Ok(()),
        })
        .unwrap()
        .unwrap();

        assert_relative_eq!(instance.support_vertex(&Vec3::x()).x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(instance.support_vertex(&-Vec3::x()).x, -3.0, epsilon = 1e-5);
        // one holder per child plus the local handle
        assert_eq!(hull.holder_count(), 3);
    }

    #[test]
    fn test_compound_rejects_nesting() {
        let compound = SharedShape::compound();
        let inner = SharedShape::compound();
        assert!(compound.add_child(ShapeInstance::new(inner)).is_err());
        assert!(compound.add_child(ShapeInstance::new(compound.clone())).is_err());
        assert_eq!(compound.child_count(), 0);
    }

    #[test]
    fn test_scaled_sphere_ray_matches_analytic() {
        let mut instance = ShapeInstance::new(SharedShape::sphere(1.0).unwrap());
        instance.set_scale(Vec3::repeat(2.0)).unwrap();

        let p0 = Vec3::new(-5.0, 0.5, 0.0);
        let p1 = Vec3::new(5.0, 0.5, 0.0);
        let hit = instance.ray_cast(&p0, &p1).unwrap();

        let entry_x = -(4.0_f32 - 0.25).sqrt();
        assert_relative_eq!(hit.fraction, (entry_x + 5.0) / 10.0, epsilon = 1e-4);
        assert_relative_eq!(hit.point, Vec3::new(entry_x, 0.5, 0.0), epsilon = 1e-4);
        assert_relative_eq!(hit.normal, Vec3::new(entry_x, 0.5, 0.0) / 2.0, epsilon = 1e-4);

        assert!(instance.ray_cast(&Vec3::new(-5.0, 2.5, 0.0), &Vec3::new(5.0, 2.5, 0.0)).is_none());
        assert!(instance.ray_cast(&p0, &p0).is_none());
    }

    #[test]
    fn test_scene_document_keeps_sharing() {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::new(config.clone(), Box::new(NoContacts)).unwrap();
        let crate_shape = SharedShape::cuboid(Vec3::new(0.5, 0.5, 0.5)).unwrap();
        for i in 0..3 {
            let mut body = KinematicBody::new(world.new_instance(crate_shape.clone()), 10.0).unwrap();
            body.set_matrix(Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)));
            world.add_body(Box::new(body));
        }
        let player = world.add_player(Mat3::identity(), 80.0, 0.4, 1.8, 0.25).unwrap();
        world.player_mut(player).unwrap().set_inputs(3.0, -1.0, 0.5);

        let text = SceneDocument::capture(&world).save_to_string("scene.ron").unwrap();
        let document = SceneDocument::load_from_str(&text, "scene.ron").unwrap();
        assert_eq!(document.shapes.len(), 2);
        assert_eq!(document.bodies.len(), 3);
        assert_eq!(document.players.len(), 1);

        let mut restored = PhysicsWorld::new(config, Box::new(NoContacts)).unwrap();
        let handles = document.restore(&mut restored).unwrap();
        assert_eq!(handles.len(), 4);

        let first = restored.body(handles[0]).unwrap().kinematic().shape().shape().clone();
        for handle in &handles[1..3] {
            let body = restored.body(*handle).unwrap();
            assert!(body.kinematic().shape().shape().ptr_eq(&first));
            assert_eq!(body.kinematic().shape().owner_body(), Some(*handle));
        }
        assert!(!first.ptr_eq(&crate_shape));

        let loaded_player = restored.player(handles[3]).unwrap();
        assert_eq!(loaded_player.forward_speed(), 3.0);
        assert_eq!(loaded_player.lateral_speed(), -1.0);
        assert_eq!(loaded_player.heading_angle(), 0.5);
        assert_relative_eq!(loaded_player.height(), 1.8);
    }
}
