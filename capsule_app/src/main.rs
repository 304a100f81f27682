//! Capsule controller demo
//!
//! Runs a player capsule over a ground plane for a few simulated seconds and
//! logs its state. Usage:
//!
//! ```text
//! capsule_demo [config.toml|config.ron] [scene-out.ron]
//! ```

use rigid_engine::config::{Config, ConfigError, PhysicsConfig};
use rigid_engine::foundation::math::{Mat3, Transform, Vec3};
use rigid_engine::physics::{
    KinematicBody, PhysicsBody, PhysicsError, PhysicsWorld, PlaneGroundContacts, SceneDocument, SharedShape,
};

/// Demo failures
#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),
}

/// Simulated seconds
const RUN_TIME: f32 = 4.0;
/// Wall clock frame used to drive the fixed-step world
const FRAME_TIME: f32 = 1.0 / 30.0;

fn load_config(path: Option<&str>) -> Result<PhysicsConfig, AppError> {
    let Some(path) = path else {
        log::info!("No config file given, using defaults");
        return Ok(PhysicsConfig::default());
    };
    log::info!("Loading config from {}", path);
    let config = PhysicsConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn build_world(config: PhysicsConfig) -> Result<PhysicsWorld, AppError> {
    let mut world = PhysicsWorld::new(config, Box::new(PlaneGroundContacts::horizontal(0.0)))?;

    // a row of crates sharing one box shape
    let crate_shape = SharedShape::cuboid(Vec3::new(0.5, 0.5, 0.5))?;
    for i in 0..4 {
        let mut body = KinematicBody::new(world.new_instance(crate_shape.clone()), 20.0)?;
        body.set_matrix(Transform::from_position(Vec3::new(i as f32 * 1.5, 0.5, 6.0)));
        world.add_body(Box::new(body));
    }
    log::info!("Crate shape shared by {} holders", crate_shape.holder_count());
    Ok(world)
}

fn run() -> Result<(), AppError> {
    let args: Vec<String> = std::env::args().collect();
    let config = load_config(args.get(1).map(String::as_str))?;
    let mut world = build_world(config)?;

    let player = world.add_player(Mat3::identity(), 80.0, 0.4, 1.8, 0.3)?;
    if let Some(body) = world.player_mut(player) {
        body.kinematic_mut().set_matrix(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        body.set_forward_speed(4.0);
    }

    let frames = (RUN_TIME / FRAME_TIME).round() as u32;
    for frame in 0..frames {
        let time = frame as f32 * FRAME_TIME;
        if let Some(body) = world.player_mut(player) {
            // walk, then turn left while strafing
            if time > 2.0 {
                body.set_inputs(3.0, 1.0, std::f32::consts::FRAC_PI_2);
            }
        }

        world.update(FRAME_TIME);

        if frame % 15 == 0 {
            if let Some(body) = world.player(player) {
                let kinematic = body.kinematic();
                log::info!(
                    "t={:.2}s pos={:.2?} vel={:.2?} heading={:.2} state={:?} contacts={}",
                    time,
                    kinematic.matrix().position.as_slice(),
                    kinematic.velocity().as_slice(),
                    body.current_heading(),
                    body.floor_state(),
                    world.contacts(player).len()
                );
            }
        }
    }

    log::info!(
        "Finished after {} ticks, total momentum {:.2?}",
        world.tick(),
        world.linear_momentum().as_slice()
    );

    if let Some(path) = args.get(2) {
        SceneDocument::capture(&world).save_to_file(path)?;
        log::info!("Saved scene to {}", path);
    }
    Ok(())
}

fn main() {
    rigid_engine::foundation::logging::init();

    log::info!("Starting capsule controller demo");
    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        std::process::exit(1);
    }
}
