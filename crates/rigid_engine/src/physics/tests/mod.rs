//! Cross-module tests: world, controller, shape sharing and persistence

mod controller_integration;
mod shape_sharing;
