//! Debug module for shape visualization
//!
//! Shapes describe themselves as outline polygons through a sink trait, so
//! any renderer or test can consume them.

pub mod shape_debug;

pub use shape_debug::{DebugPolygon, DebugPolygonCollector, ShapeDebugNotify};
