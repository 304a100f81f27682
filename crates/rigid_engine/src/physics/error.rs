//! Physics error types

use crate::config::ConfigError;
use crate::foundation::math::Vec3;

/// Errors raised by shape instances, bodies and the world
#[derive(thiserror::Error, Debug)]
pub enum PhysicsError {
    /// Scale components must be finite and strictly positive
    #[error("Invalid scale: {0:?}")]
    InvalidScale(Vec3),

    /// A construction or setter argument is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The shape kind has no closed form for the requested query
    #[error("Unsupported shape for {0}")]
    UnsupportedShape(&'static str),

    /// Compounds may only hold convex children
    #[error("Compound shapes cannot contain other compounds")]
    NestedCompound,

    /// Handle does not name a live body
    #[error("Unknown body handle")]
    UnknownBody,

    /// Saved document references a shape id that is not in the document
    #[error("Unknown shape id: {0}")]
    UnknownShape(u32),

    /// Reading or writing a saved document failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] ConfigError),
}
