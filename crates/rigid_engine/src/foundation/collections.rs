//! Specialized collection types

pub use slotmap::{SlotMap, SecondaryMap};

slotmap::new_key_type! {
    /// Stable handle to a body stored in the physics world
    pub struct BodyHandle;
}

/// Handle-based map for bodies
pub type BodyMap<T> = SlotMap<BodyHandle, T>;
