//! Read-only views of the simulation for whatever draws it
//!
//! These are plain values copied out of the world every frame; nothing in
//! them refers back into the simulation.

use super::types::{CarId, Position, SegmentId, ServiceId, ServiceKind, SnowTier};

#[derive(Debug, Clone, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub position: Position,
    /// Radians, measured from the x axis
    pub heading: f32,
    pub immobilized: bool,
    pub yielding: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceView {
    pub id: ServiceId,
    pub kind: ServiceKind,
    pub position: Position,
    pub heading: f32,
    pub returning: bool,
    pub carrying: bool,
    /// Snow on the segment a plow is driving over, `None` for tow trucks
    pub plow_accumulation: Option<f32>,
}

impl ServiceView {
    /// Whether a plow should be drawn throwing snow
    pub fn is_spraying(&self, threshold: f32) -> bool {
        self.plow_accumulation
            .is_some_and(|accumulation| accumulation > threshold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentView {
    pub id: SegmentId,
    pub from: Position,
    pub to: Position,
    pub accumulation: f32,
    pub tier: SnowTier,
    pub obstructed: bool,
}

/// Current storm phase
#[derive(Debug, Clone, PartialEq)]
pub struct StormView {
    pub name: String,
    pub intensity: f32,
}
