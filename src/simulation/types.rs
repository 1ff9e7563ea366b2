//! Core types for the snow simulation
//!
//! Identifiers, geometry and the plain data records stored in the road network.

use super::config::TierBoundaries;

/// A unique identifier for simulation agents
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// Index of a location in the road network's location table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationId(pub usize);

/// Index of a segment in the road network's segment table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub usize);

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarId(pub SimId);

/// A wrapper type for plow and tow truck IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub SimId);

/// What a location is used for. Pathfinding treats all kinds the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Plain road junction
    Junction,
    /// Cars spawn and despawn here
    Terminus,
    /// Service vehicles start and end their missions here
    Depot,
}

/// Type of service vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Plow,
    TowTruck,
}

/// Snow depth bucket of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SnowTier {
    Clear,
    Light,
    Moderate,
    Deep,
}

impl SnowTier {
    pub fn from_accumulation(accumulation: f32, tiers: &TierBoundaries) -> Self {
        if accumulation >= tiers.deep {
            SnowTier::Deep
        } else if accumulation >= tiers.moderate {
            SnowTier::Moderate
        } else if accumulation >= tiers.light {
            SnowTier::Light
        } else {
            SnowTier::Clear
        }
    }

    /// Single character used by the terminal map
    pub fn glyph(&self) -> char {
        match self {
            SnowTier::Clear => '.',
            SnowTier::Light => ':',
            SnowTier::Moderate => '*',
            SnowTier::Deep => '#',
        }
    }
}

/// A 2D position in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Heading in radians from this position towards another
    pub fn angle_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0.0 && dy == 0.0 {
            0.0
        } else {
            dy.atan2(dx)
        }
    }

    /// Offset to the right-hand side of the direction towards `other`
    pub fn perpendicular_offset(&self, other: &Position, offset: f32) -> Position {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len > 0.0 {
            // Rotate the direction 90 degrees clockwise
            Position {
                x: dy / len * offset,
                y: -dx / len * offset,
            }
        } else {
            Position::default()
        }
    }
}

/// A location (node) of the road network
#[derive(Debug, Clone)]
pub struct SimLocation {
    pub id: LocationId,
    pub position: Position,
    pub kind: LocationKind,
}

/// An undirected road segment connecting two locations
#[derive(Debug, Clone)]
pub struct SimSegment {
    pub id: SegmentId,
    pub a: LocationId,
    pub b: LocationId,
    pub length: f32,
    /// Snow depth, never negative
    pub accumulation: f32,
    pub obstructed: bool,
}

impl SimSegment {
    pub fn new(id: SegmentId, a: LocationId, b: LocationId, a_pos: &Position, b_pos: &Position) -> Self {
        Self {
            id,
            a,
            b,
            length: a_pos.distance(b_pos),
            accumulation: 0.0,
            obstructed: false,
        }
    }

    pub fn touches(&self, location: LocationId) -> bool {
        self.a == location || self.b == location
    }

    pub fn tier(&self, tiers: &TierBoundaries) -> SnowTier {
        SnowTier::from_accumulation(self.accumulation, tiers)
    }
}
