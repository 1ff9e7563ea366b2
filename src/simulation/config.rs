//! Simulation tuning constants
//!
//! Everything here is fixed when the world is built. Controllers receive the
//! config by reference every tick.

use super::snow::StormPhase;

/// Accumulation values at which a segment enters the next snow tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBoundaries {
    pub light: f32,
    pub moderate: f32,
    /// Cars on a segment at or above this depth are immobilized
    pub deep: f32,
}

impl Default for TierBoundaries {
    fn default() -> Self {
        Self {
            light: 3.0,
            moderate: 6.0,
            deep: 9.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tiers: TierBoundaries,

    /// Accumulation added per second at storm intensity 1.0
    pub base_snow_rate: f32,
    /// Cyclic weather schedule
    pub storm_phases: Vec<StormPhase>,

    /// Car speed in world units per second
    pub car_speed: f32,
    /// Relative spread of per-car speed around `car_speed` (0.15 = +/-15%)
    pub car_speed_variation: f32,
    pub plow_speed: f32,
    pub tow_truck_speed: f32,

    /// Seconds between car spawns
    pub spawn_interval: f32,

    /// Seconds between re-route checks of a single car
    pub reroute_interval: f32,
    /// Re-routing is only considered while progress is below this
    pub reroute_progress_window: f32,
    /// Segment accumulation above which a car looks for a better route
    pub reroute_threshold: f32,
    /// A new route must cost less than this fraction of the remaining old one
    pub reroute_hysteresis: f32,

    /// Cars stop behind a stopped car closer than this
    pub stop_distance: f32,
    /// Cars always stop behind any car closer than this
    pub min_separation: f32,

    /// Speed lost per unit of accumulation
    pub speed_penalty_per_unit: f32,
    /// Lowest speed factor snow can impose
    pub speed_penalty_floor: f32,

    /// Accumulation a plow removes per second
    pub plow_clear_rate: f32,
    /// Seconds between plow dispatches
    pub plow_cooldown: f32,

    /// Lateral distance of the driving lane from the road centre line
    pub lane_offset: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tiers: TierBoundaries::default(),
            base_snow_rate: 0.3,
            storm_phases: vec![
                StormPhase::new("Calm", 20.0, 0.1),
                StormPhase::new("Flurries", 25.0, 0.5),
                StormPhase::new("Snowfall", 30.0, 1.0),
                StormPhase::new("Blizzard", 15.0, 2.0),
            ],
            car_speed: 40.0,
            car_speed_variation: 0.15,
            plow_speed: 60.0,
            tow_truck_speed: 70.0,
            spawn_interval: 3.0,
            reroute_interval: 1.0,
            reroute_progress_window: 0.1,
            reroute_threshold: 6.0,
            reroute_hysteresis: 0.8,
            stop_distance: 30.0,
            min_separation: 12.0,
            speed_penalty_per_unit: 0.08,
            speed_penalty_floor: 0.3,
            plow_clear_rate: 4.0,
            plow_cooldown: 5.0,
            lane_offset: 6.0,
        }
    }
}

impl SimConfig {
    /// Multiplier applied to a car's base speed on a segment with this much snow
    pub fn speed_factor(&self, accumulation: f32) -> f32 {
        (1.0 - accumulation * self.speed_penalty_per_unit).max(self.speed_penalty_floor)
    }

    pub fn is_immobilizing(&self, accumulation: f32) -> bool {
        accumulation >= self.tiers.deep
    }
}
