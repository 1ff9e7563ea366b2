//! Car movement logic for the snow simulation
//!
//! Each tick a car either exits, gets stuck in deep snow, yields to the car
//! ahead in its lane, or drives on (re-routing first if its road is bad).

use anyhow::{Context, Result};
use log::debug;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use super::config::SimConfig;
use super::pathfinding::{congestion_cost, find_route, RoutePolicy};
use super::road_network::SimRoadNetwork;
use super::route::{Route, RouteCursor};
use super::types::{CarId, LocationId, Position, SegmentId};

/// Result of a car update indicating what action should be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarUpdateResult {
    Continue,     // Car keeps going (or waits in place)
    Exited,       // Car finished its route and should be removed
    Immobilized,  // Car just got stuck in deep snow
}

/// A car in the snow simulation
#[derive(Debug, Clone)]
pub struct SimCar {
    pub id: CarId,
    pub destination: LocationId,
    pub cursor: RouteCursor,
    pub base_speed: f32,
    /// Stuck in deep snow until a tow truck collects it or the road is cleared
    pub immobilized: bool,
    /// Seconds spent immobilized
    pub immobilized_for: f32,
    /// Waiting for the car ahead
    pub yielding: bool,
    /// Seconds until the next re-route check
    pub reroute_timer: f32,
}

impl SimCar {
    pub fn new(
        id: CarId,
        origin: LocationId,
        destination: LocationId,
        route: Route,
        base_speed: f32,
    ) -> Self {
        Self {
            id,
            destination,
            cursor: RouteCursor::new(route, origin),
            base_speed,
            immobilized: false,
            immobilized_for: 0.0,
            yielding: false,
            reroute_timer: 0.0,
        }
    }

    /// Location the car entered its current segment from
    pub fn current_location(&self) -> LocationId {
        self.cursor.location()
    }

    pub fn current_segment(&self) -> Option<SegmentId> {
        self.cursor.current_segment()
    }

    pub fn progress(&self) -> f32 {
        self.cursor.progress()
    }

    pub fn route(&self) -> &Route {
        self.cursor.route()
    }

    pub fn position(&self, network: &SimRoadNetwork, config: &SimConfig) -> Result<(Position, f32)> {
        self.cursor.position(network, config.lane_offset)
    }

    /// Update car movement logic.
    ///
    /// `others` holds every other car; the car being updated must not be in it.
    pub fn update(
        &mut self,
        delta_secs: f32,
        network: &SimRoadNetwork,
        others: &BTreeMap<CarId, SimCar>,
        config: &SimConfig,
    ) -> Result<CarUpdateResult> {
        let Some(segment_id) = self.current_segment() else {
            return Ok(CarUpdateResult::Exited);
        };
        let segment = network
            .segment(segment_id)
            .context("Car is on a segment missing from the network")?;

        if config.is_immobilizing(segment.accumulation) {
            if !self.immobilized {
                self.immobilized = true;
                self.immobilized_for = 0.0;
                self.yielding = false;
                debug!(
                    "Car {:?} stuck on {:?} (accumulation {:.1})",
                    self.id.0, segment_id, segment.accumulation
                );
                return Ok(CarUpdateResult::Immobilized);
            }
            self.immobilized_for += delta_secs;
            return Ok(CarUpdateResult::Continue);
        }

        if self.immobilized {
            debug!(
                "Car {:?} freed after {:.1}s on {:?}",
                self.id.0, self.immobilized_for, segment_id
            );
            self.immobilized = false;
            self.immobilized_for = 0.0;
        }

        if let Some((ahead, gap)) = self.car_ahead(segment_id, others) {
            let gap_distance = gap * segment.length;
            let ahead_stopped = ahead.immobilized || ahead.yielding;
            if gap_distance < config.min_separation
                || (ahead_stopped && gap_distance < config.stop_distance)
            {
                self.yielding = true;
                return Ok(CarUpdateResult::Continue);
            }
        }
        self.yielding = false;

        self.reroute_timer -= delta_secs;
        if self.reroute_timer <= 0.0 {
            self.reroute_timer = config.reroute_interval;
            let bad_segment =
                segment.accumulation > config.reroute_threshold || segment.obstructed;
            if bad_segment && self.progress() < config.reroute_progress_window {
                self.try_reroute(network, config)?;
            }
        }

        // Re-routing may have put us on a different segment
        let Some(segment_id) = self.current_segment() else {
            return Ok(CarUpdateResult::Continue);
        };
        let accumulation = network
            .segment(segment_id)
            .context("Re-routed onto a segment missing from the network")?
            .accumulation;

        let speed = self.base_speed * config.speed_factor(accumulation);
        self.cursor.advance(network, speed * delta_secs)?;

        Ok(CarUpdateResult::Continue)
    }

    /// Nearest car ahead in the same lane of `segment`, with the gap in
    /// fractions of the segment length. Ties on progress go to the lower id.
    fn car_ahead<'a>(
        &self,
        segment: SegmentId,
        others: &'a BTreeMap<CarId, SimCar>,
    ) -> Option<(&'a SimCar, f32)> {
        others
            .values()
            .filter(|other| other.id != self.id)
            .filter(|other| {
                other.current_segment() == Some(segment)
                    && other.current_location() == self.current_location()
            })
            .filter(|other| {
                other.progress() > self.progress()
                    || (other.progress() == self.progress() && other.id < self.id)
            })
            .map(|other| (other, other.progress() - self.progress()))
            .min_by_key(|(other, gap)| (OrderedFloat(*gap), other.id))
    }

    /// Switch to a fresh route if it is clearly better than what is left of
    /// the current one
    fn try_reroute(&mut self, network: &SimRoadNetwork, config: &SimConfig) -> Result<bool> {
        let Some(candidate) = find_route(
            network,
            self.current_location(),
            self.destination,
            RoutePolicy::AWARE,
        ) else {
            return Ok(false);
        };

        let old_cost = congestion_cost(network, self.cursor.remaining())?;
        let new_cost = congestion_cost(network, candidate.segments())?;
        if new_cost >= old_cost * config.reroute_hysteresis {
            return Ok(false);
        }

        debug!(
            "Car {:?} re-routed ({:.1} -> {:.1}, {} segments)",
            self.id.0,
            old_cost,
            new_cost,
            candidate.len()
        );
        self.cursor.replace_route(candidate);
        Ok(true)
    }
}
