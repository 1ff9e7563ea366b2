//! Plows and tow trucks
//!
//! A service vehicle drives an outbound route from the depot to its target,
//! then a return route home. Plows clear snow on whatever segment they drive
//! over, unless a stuck car in front of them blocks the road.

use anyhow::{Context, Result};

use super::config::SimConfig;
use super::pathfinding::{find_route, RoutePolicy};
use super::road_network::SimRoadNetwork;
use super::route::{Route, RouteCursor};
use super::traffic::TrafficController;
use super::types::{CarId, LocationId, Position, SegmentId, ServiceId, ServiceKind};

/// What a service vehicle was sent for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTarget {
    /// Segment a plow should clear
    Segment(SegmentId),
    /// Stuck car a tow truck should collect
    Car(CarId),
}

/// Result of a service vehicle update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceUpdateResult {
    Continue,
    /// Outbound route finished, the mission should be carried out
    ReachedTarget,
    /// Return route finished, the vehicle is back at the depot
    ArrivedHome,
}

#[derive(Debug, Clone)]
pub struct SimServiceVehicle {
    pub id: ServiceId,
    pub kind: ServiceKind,
    pub target: Option<ServiceTarget>,
    pub cursor: RouteCursor,
    pub speed: f32,
    /// On the way back to the depot
    pub returning: bool,
    /// Tow truck has a rescued car on board
    pub carrying: bool,
    /// Plow is held up by a stuck car this tick
    pub blocked: bool,
}

impl SimServiceVehicle {
    pub fn new(
        id: ServiceId,
        kind: ServiceKind,
        target: ServiceTarget,
        route: Route,
        depot: LocationId,
        speed: f32,
    ) -> Self {
        Self {
            id,
            kind,
            target: Some(target),
            cursor: RouteCursor::new(route, depot),
            speed,
            returning: false,
            carrying: false,
            blocked: false,
        }
    }

    pub fn current_location(&self) -> LocationId {
        self.cursor.location()
    }

    pub fn current_segment(&self) -> Option<SegmentId> {
        self.cursor.current_segment()
    }

    pub fn progress(&self) -> f32 {
        self.cursor.progress()
    }

    pub fn position(&self, network: &SimRoadNetwork, config: &SimConfig) -> Result<(Position, f32)> {
        self.cursor.position(network, config.lane_offset)
    }

    pub fn update(
        &mut self,
        delta_secs: f32,
        network: &mut SimRoadNetwork,
        traffic: &TrafficController,
        config: &SimConfig,
    ) -> Result<ServiceUpdateResult> {
        let Some(segment_id) = self.current_segment() else {
            return Ok(if self.returning {
                ServiceUpdateResult::ArrivedHome
            } else {
                ServiceUpdateResult::ReachedTarget
            });
        };

        if self.kind == ServiceKind::Plow {
            self.blocked = self.stuck_car_ahead(segment_id, traffic);
            if self.blocked {
                return Ok(ServiceUpdateResult::Continue);
            }
            network
                .clear(segment_id, config.plow_clear_rate * delta_secs)
                .context("Plow is on a segment missing from the network")?;
        }

        self.cursor.advance(network, self.speed * delta_secs)?;
        Ok(ServiceUpdateResult::Continue)
    }

    /// True if an immobilized car sits on `segment` further along than us.
    /// Cars travelling the other way are mirrored into our direction.
    fn stuck_car_ahead(&self, segment: SegmentId, traffic: &TrafficController) -> bool {
        traffic
            .cars()
            .filter(|car| car.immobilized && car.current_segment() == Some(segment))
            .any(|car| {
                let along = if car.current_location() == self.current_location() {
                    car.progress()
                } else {
                    1.0 - car.progress()
                };
                along > self.progress()
            })
    }

    /// Head back to the depot. Returns false if there is no way home.
    pub fn start_return(&mut self, network: &SimRoadNetwork, depot: LocationId) -> bool {
        match find_route(network, self.current_location(), depot, RoutePolicy::IGNORE_ALL) {
            Some(route) => {
                self.cursor.replace_route(route);
                self.returning = true;
                self.blocked = false;
                true
            }
            None => false,
        }
    }
}
