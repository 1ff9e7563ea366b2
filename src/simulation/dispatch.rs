//! Dispatching plows and tow trucks from the depot
//!
//! Every mission has an outbound leg (depot to the far end of the target
//! segment) and a return leg home. Service vehicles route by distance alone
//! so that they can reach anything, snowed in or closed.

use log::{debug, warn};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use super::config::SimConfig;
use super::pathfinding::{find_route, route_cost, RoutePolicy};
use super::road_network::SimRoadNetwork;
use super::route::Route;
use super::service_vehicle::{ServiceTarget, ServiceUpdateResult, SimServiceVehicle};
use super::traffic::TrafficController;
use super::types::{CarId, LocationId, SegmentId, ServiceId, ServiceKind, SimId};

/// What happened to service vehicles during one tick
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Cars picked up by tow trucks
    pub rescued: Vec<CarId>,
    /// Vehicles back at the depot
    pub returned: Vec<ServiceId>,
    /// Vehicles that could not find their way home
    pub abandoned: Vec<ServiceId>,
}

#[derive(Debug)]
pub struct DispatchController {
    depot: LocationId,
    vehicles: BTreeMap<ServiceId, SimServiceVehicle>,
    next_id: usize,
    /// Seconds until another plow may be dispatched
    cooldown: f32,
    plows_dispatched: usize,
    tows_dispatched: usize,
    returned: usize,
    abandoned: usize,
}

impl DispatchController {
    pub fn new(depot: LocationId) -> Self {
        Self {
            depot,
            vehicles: BTreeMap::new(),
            next_id: 0,
            cooldown: 0.0,
            plows_dispatched: 0,
            tows_dispatched: 0,
            returned: 0,
            abandoned: 0,
        }
    }

    pub fn depot(&self) -> LocationId {
        self.depot
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown
    }

    /// Send a plow to clear `segment`.
    /// Returns `None` while the dispatch cooldown runs or if the segment is unreachable.
    pub fn dispatch_plow(
        &mut self,
        network: &SimRoadNetwork,
        segment: SegmentId,
        config: &SimConfig,
    ) -> Option<ServiceId> {
        if self.cooldown > 0.0 {
            debug!(
                "Plow dispatch to {:?} rejected, cooldown {:.1}s",
                segment, self.cooldown
            );
            return None;
        }

        let route = self.outbound_route(network, segment)?;
        let id = self.launch(
            ServiceKind::Plow,
            ServiceTarget::Segment(segment),
            route,
            config.plow_speed,
        );
        self.cooldown = config.plow_cooldown;
        self.plows_dispatched += 1;
        Some(id)
    }

    /// Send a tow truck to collect a stuck car.
    /// Returns `None` if the car is not stuck, already has a tow truck
    /// coming, or cannot be reached.
    pub fn dispatch_tow(
        &mut self,
        network: &SimRoadNetwork,
        traffic: &TrafficController,
        car_id: CarId,
        config: &SimConfig,
    ) -> Option<ServiceId> {
        // Trucks heading home are done with their car, empty or not
        let already_targeted = self.vehicles.values().any(|vehicle| {
            !vehicle.returning && vehicle.target == Some(ServiceTarget::Car(car_id))
        });
        if already_targeted {
            debug!("Tow for car {:?} rejected, one is already on its way", car_id.0);
            return None;
        }

        let car = traffic.car(car_id)?;
        if !car.immobilized {
            debug!("Tow for car {:?} rejected, car is not stuck", car_id.0);
            return None;
        }
        let segment = car.current_segment()?;

        let route = self.outbound_route(network, segment)?;
        let id = self.launch(
            ServiceKind::TowTruck,
            ServiceTarget::Car(car_id),
            route,
            config.tow_truck_speed,
        );
        self.tows_dispatched += 1;
        Some(id)
    }

    /// Shorter of the routes from the depot to either end of `segment`,
    /// followed by `segment` itself
    fn outbound_route(&self, network: &SimRoadNetwork, segment: SegmentId) -> Option<Route> {
        let target = network.segment(segment)?;
        let best = [target.a, target.b]
            .into_iter()
            .filter_map(|end| find_route(network, self.depot, end, RoutePolicy::IGNORE_ALL))
            .min_by_key(|route| {
                OrderedFloat(
                    route_cost(network, route.segments(), RoutePolicy::IGNORE_ALL)
                        .unwrap_or(f32::INFINITY),
                )
            });

        let Some(mut route) = best else {
            debug!("No route from depot to {:?}", segment);
            return None;
        };
        route.push(segment);
        Some(route)
    }

    fn launch(
        &mut self,
        kind: ServiceKind,
        target: ServiceTarget,
        route: Route,
        speed: f32,
    ) -> ServiceId {
        let id = ServiceId(SimId(self.next_id));
        self.next_id += 1;

        debug!(
            "Dispatched {:?} {:?} to {:?} ({} segments)",
            kind,
            id.0,
            target,
            route.len()
        );
        self.vehicles.insert(
            id,
            SimServiceVehicle::new(id, kind, target, route, self.depot, speed),
        );
        id
    }

    /// Advance every service vehicle and carry out missions that reached their target
    pub fn tick(
        &mut self,
        delta_secs: f32,
        network: &mut SimRoadNetwork,
        traffic: &mut TrafficController,
        config: &SimConfig,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.cooldown = (self.cooldown - delta_secs).max(0.0);

        let vehicle_ids: Vec<ServiceId> = self.vehicles.keys().copied().collect();
        for vehicle_id in vehicle_ids {
            let Some(mut vehicle) = self.vehicles.remove(&vehicle_id) else {
                continue;
            };

            match vehicle.update(delta_secs, network, traffic, config) {
                Ok(ServiceUpdateResult::Continue) => {
                    self.vehicles.insert(vehicle_id, vehicle);
                }
                Ok(ServiceUpdateResult::ReachedTarget) => {
                    self.complete_mission(vehicle, network, traffic, &mut report);
                }
                Ok(ServiceUpdateResult::ArrivedHome) => {
                    debug!("{:?} {:?} back at depot", vehicle.kind, vehicle_id.0);
                    self.returned += 1;
                    report.returned.push(vehicle_id);
                }
                Err(error) => {
                    warn!("Dropping service vehicle {:?}: {:#}", vehicle_id.0, error);
                }
            }
        }

        report
    }

    /// Do the job at the target (tow trucks pick up their car) and turn around
    fn complete_mission(
        &mut self,
        mut vehicle: SimServiceVehicle,
        network: &SimRoadNetwork,
        traffic: &mut TrafficController,
        report: &mut DispatchReport,
    ) {
        if let (ServiceKind::TowTruck, Some(ServiceTarget::Car(car_id))) =
            (vehicle.kind, vehicle.target)
        {
            let still_stuck = traffic.car(car_id).is_some_and(|car| car.immobilized);
            if still_stuck {
                traffic.rescue(car_id);
                vehicle.carrying = true;
                report.rescued.push(car_id);
                debug!("Tow truck {:?} picked up car {:?}", vehicle.id.0, car_id.0);
            } else {
                debug!(
                    "Tow truck {:?} found car {:?} gone or moving again",
                    vehicle.id.0, car_id.0
                );
            }
        }

        if vehicle.start_return(network, self.depot) {
            self.vehicles.insert(vehicle.id, vehicle);
        } else {
            warn!(
                "{:?} {:?} has no route back to the depot from {:?}, abandoning",
                vehicle.kind,
                vehicle.id.0,
                vehicle.current_location()
            );
            self.abandoned += 1;
            report.abandoned.push(vehicle.id);
        }
    }

    pub fn vehicle(&self, id: ServiceId) -> Option<&SimServiceVehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &SimServiceVehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn plows_dispatched(&self) -> usize {
        self.plows_dispatched
    }

    pub fn tows_dispatched(&self) -> usize {
        self.tows_dispatched
    }

    pub fn returned_count(&self) -> usize {
        self.returned
    }

    pub fn abandoned_count(&self) -> usize {
        self.abandoned
    }
}
