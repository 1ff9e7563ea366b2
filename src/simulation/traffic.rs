//! Car spawning and management for the snow simulation
//!
//! The traffic controller owns every car. It spawns them between random
//! termini, runs the per-car state machine and reports which cars left the
//! network or got stuck this tick.

use log::{debug, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

use super::car::{CarUpdateResult, SimCar};
use super::config::SimConfig;
use super::pathfinding::{find_route, RoutePolicy};
use super::road_network::SimRoadNetwork;
use super::types::{CarId, LocationId, LocationKind, SimId};

/// What happened to cars during one tick
#[derive(Debug, Clone, Default)]
pub struct TrafficReport {
    /// Cars that completed their route and were removed
    pub exited: Vec<CarId>,
    /// Cars that became stuck this tick
    pub immobilized: Vec<CarId>,
}

#[derive(Debug, Default)]
pub struct TrafficController {
    cars: BTreeMap<CarId, SimCar>,
    next_id: usize,
    /// Seconds since the last spawn attempt
    spawn_timer: f32,
    spawned: usize,
    exited: usize,
    rescued: usize,
}

impl TrafficController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every car, then spawns a new one if the spawn interval elapsed.
    /// A non-positive spawn interval turns automatic spawning off.
    pub fn tick(
        &mut self,
        delta_secs: f32,
        network: &SimRoadNetwork,
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> TrafficReport {
        let report = self.update_cars(delta_secs, network, config);

        if config.spawn_interval <= 0.0 {
            return report;
        }
        self.spawn_timer += delta_secs;
        if self.spawn_timer >= config.spawn_interval {
            self.spawn_timer -= config.spawn_interval;
            self.spawn_random_car(network, config, rng);
        }

        report
    }

    /// Update all cars in the simulation
    pub fn update_cars(
        &mut self,
        delta_secs: f32,
        network: &SimRoadNetwork,
        config: &SimConfig,
    ) -> TrafficReport {
        let mut report = TrafficReport::default();

        // Collect car IDs to avoid borrow issues
        let car_ids: Vec<CarId> = self.cars.keys().copied().collect();

        for car_id in car_ids {
            // Take the car out so it can look at everyone else
            let Some(mut car) = self.cars.remove(&car_id) else {
                continue;
            };

            match car.update(delta_secs, network, &self.cars, config) {
                Ok(CarUpdateResult::Continue) => {
                    self.cars.insert(car_id, car);
                }
                Ok(CarUpdateResult::Immobilized) => {
                    self.cars.insert(car_id, car);
                    report.immobilized.push(car_id);
                }
                Ok(CarUpdateResult::Exited) => {
                    debug!("Car {:?} exited at {:?}", car_id.0, car.current_location());
                    self.exited += 1;
                    report.exited.push(car_id);
                }
                Err(error) => {
                    warn!("Removing car {:?}: {:#}", car_id.0, error);
                }
            }
        }

        report
    }

    /// Spawn a car between two distinct random termini.
    /// Skips silently when there are fewer than two termini or no route.
    pub fn spawn_random_car(
        &mut self,
        network: &SimRoadNetwork,
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> Option<CarId> {
        let termini = network.locations_of_kind(LocationKind::Terminus);
        let picked: Vec<LocationId> = termini.choose_multiple(rng, 2).copied().collect();
        let &[origin, destination] = picked.as_slice() else {
            return None;
        };

        let variation = config.car_speed_variation.abs();
        let factor = if variation > 0.0 {
            rng.random_range(1.0 - variation..=1.0 + variation)
        } else {
            1.0
        };

        self.spawn_car(network, origin, destination, config.car_speed * factor)
    }

    /// Spawn a car on the cheapest route from `origin` to `destination`
    pub fn spawn_car(
        &mut self,
        network: &SimRoadNetwork,
        origin: LocationId,
        destination: LocationId,
        base_speed: f32,
    ) -> Option<CarId> {
        if origin == destination {
            return None;
        }
        let Some(route) = find_route(network, origin, destination, RoutePolicy::AWARE) else {
            debug!("No route from {:?} to {:?}, skipping spawn", origin, destination);
            return None;
        };

        let id = CarId(SimId(self.next_id));
        self.next_id += 1;
        self.spawned += 1;

        debug!(
            "Spawned car {:?} {:?} -> {:?} ({} segments, speed {:.1})",
            id.0,
            origin,
            destination,
            route.len(),
            base_speed
        );
        self.cars
            .insert(id, SimCar::new(id, origin, destination, route, base_speed));
        Some(id)
    }

    /// Remove a car collected by a tow truck
    pub fn rescue(&mut self, car_id: CarId) -> Option<SimCar> {
        let car = self.cars.remove(&car_id)?;
        self.rescued += 1;
        Some(car)
    }

    pub fn car(&self, car_id: CarId) -> Option<&SimCar> {
        self.cars.get(&car_id)
    }

    pub fn car_mut(&mut self, car_id: CarId) -> Option<&mut SimCar> {
        self.cars.get_mut(&car_id)
    }

    pub fn cars(&self) -> impl Iterator<Item = &SimCar> {
        self.cars.values()
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned
    }

    pub fn exited_count(&self) -> usize {
        self.exited
    }

    pub fn rescued_count(&self) -> usize {
        self.rescued
    }

    /// Cars currently immobilized
    pub fn stuck_count(&self) -> usize {
        self.cars.values().filter(|car| car.immobilized).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{Position, SegmentId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn straight_road(length: f32) -> (SimRoadNetwork, LocationId, LocationId) {
        let mut network = SimRoadNetwork::new();
        let a = network.add_location(Position::new(0.0, 0.0), LocationKind::Terminus);
        let b = network.add_location(Position::new(length, 0.0), LocationKind::Terminus);
        network.add_segment(a, b).unwrap();
        (network, a, b)
    }

    #[test]
    fn test_car_exits_once_after_travel_time() {
        let (network, a, b) = straight_road(500.0);
        let config = SimConfig::default();
        let mut traffic = TrafficController::new();
        let car_id = traffic.spawn_car(&network, a, b, 40.0).unwrap();

        // 500 / 40 = 12.5s of driving, then a tick to notice the end
        let mut exits = Vec::new();
        for _ in 0..130 {
            exits.extend(traffic.update_cars(0.1, &network, &config).exited);
        }
        assert_eq!(exits, vec![car_id]);
        assert_eq!(traffic.exited_count(), 1);
        assert_eq!(traffic.car_count(), 0);

        for _ in 0..20 {
            assert!(traffic.update_cars(0.1, &network, &config).exited.is_empty());
        }
        assert_eq!(traffic.exited_count(), 1);
    }

    #[test]
    fn test_car_not_done_before_travel_time() {
        let (network, a, b) = straight_road(500.0);
        let config = SimConfig::default();
        let mut traffic = TrafficController::new();
        traffic.spawn_car(&network, a, b, 40.0).unwrap();

        for _ in 0..120 {
            traffic.update_cars(0.1, &network, &config);
        }
        assert_eq!(traffic.car_count(), 1);
    }

    #[test]
    fn test_deep_snow_strands_car_before_far_end() {
        let (mut network, a, b) = straight_road(500.0);
        let config = SimConfig::default();
        let mut traffic = TrafficController::new();
        let car_id = traffic.spawn_car(&network, a, b, 40.0).unwrap();

        for _ in 0..50 {
            traffic.update_cars(0.1, &network, &config);
        }
        // 0.3/s for 40s at intensity 1.0
        network.accumulate(SegmentId(0), 0.3 * 40.0).unwrap();

        let report = traffic.update_cars(0.1, &network, &config);
        assert_eq!(report.immobilized, vec![car_id]);
        assert_eq!(traffic.stuck_count(), 1);

        for _ in 0..200 {
            let report = traffic.update_cars(0.1, &network, &config);
            assert!(report.exited.is_empty());
            assert!(report.immobilized.is_empty());
        }
        let car = traffic.car(car_id).unwrap();
        assert!(car.immobilized);
        assert!(car.progress() < 1.0);
    }

    #[test]
    fn test_trailing_car_yields_and_holds_position() {
        let (network, a, b) = straight_road(500.0);
        let config = SimConfig::default();
        let mut traffic = TrafficController::new();
        let leader = traffic.spawn_car(&network, a, b, 40.0).unwrap();
        let follower = traffic.spawn_car(&network, a, b, 20.0).unwrap();

        // Both start at the same spot: the follower waits for the leader
        traffic.update_cars(0.1, &network, &config);
        assert!(!traffic.car(leader).unwrap().yielding);
        assert!(traffic.car(follower).unwrap().yielding);
        assert_eq!(traffic.car(follower).unwrap().progress(), 0.0);

        // Once the gap opens up past the minimum separation it drives on
        for _ in 0..10 {
            traffic.update_cars(0.1, &network, &config);
        }
        assert!(!traffic.car(follower).unwrap().yielding);
        assert!(traffic.car(follower).unwrap().progress() > 0.0);
    }

    #[test]
    fn test_random_spawn_needs_two_termini() {
        let mut network = SimRoadNetwork::new();
        let a = network.add_location(Position::new(0.0, 0.0), LocationKind::Terminus);
        let j = network.add_location(Position::new(100.0, 0.0), LocationKind::Junction);
        network.add_segment(a, j).unwrap();

        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut traffic = TrafficController::new();
        assert!(traffic.spawn_random_car(&network, &config, &mut rng).is_none());
        assert_eq!(traffic.spawned_count(), 0);
    }

    #[test]
    fn test_spawn_skipped_without_route() {
        let mut network = SimRoadNetwork::new();
        let a = network.add_location(Position::new(0.0, 0.0), LocationKind::Terminus);
        let b = network.add_location(Position::new(100.0, 0.0), LocationKind::Terminus);
        let ab = network.add_segment(a, b).unwrap();
        network.set_obstructed(ab, true).unwrap();

        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut traffic = TrafficController::new();
        for _ in 0..100 {
            traffic.tick(0.5, &network, &config, &mut rng);
        }
        assert_eq!(traffic.car_count(), 0);
        assert_eq!(traffic.spawned_count(), 0);
    }

    #[test]
    fn test_tick_spawns_on_interval_between_distinct_termini() {
        let (network, _, _) = straight_road(500.0);
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let mut traffic = TrafficController::new();

        // 2.9s: nothing yet
        for _ in 0..29 {
            traffic.tick(0.1, &network, &config, &mut rng);
        }
        assert_eq!(traffic.spawned_count(), 0);

        for _ in 0..2 {
            traffic.tick(0.1, &network, &config, &mut rng);
        }
        assert_eq!(traffic.spawned_count(), 1);
        let car = traffic.cars().next().unwrap();
        assert_ne!(car.current_location(), car.destination);
        let variation = config.car_speed_variation;
        assert!(car.base_speed >= config.car_speed * (1.0 - variation) - 1e-3);
        assert!(car.base_speed <= config.car_speed * (1.0 + variation) + 1e-3);
    }

    #[test]
    fn test_non_positive_spawn_interval_disables_spawning() {
        let (network, _, _) = straight_road(500.0);
        let mut rng = StdRng::seed_from_u64(5);

        for interval in [0.0, -2.0] {
            let config = SimConfig {
                spawn_interval: interval,
                ..SimConfig::default()
            };
            let mut traffic = TrafficController::new();
            for _ in 0..100 {
                traffic.tick(0.1, &network, &config, &mut rng);
            }
            assert_eq!(traffic.spawned_count(), 0);
            assert_eq!(traffic.spawn_timer, 0.0);
        }
    }

    #[test]
    fn test_rescue_removes_and_counts() {
        let (network, a, b) = straight_road(500.0);
        let mut traffic = TrafficController::new();
        let car_id = traffic.spawn_car(&network, a, b, 40.0).unwrap();

        assert!(traffic.rescue(car_id).is_some());
        assert!(traffic.rescue(car_id).is_none());
        assert_eq!(traffic.rescued_count(), 1);
        assert_eq!(traffic.car_count(), 0);
        assert_eq!(traffic.exited_count(), 0);
    }
}
