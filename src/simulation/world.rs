//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the road network and every controller, and runs them in a
//! fixed order each tick: snowfall, then traffic, then service vehicles.

use anyhow::{Context, Result};
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::car::SimCar;
use super::config::SimConfig;
use super::dispatch::{DispatchController, DispatchReport};
use super::road_network::SimRoadNetwork;
use super::service_vehicle::SimServiceVehicle;
use super::snapshot::{CarView, SegmentView, ServiceView, StormView};
use super::snow::SnowLayer;
use super::stats::SimulationStats;
use super::traffic::{TrafficController, TrafficReport};
use super::types::{
    CarId, LocationId, LocationKind, Position, SegmentId, ServiceId, ServiceKind, SimSegment,
};

/// Everything that happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub traffic: TrafficReport,
    /// Tow trucks sent out for cars that got stuck this tick
    pub tows_dispatched: Vec<ServiceId>,
    pub dispatch: DispatchReport,
}

/// The main simulation world
pub struct SimWorld {
    /// Road network shared by every component
    pub network: SimRoadNetwork,

    pub snow: SnowLayer,

    pub traffic: TrafficController,

    pub dispatch: DispatchController,

    pub config: SimConfig,

    /// Simulation time
    pub time: f32,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl SimWorld {
    fn new_internal(network: SimRoadNetwork, config: SimConfig, rng: Option<StdRng>) -> Result<Self> {
        let depot = network
            .depot()
            .context("Road network needs a depot for service vehicles")?;

        // The depot yard is kept clear so vehicles can always leave it
        let snow = network
            .segments_at(depot)
            .into_iter()
            .fold(
                SnowLayer::new(config.storm_phases.clone(), config.base_snow_rate),
                SnowLayer::with_exempt,
            );

        Ok(Self {
            network,
            snow,
            traffic: TrafficController::new(),
            dispatch: DispatchController::new(depot),
            config,
            time: 0.0,
            rng,
        })
    }

    pub fn new(network: SimRoadNetwork, config: SimConfig) -> Result<Self> {
        Self::new_internal(network, config, None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(network: SimRoadNetwork, config: SimConfig, seed: u64) -> Result<Self> {
        Self::new_internal(network, config, Some(StdRng::seed_from_u64(seed)))
    }

    /// Advance the whole simulation by `delta_secs`
    pub fn tick(&mut self, delta_secs: f32) -> TickReport {
        self.time += delta_secs;

        if let Err(error) = self.snow.tick(delta_secs, &mut self.network) {
            warn!("Snowfall failed: {:#}", error);
        }

        let traffic = match &mut self.rng {
            Some(rng) => self
                .traffic
                .tick(delta_secs, &self.network, &self.config, rng),
            None => self
                .traffic
                .tick(delta_secs, &self.network, &self.config, &mut rand::rng()),
        };

        // Every car that got stuck this tick gets a tow truck
        let tows_dispatched = traffic
            .immobilized
            .iter()
            .filter_map(|car_id| {
                self.dispatch
                    .dispatch_tow(&self.network, &self.traffic, *car_id, &self.config)
            })
            .collect();

        let dispatch = self.dispatch.tick(
            delta_secs,
            &mut self.network,
            &mut self.traffic,
            &self.config,
        );

        TickReport {
            traffic,
            tows_dispatched,
            dispatch,
        }
    }

    /// Send a plow to clear `segment`; `None` if on cooldown or unreachable
    pub fn dispatch_plow(&mut self, segment: SegmentId) -> Option<ServiceId> {
        self.dispatch
            .dispatch_plow(&self.network, segment, &self.config)
    }

    /// Send a tow truck to a stuck car; `None` if the car is not stuck or
    /// already has one coming
    pub fn dispatch_tow(&mut self, car_id: CarId) -> Option<ServiceId> {
        self.dispatch
            .dispatch_tow(&self.network, &self.traffic, car_id, &self.config)
    }

    /// Close every road at `location`, or reopen them all if they are all
    /// closed already. Returns whether the roads are now obstructed.
    pub fn toggle_obstruction(&mut self, location: LocationId) -> Result<bool> {
        let segments = self.network.segments_at(location);
        let obstruct = segments.iter().any(|segment| {
            self.network
                .segment(*segment)
                .is_some_and(|segment| !segment.obstructed)
        });

        for segment in &segments {
            self.network.set_obstructed(*segment, obstruct)?;
        }
        debug!(
            "{} {} segments at {:?}",
            if obstruct { "Obstructed" } else { "Reopened" },
            segments.len(),
            location
        );
        Ok(obstruct)
    }

    /// Segment with the most snow on it
    pub fn deepest_segment(&self) -> Option<&SimSegment> {
        self.network
            .segments()
            .iter()
            .max_by_key(|segment| OrderedFloat(segment.accumulation))
    }

    pub fn car_views(&self) -> Vec<CarView> {
        self.traffic
            .cars()
            .filter_map(|car| match car.position(&self.network, &self.config) {
                Ok((position, heading)) => Some(CarView {
                    id: car.id,
                    position,
                    heading,
                    immobilized: car.immobilized,
                    yielding: car.yielding,
                }),
                Err(error) => {
                    warn!("No position for car {:?}: {:#}", car.id.0, error);
                    None
                }
            })
            .collect()
    }

    pub fn service_views(&self) -> Vec<ServiceView> {
        self.dispatch
            .vehicles()
            .filter_map(|vehicle| match vehicle.position(&self.network, &self.config) {
                Ok((position, heading)) => Some(ServiceView {
                    id: vehicle.id,
                    kind: vehicle.kind,
                    position,
                    heading,
                    returning: vehicle.returning,
                    carrying: vehicle.carrying,
                    plow_accumulation: self.plow_accumulation(vehicle),
                }),
                Err(error) => {
                    warn!("No position for service vehicle {:?}: {:#}", vehicle.id.0, error);
                    None
                }
            })
            .collect()
    }

    fn plow_accumulation(&self, vehicle: &SimServiceVehicle) -> Option<f32> {
        if vehicle.kind != ServiceKind::Plow {
            return None;
        }
        let segment = vehicle.current_segment()?;
        self.network.segment(segment).map(|segment| segment.accumulation)
    }

    pub fn segment_views(&self) -> Vec<SegmentView> {
        self.network
            .segments()
            .iter()
            .filter_map(|segment| {
                let from = self.network.location_position(segment.a).ok()?;
                let to = self.network.location_position(segment.b).ok()?;
                Some(SegmentView {
                    id: segment.id,
                    from,
                    to,
                    accumulation: segment.accumulation,
                    tier: segment.tier(&self.config.tiers),
                    obstructed: segment.obstructed,
                })
            })
            .collect()
    }

    pub fn storm_phase(&self) -> StormView {
        StormView {
            name: self.snow.phase_name().to_string(),
            intensity: self.snow.intensity(),
        }
    }

    pub fn plow_cooldown_remaining(&self) -> f32 {
        self.dispatch.cooldown_remaining()
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            elapsed_time: self.time,
            total_cars_spawned: self.traffic.spawned_count(),
            total_cars_exited: self.traffic.exited_count(),
            total_cars_rescued: self.traffic.rescued_count(),
            active_cars: self.traffic.car_count(),
            stuck_cars: self.traffic.stuck_count(),
            plows_dispatched: self.dispatch.plows_dispatched(),
            tows_dispatched: self.dispatch.tows_dispatched(),
            active_service_vehicles: self.dispatch.vehicle_count(),
            service_vehicles_returned: self.dispatch.returned_count(),
            service_vehicles_abandoned: self.dispatch.abandoned_count(),
            total_locations: self.network.location_count(),
            total_segments: self.network.segment_count(),
            total_accumulation: self.network.total_accumulation(),
        }
    }

    /// Create the default town with the default configuration
    pub fn create_test_world() -> Result<Self> {
        Self::new(Self::build_test_network()?, SimConfig::default())
    }

    /// Create the default town with a seeded RNG for reproducible simulations
    pub fn create_test_world_with_seed(seed: u64) -> Result<Self> {
        Self::new_with_seed(Self::build_test_network()?, SimConfig::default(), seed)
    }

    /// A 3x3 grid of junctions with a terminus off the middle of each outer
    /// edge and the depot tucked beside the centre junction
    pub fn build_test_network() -> Result<SimRoadNetwork> {
        let mut network = SimRoadNetwork::new();
        let spacing = 150.0;
        let mut grid = [[LocationId(0); 3]; 3];

        for (row, junctions) in grid.iter_mut().enumerate() {
            for (col, junction) in junctions.iter_mut().enumerate() {
                let x = (col as f32 - 1.0) * spacing;
                let y = (row as f32 - 1.0) * spacing;
                *junction = network.add_location(Position::new(x, y), LocationKind::Junction);
            }
        }

        // Connect grid horizontally
        for row in 0..3 {
            for col in 0..2 {
                network.add_segment(grid[row][col], grid[row][col + 1])?;
            }
        }

        // Connect grid vertically
        for row in 0..2 {
            for col in 0..3 {
                network.add_segment(grid[row][col], grid[row + 1][col])?;
            }
        }

        let reach = spacing + 110.0;
        let termini = [
            (grid[0][1], Position::new(0.0, -reach)), // South
            (grid[1][0], Position::new(-reach, 0.0)), // West
            (grid[1][2], Position::new(reach, 0.0)),  // East
            (grid[2][1], Position::new(0.0, reach)),  // North
        ];
        for (junction, position) in termini {
            let terminus = network.add_location(position, LocationKind::Terminus);
            network.add_segment(junction, terminus)?;
        }

        let depot = network.add_location(Position::new(60.0, 60.0), LocationKind::Depot);
        network.add_segment(grid[1][1], depot)?;

        Ok(network)
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let stats = self.stats();
        let storm = self.storm_phase();

        println!("=== Snow Simulation Summary ===");
        println!("Time: {:.2}s", self.time);
        println!(
            "Storm: {} (intensity {:.1}, {:.0}s into phase)",
            storm.name,
            storm.intensity,
            self.snow.phase_elapsed()
        );
        println!(
            "Locations: {}, Segments: {}",
            stats.total_locations, stats.total_segments
        );
        println!(
            "Cars: {} active, {} stuck, {} exited, {} rescued",
            stats.active_cars, stats.stuck_cars, stats.total_cars_exited, stats.total_cars_rescued
        );
        println!(
            "Service vehicles: {} out, plow cooldown {:.1}s",
            stats.active_service_vehicles,
            self.plow_cooldown_remaining()
        );

        // Snowiest roads
        let mut segments: Vec<&SimSegment> = self.network.segments().iter().collect();
        segments.sort_by_key(|segment| std::cmp::Reverse(OrderedFloat(segment.accumulation)));
        println!("--- Deepest Segments ---");
        for segment in segments.iter().take(3) {
            println!(
                "  Segment {:?}: {:.1} ({:?}){}",
                segment.id.0,
                segment.accumulation,
                segment.tier(&self.config.tiers),
                if segment.obstructed { ", obstructed" } else { "" }
            );
        }

        if self.traffic.car_count() > 0 {
            println!("--- Active Cars ---");
            for car in self.traffic.cars() {
                println!("  {}", self.describe_car(car));
            }
        }

        if self.dispatch.vehicle_count() > 0 {
            println!("--- Service Vehicles ---");
            for vehicle in self.dispatch.vehicles() {
                println!(
                    "  {:?} {:?}: {}, segments left={}{}",
                    vehicle.kind,
                    vehicle.id.0,
                    if vehicle.returning { "returning" } else { "outbound" },
                    vehicle.cursor.remaining().len(),
                    if vehicle.blocked { ", blocked" } else { "" }
                );
            }
        }
    }

    fn describe_car(&self, car: &SimCar) -> String {
        let state = if car.immobilized {
            format!("stuck {:.1}s", car.immobilized_for)
        } else if car.yielding {
            "yielding".to_string()
        } else {
            "driving".to_string()
        };
        format!(
            "Car {:?}: {}, speed={:.1}, progress={:.2}, segments left={}",
            car.id.0,
            state,
            car.base_speed,
            car.progress(),
            car.cursor.remaining().len()
        )
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        // Find bounds of the world
        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        for location in self.network.locations() {
            min_x = min_x.min(location.position.x);
            max_x = max_x.max(location.position.x);
            min_y = min_y.min(location.position.y);
            max_y = max_y.max(location.position.y);
        }
        if min_x > max_x {
            return;
        }

        // Add padding
        min_x -= 10.0;
        max_x += 10.0;
        min_y -= 10.0;
        max_y += 10.0;

        // Terminal cells are about twice as tall as they are wide
        let scale_x = 0.12;
        let scale_y = 0.06;
        let width = ((max_x - min_x) * scale_x) as usize + 1;
        let height = ((max_y - min_y) * scale_y) as usize + 1;

        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |position: &Position| -> (usize, usize) {
            let col = ((position.x - min_x) * scale_x) as usize;
            // North is up
            let row = ((max_y - position.y) * scale_y) as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Draw roads, shaded by snow tier
        for segment in self.segment_views() {
            let glyph = if segment.obstructed {
                'X'
            } else {
                segment.tier.glyph()
            };

            let (start_row, start_col) = to_grid(&segment.from);
            let (end_row, end_col) = to_grid(&segment.to);

            // Simple line drawing (Bresenham-like)
            let dx = (end_col as i32 - start_col as i32).abs();
            let dy = (end_row as i32 - start_row as i32).abs();
            let sx = if start_col < end_col { 1 } else { -1 };
            let sy = if start_row < end_row { 1 } else { -1 };

            let mut err = dx - dy;
            let mut x = start_col as i32;
            let mut y = start_row as i32;

            loop {
                if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                    grid[y as usize][x as usize] = glyph;
                }

                if x == end_col as i32 && y == end_row as i32 {
                    break;
                }

                let e2 = 2 * err;
                if e2 > -dy {
                    err -= dy;
                    x += sx;
                }
                if e2 < dx {
                    err += dx;
                    y += sy;
                }
            }
        }

        for location in self.network.locations() {
            let (row, col) = to_grid(&location.position);
            grid[row][col] = match location.kind {
                LocationKind::Junction => '+',
                LocationKind::Terminus => 'T',
                LocationKind::Depot => 'D',
            };
        }

        for car in self.car_views() {
            let (row, col) = to_grid(&car.position);
            grid[row][col] = if car.immobilized { '!' } else { 'c' };
        }

        for vehicle in self.service_views() {
            let (row, col) = to_grid(&vehicle.position);
            grid[row][col] = match vehicle.kind {
                ServiceKind::Plow if vehicle.is_spraying(self.config.tiers.light) => 'P',
                ServiceKind::Plow => 'p',
                ServiceKind::TowTruck => 'W',
            };
        }

        // Print the grid
        println!("\n=== World Map ===");
        println!(
            "Legend: +=Junction, T=Terminus, D=Depot, c=Car, !=Stuck car, P/p=Plow, W=Tow truck"
        );
        println!("Roads: .=Clear, :=Light, *=Moderate, #=Deep, X=Obstructed");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line.trim_end());
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SimWorld {
        SimWorld::create_test_world_with_seed(42).unwrap()
    }

    #[test]
    fn test_default_town_layout() {
        let world = world();
        let network = &world.network;
        assert_eq!(network.location_count(), 9 + 4 + 1);
        assert_eq!(network.segment_count(), 12 + 4 + 1);
        assert_eq!(network.locations_of_kind(LocationKind::Terminus).len(), 4);

        let depot = network.depot().unwrap();
        assert_eq!(world.dispatch.depot(), depot);
        assert_eq!(network.segments_at(depot).len(), 1);
        assert_eq!(world.snow.exempt_segments(), network.segments_at(depot).as_slice());
    }

    #[test]
    fn test_network_without_depot_rejected() {
        let mut network = SimRoadNetwork::new();
        let a = network.add_location(Position::new(0.0, 0.0), LocationKind::Terminus);
        let b = network.add_location(Position::new(10.0, 0.0), LocationKind::Terminus);
        network.add_segment(a, b).unwrap();
        assert!(SimWorld::new(network, SimConfig::default()).is_err());
    }

    #[test]
    fn test_toggle_obstruction_ends_uniform() {
        let mut world = world();
        let centre = LocationId(4);
        let segments = world.network.segments_at(centre);
        assert_eq!(segments.len(), 5);

        // One already closed: toggling closes the rest
        world.network.set_obstructed(segments[0], true).unwrap();
        assert!(world.toggle_obstruction(centre).unwrap());
        assert!(segments
            .iter()
            .all(|id| world.network.segment(*id).unwrap().obstructed));

        assert!(!world.toggle_obstruction(centre).unwrap());
        assert!(segments
            .iter()
            .all(|id| !world.network.segment(*id).unwrap().obstructed));
    }

    #[test]
    fn test_toggle_obstruction_unknown_location_is_noop() {
        let mut world = world();
        assert!(!world.toggle_obstruction(LocationId(999)).unwrap());
        assert!(world.network.segments().iter().all(|s| !s.obstructed));
    }

    #[test]
    fn test_deepest_segment() {
        let mut world = world();
        assert!(world.deepest_segment().is_some());

        world.network.accumulate(SegmentId(5), 4.0).unwrap();
        world.network.accumulate(SegmentId(2), 1.0).unwrap();
        assert_eq!(world.deepest_segment().unwrap().id, SegmentId(5));
    }

    #[test]
    fn test_views_cover_everything() {
        let mut world = world();
        for _ in 0..100 {
            world.tick(0.1);
        }
        assert_eq!(world.car_views().len(), world.traffic.car_count());
        assert_eq!(world.segment_views().len(), world.network.segment_count());

        let segment = world.deepest_segment().unwrap().id;
        let plow = world.dispatch_plow(segment).unwrap();
        let views = world.service_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, plow);
        assert!(views[0].plow_accumulation.is_some());
        assert!(!views[0].returning);
    }

    #[test]
    fn test_stuck_car_gets_tow_in_same_tick() {
        let mut world = world();
        let config = world.config.clone();
        let south = world.network.locations_of_kind(LocationKind::Terminus)[0];
        let north = world.network.locations_of_kind(LocationKind::Terminus)[3];
        let car_id = world
            .traffic
            .spawn_car(&world.network, south, north, config.car_speed)
            .unwrap();
        let segment = world.traffic.car(car_id).unwrap().current_segment().unwrap();
        world.network.accumulate(segment, 20.0).unwrap();

        let report = world.tick(0.1);
        assert!(report.traffic.immobilized.contains(&car_id));
        assert_eq!(report.tows_dispatched.len(), 1);
        assert_eq!(world.stats().tows_dispatched, 1);

        // Asking again while the tow is on its way does nothing
        assert!(world.dispatch_tow(car_id).is_none());
    }

    #[test]
    fn test_unseeded_world_runs() {
        let mut world = SimWorld::create_test_world().unwrap();
        for _ in 0..100 {
            world.tick(0.1);
        }
        assert!((world.time - 10.0).abs() < 1e-3);
        assert!(world.stats().total_cars_spawned > 0);
    }

    #[test]
    fn test_storm_phase_reported() {
        let world = world();
        let storm = world.storm_phase();
        assert_eq!(storm.name, "Calm");
        assert_eq!(storm.intensity, 0.1);
    }
}
