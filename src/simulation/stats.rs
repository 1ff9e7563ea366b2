//! Run statistics for the snow simulation

use log::info;

/// Counters describing a simulation run so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    pub elapsed_time: f32,
    pub total_cars_spawned: usize,
    pub total_cars_exited: usize,
    pub total_cars_rescued: usize,
    pub active_cars: usize,
    /// Cars currently immobilized
    pub stuck_cars: usize,
    pub plows_dispatched: usize,
    pub tows_dispatched: usize,
    pub active_service_vehicles: usize,
    pub service_vehicles_returned: usize,
    pub service_vehicles_abandoned: usize,
    pub total_locations: usize,
    pub total_segments: usize,
    /// Snow lying on the whole network
    pub total_accumulation: f32,
}

impl SimulationStats {
    /// Share of spawned cars that made it to their destination
    pub fn completion_rate(&self) -> f32 {
        if self.total_cars_spawned > 0 {
            (self.total_cars_exited as f32 / self.total_cars_spawned as f32) * 100.0
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Elapsed time: {:.2}s", self.elapsed_time);
        info!("Total cars spawned: {}", self.total_cars_spawned);
        info!("Total cars exited: {}", self.total_cars_exited);
        info!("Total cars rescued: {}", self.total_cars_rescued);
        info!("Active cars: {} ({} stuck)", self.active_cars, self.stuck_cars);
        info!(
            "Plows dispatched: {}, tow trucks dispatched: {}",
            self.plows_dispatched, self.tows_dispatched
        );
        info!(
            "Service vehicles out: {}, returned: {}, abandoned: {}",
            self.active_service_vehicles,
            self.service_vehicles_returned,
            self.service_vehicles_abandoned
        );
        info!(
            "Locations: {}, segments: {}, snow on roads: {:.1}",
            self.total_locations, self.total_segments, self.total_accumulation
        );
        info!("Completion rate: {:.1}%", self.completion_rate());
    }
}
