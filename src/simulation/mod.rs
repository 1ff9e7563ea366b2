//! Snow-storm traffic simulation core
//!
//! Everything here runs without any rendering: a driver calls
//! [`SimWorld::tick`] with the elapsed time and reads the snapshot queries
//! back out.

mod car;
mod config;
mod dispatch;
mod pathfinding;
mod road_network;
mod route;
mod service_vehicle;
mod snapshot;
mod snow;
mod stats;
mod traffic;
mod types;
mod world;

// Re-export public types for external use
pub use car::{CarUpdateResult, SimCar};
pub use config::{SimConfig, TierBoundaries};
pub use dispatch::{DispatchController, DispatchReport};
pub use pathfinding::{congestion_cost, find_route, route_cost, segment_cost, RoutePolicy};
pub use road_network::SimRoadNetwork;
pub use route::{Route, RouteCursor};
pub use service_vehicle::{ServiceTarget, ServiceUpdateResult, SimServiceVehicle};
pub use snapshot::{CarView, SegmentView, ServiceView, StormView};
pub use snow::{SnowLayer, StormPhase};
pub use stats::SimulationStats;
pub use traffic::{TrafficController, TrafficReport};
pub use types::{
    CarId, LocationId, LocationKind, Position, SegmentId, ServiceId, ServiceKind, SimId,
    SimLocation, SimSegment, SnowTier,
};
pub use world::{SimWorld, TickReport};
