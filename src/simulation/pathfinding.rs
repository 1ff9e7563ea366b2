//! Snow-aware route planning
//!
//! A* over the road network. Segment cost is its length plus a capped snow
//! penalty; obstructed segments are filtered out of the graph view unless the
//! policy says otherwise. The straight-line heuristic never exceeds a segment
//! cost, so the first route found is optimal.

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::EdgeReference;
use petgraph::visit::{EdgeFiltered, EdgeRef};

use super::road_network::SimRoadNetwork;
use super::route::Route;
use super::types::{LocationId, SegmentId, SimSegment};

/// Snow penalty per unit of accumulation, before the cap
const SNOW_PENALTY_PER_UNIT: f32 = 0.5;
/// Cap on the per-unit penalty
const SNOW_PENALTY_CAP: f32 = 5.0;
/// Scale of the capped penalty in distance units
const SNOW_PENALTY_SCALE: f32 = 10.0;

/// Weights used when comparing a fresh route against the one a car is on
const CONGESTION_BASE: f32 = 1.0;
const CONGESTION_PER_UNIT: f32 = 0.5;
const CONGESTION_OBSTRUCTED: f32 = 100.0;

/// Which segment state the planner takes into account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub ignore_obstruction: bool,
    pub ignore_accumulation: bool,
}

impl RoutePolicy {
    /// Avoid snow and never use obstructed segments (cars)
    pub const AWARE: RoutePolicy = RoutePolicy {
        ignore_obstruction: false,
        ignore_accumulation: false,
    };

    /// Shortest distance regardless of conditions (service vehicles)
    pub const IGNORE_ALL: RoutePolicy = RoutePolicy {
        ignore_obstruction: true,
        ignore_accumulation: true,
    };
}

/// Cost of traversing one segment under a policy
pub fn segment_cost(segment: &SimSegment, policy: RoutePolicy) -> f32 {
    let penalty = if policy.ignore_accumulation {
        0.0
    } else {
        (segment.accumulation * SNOW_PENALTY_PER_UNIT).min(SNOW_PENALTY_CAP) * SNOW_PENALTY_SCALE
    };
    segment.length + penalty
}

/// Sum of [`segment_cost`] over a list of segments
pub fn route_cost(network: &SimRoadNetwork, segments: &[SegmentId], policy: RoutePolicy) -> Result<f32> {
    segments.iter().try_fold(0.0, |total, id| {
        let segment = network
            .segment(*id)
            .with_context(|| format!("Segment {:?} not found", id))?;
        Ok(total + segment_cost(segment, policy))
    })
}

/// Distance-free measure of how unpleasant a list of segments is to drive.
/// Used by cars to decide whether a new route is worth switching to.
pub fn congestion_cost(network: &SimRoadNetwork, segments: &[SegmentId]) -> Result<f32> {
    segments.iter().try_fold(0.0, |total, id| {
        let segment = network
            .segment(*id)
            .with_context(|| format!("Segment {:?} not found", id))?;
        let obstructed = if segment.obstructed {
            CONGESTION_OBSTRUCTED
        } else {
            0.0
        };
        Ok(total + CONGESTION_BASE + CONGESTION_PER_UNIT * segment.accumulation + obstructed)
    })
}

/// Finds the cheapest route from `start` to `goal`.
///
/// Returns `None` if the goal cannot be reached (or either location is
/// unknown); an empty route if `start == goal`.
pub fn find_route(
    network: &SimRoadNetwork,
    start: LocationId,
    goal: LocationId,
    policy: RoutePolicy,
) -> Option<Route> {
    let start_node = network.node(start)?;
    let goal_node = network.node(goal)?;
    if start_node == goal_node {
        return Some(Route::default());
    }
    let goal_pos = network.location_position(goal).ok()?;

    let segments = network.segments();
    let open = EdgeFiltered::from_fn(network.graph(), |edge: EdgeReference<'_, SegmentId>| {
        policy.ignore_obstruction || !segments[edge.weight().0].obstructed
    });

    let (_, nodes) = astar(
        &open,
        start_node,
        |node| node == goal_node,
        |edge| segment_cost(&segments[edge.weight().0], policy),
        |node| {
            let location = network.graph()[node];
            network
                .location_position(location)
                .map(|pos| pos.distance(&goal_pos))
                .unwrap_or(0.0)
        },
    )?;

    // Parallel segments are possible, so pick the cheapest usable one per hop
    let mut route = Route::default();
    for hop in nodes.windows(2) {
        let segment = network
            .graph()
            .edges_connecting(hop[0], hop[1])
            .map(|edge| &segments[edge.weight().0])
            .filter(|segment| policy.ignore_obstruction || !segment.obstructed)
            .min_by_key(|segment| OrderedFloat(segment_cost(segment, policy)))?;
        route.push(segment.id);
    }
    Some(route)
}
