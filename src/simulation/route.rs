//! Routes and route-walking state shared by every kind of vehicle

use anyhow::{Context, Result};

use super::road_network::SimRoadNetwork;
use super::types::{LocationId, Position, SegmentId};

/// An ordered walk through the road network, stored as segment ids only.
///
/// The direction of travel is not stored: it follows from the location the
/// walk starts at (see [`SimRoadNetwork::segment_start`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    segments: Vec<SegmentId>,
}

impl Route {
    pub fn new(segments: Vec<SegmentId>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SegmentId> {
        self.segments.get(index).copied()
    }

    pub fn push(&mut self, segment: SegmentId) {
        self.segments.push(segment);
    }

    /// Segments from `index` to the end
    pub fn remaining(&self, index: usize) -> &[SegmentId] {
        self.segments.get(index..).unwrap_or(&[])
    }
}

/// Where a vehicle is on its route.
///
/// `location` is always the endpoint the vehicle entered its current segment
/// from, or the final location once the route is exhausted.
#[derive(Debug, Clone)]
pub struct RouteCursor {
    route: Route,
    origin: LocationId,
    index: usize,
    progress: f32,
    location: LocationId,
}

impl RouteCursor {
    pub fn new(route: Route, origin: LocationId) -> Self {
        Self {
            route,
            origin,
            index: 0,
            progress: 0.0,
            location: origin,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn location(&self) -> LocationId {
        self.location
    }

    pub fn current_segment(&self) -> Option<SegmentId> {
        self.route.get(self.index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.route.len()
    }

    pub fn remaining(&self) -> &[SegmentId] {
        self.route.remaining(self.index)
    }

    /// Start a new route from the current location.
    /// Progress is kept when the new route begins on the segment we are on.
    pub fn replace_route(&mut self, route: Route) {
        let same_segment = route.get(0).is_some() && route.get(0) == self.current_segment();
        self.route = route;
        self.origin = self.location;
        self.index = 0;
        if !same_segment {
            self.progress = 0.0;
        }
    }

    /// Move `distance` world units along the current segment.
    ///
    /// Returns true when the end of the segment was reached; the cursor then
    /// sits at the start of the next segment.
    pub fn advance(&mut self, network: &SimRoadNetwork, distance: f32) -> Result<bool> {
        let segment_id = self
            .current_segment()
            .context("Cannot advance along an exhausted route")?;
        let segment = network
            .segment(segment_id)
            .context("Route references unknown segment")?;

        self.progress += distance / segment.length.max(f32::EPSILON);
        if self.progress < 1.0 {
            return Ok(false);
        }

        self.location = network.other_endpoint(segment_id, self.location)?;
        self.index += 1;
        self.progress = 0.0;
        Ok(true)
    }

    #[cfg(test)]
    pub(crate) fn set_progress(&mut self, progress: f32) {
        self.progress = progress;
    }

    /// World position and heading, shifted sideways by `lateral_offset`
    pub fn position(&self, network: &SimRoadNetwork, lateral_offset: f32) -> Result<(Position, f32)> {
        network.position_along(
            &self.route,
            self.index,
            self.progress,
            Some(self.origin),
            lateral_offset,
        )
    }
}
