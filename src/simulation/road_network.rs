//! Road network graph shared by every simulation component
//!
//! Topology lives in a petgraph undirected graph whose edge weights are
//! segment ids; the mutable per-segment state (snow, obstruction) lives in the
//! segment table. Nothing is ever removed once added, so ids double as table
//! indices.

use anyhow::{Context, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use super::route::Route;
use super::types::{LocationId, LocationKind, Position, SegmentId, SimLocation, SimSegment};

#[derive(Debug, Default, Clone)]
pub struct SimRoadNetwork {
    /// Undirected graph; node weights are location ids, edge weights segment ids
    graph: UnGraph<LocationId, SegmentId>,

    /// Graph node of each location, indexed by location id
    nodes: Vec<NodeIndex>,

    locations: Vec<SimLocation>,

    segments: Vec<SimSegment>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a location to the network graph
    pub fn add_location(&mut self, position: Position, kind: LocationKind) -> LocationId {
        let id = LocationId(self.locations.len());
        let node = self.graph.add_node(id);
        self.nodes.push(node);
        self.locations.push(SimLocation { id, position, kind });
        id
    }

    /// Adds a segment between two existing locations and indexes it at both ends
    pub fn add_segment(&mut self, a: LocationId, b: LocationId) -> Result<SegmentId> {
        if a == b {
            anyhow::bail!("Segment endpoints must differ, got {:?} twice", a);
        }
        let a_pos = self.location_position(a)?;
        let b_pos = self.location_position(b)?;

        let id = SegmentId(self.segments.len());
        self.graph.add_edge(self.nodes[a.0], self.nodes[b.0], id);
        self.segments.push(SimSegment::new(id, a, b, &a_pos, &b_pos));
        Ok(id)
    }

    pub fn location(&self, id: LocationId) -> Option<&SimLocation> {
        self.locations.get(id.0)
    }

    pub fn location_position(&self, id: LocationId) -> Result<Position> {
        self.location(id)
            .map(|location| location.position)
            .with_context(|| format!("Location {:?} not found", id))
    }

    pub fn segment(&self, id: SegmentId) -> Option<&SimSegment> {
        self.segments.get(id.0)
    }

    fn segment_mut(&mut self, id: SegmentId) -> Result<&mut SimSegment> {
        self.segments
            .get_mut(id.0)
            .with_context(|| format!("Segment {:?} not found", id))
    }

    pub fn locations(&self) -> &[SimLocation] {
        &self.locations
    }

    pub fn segments(&self) -> &[SimSegment] {
        &self.segments
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn locations_of_kind(&self, kind: LocationKind) -> Vec<LocationId> {
        self.locations
            .iter()
            .filter(|location| location.kind == kind)
            .map(|location| location.id)
            .collect()
    }

    /// The first depot in the network, if there is one
    pub fn depot(&self) -> Option<LocationId> {
        self.locations
            .iter()
            .find(|location| location.kind == LocationKind::Depot)
            .map(|location| location.id)
    }

    /// All segments touching a location
    pub fn segments_at(&self, location: LocationId) -> Vec<SegmentId> {
        match self.nodes.get(location.0) {
            Some(node) => self.graph.edges(*node).map(|edge| *edge.weight()).collect(),
            None => Vec::new(),
        }
    }

    /// The endpoint of `segment` that is not `known`
    pub fn other_endpoint(&self, segment: SegmentId, known: LocationId) -> Result<LocationId> {
        let segment = self
            .segment(segment)
            .with_context(|| format!("Segment {:?} not found", segment))?;
        if segment.a == known {
            Ok(segment.b)
        } else if segment.b == known {
            Ok(segment.a)
        } else {
            anyhow::bail!("Location {:?} is not an endpoint of {:?}", known, segment.id)
        }
    }

    /// Finds the first segment connecting two locations
    pub fn segment_between(&self, a: LocationId, b: LocationId) -> Option<SegmentId> {
        let a_node = self.nodes.get(a.0)?;
        let b_node = self.nodes.get(b.0)?;
        self.graph
            .edges(*a_node)
            .find(|edge| edge.target() == *b_node)
            .map(|edge| *edge.weight())
    }

    /// Adds snow to a segment
    pub fn accumulate(&mut self, segment: SegmentId, amount: f32) -> Result<()> {
        let segment = self.segment_mut(segment)?;
        segment.accumulation = (segment.accumulation + amount).max(0.0);
        Ok(())
    }

    /// Removes snow from a segment, never going below zero
    pub fn clear(&mut self, segment: SegmentId, amount: f32) -> Result<()> {
        let segment = self.segment_mut(segment)?;
        segment.accumulation = (segment.accumulation - amount).max(0.0);
        Ok(())
    }

    pub fn set_obstructed(&mut self, segment: SegmentId, obstructed: bool) -> Result<()> {
        self.segment_mut(segment)?.obstructed = obstructed;
        Ok(())
    }

    /// The location a route enters segment `index` from.
    ///
    /// The walk starts at `hint` when it is an endpoint of the first segment;
    /// otherwise the start is inferred from the endpoint the first segment
    /// shares with the second one.
    pub fn segment_start(
        &self,
        route: &Route,
        index: usize,
        hint: Option<LocationId>,
    ) -> Result<LocationId> {
        let first_id = route.get(0).context("Route is empty")?;
        let first = self
            .segment(first_id)
            .with_context(|| format!("Segment {:?} not found", first_id))?;

        let mut location = match hint {
            Some(hint) if first.touches(hint) => hint,
            _ => match route.get(1).and_then(|second| self.segment(second)) {
                Some(second) if second.touches(first.a) && !second.touches(first.b) => first.b,
                _ => first.a,
            },
        };

        for segment in route.segments().iter().take(index) {
            location = self.other_endpoint(*segment, location)?;
        }
        Ok(location)
    }

    /// World position and heading of something `progress` of the way along
    /// segment `index` of `route`, shifted `lateral_offset` to the right of
    /// the direction of travel.
    ///
    /// An exhausted index resolves to the end of the last segment.
    pub fn position_along(
        &self,
        route: &Route,
        index: usize,
        progress: f32,
        hint: Option<LocationId>,
        lateral_offset: f32,
    ) -> Result<(Position, f32)> {
        if route.is_empty() {
            let location = hint.context("Empty route and no start location")?;
            return Ok((self.location_position(location)?, 0.0));
        }

        let (index, progress) = if index >= route.len() {
            (route.len() - 1, 1.0)
        } else {
            (index, progress.clamp(0.0, 1.0))
        };

        let segment = route.get(index).context("Route index out of range")?;
        let start = self.segment_start(route, index, hint)?;
        let end = self.other_endpoint(segment, start)?;
        let start_pos = self.location_position(start)?;
        let end_pos = self.location_position(end)?;

        let mut position = start_pos.lerp(&end_pos, progress);
        let offset = start_pos.perpendicular_offset(&end_pos, lateral_offset);
        position.x += offset.x;
        position.y += offset.y;

        Ok((position, start_pos.angle_to(&end_pos)))
    }

    pub(crate) fn graph(&self) -> &UnGraph<LocationId, SegmentId> {
        &self.graph
    }

    pub(crate) fn node(&self, location: LocationId) -> Option<NodeIndex> {
        self.nodes.get(location.0).copied()
    }

    /// Total snow on the network (for summaries)
    pub fn total_accumulation(&self) -> f32 {
        self.segments.iter().map(|segment| segment.accumulation).sum()
    }
}
