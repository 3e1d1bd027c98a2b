use std::cell::Cell;
use std::future::Future;

use anyhow::Result;
use geo::{line_measures::LengthMeasurable, Haversine, LineString};

use route_editor_model::{Coordinate, RouteSegment, SegmentId};

/// Computes the segment between two points. Every returned segment must carry a fresh id and
/// geometry running from `from` to `to`, possibly snapped to a network.
pub trait RoutingGateway {
    /// `want_geometry` is false for cheap lookups that don't need the full routed line.
    fn compute_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
        want_geometry: bool,
    ) -> impl Future<Output = Result<RouteSegment>>;
}

/// Joins points with a straight line and never fails. No elevation data.
#[derive(Default)]
pub struct StraightLineGateway {
    next_id: Cell<usize>,
}

impl StraightLineGateway {
    pub fn new() -> StraightLineGateway {
        StraightLineGateway::default()
    }
}

impl RoutingGateway for StraightLineGateway {
    async fn compute_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
        _want_geometry: bool,
    ) -> Result<RouteSegment> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let geometry = LineString::new(vec![from, to]);
        Ok(RouteSegment {
            id: SegmentId(format!("seg-{id}")),
            distance: geometry.length(&Haversine),
            geometry,
            elevation_up: 0.0,
            elevation_down: 0.0,
        })
    }
}
