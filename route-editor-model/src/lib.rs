use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// (lon, lat)
pub type Coordinate = Coord<f64>;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct WaypointId(pub u64);

impl WaypointId {
    /// Milliseconds since the epoch, bumped past `last` if the clock hasn't moved on since the
    /// previous waypoint was made.
    pub fn time_based(last: Option<WaypointId>) -> WaypointId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        match last {
            Some(WaypointId(prev)) if prev >= now => WaypointId(prev + 1),
            _ => WaypointId(now),
        }
    }
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SegmentId(pub String);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(x: &str) -> Self {
        SegmentId(x.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Start,
    Middle,
    End,
}

/// A routed path between two consecutive waypoints. The geometry runs from the earlier waypoint
/// to the later one.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RouteSegment {
    pub id: SegmentId,
    pub geometry: LineString<f64>,
    pub distance: f64,
    pub elevation_up: f64,
    pub elevation_down: f64,
}

impl RouteSegment {
    pub fn first_pt(&self) -> Option<Coordinate> {
        self.geometry.0.first().copied()
    }

    pub fn last_pt(&self) -> Option<Coordinate> {
        self.geometry.0.last().copied()
    }

    /// Takes the geometry and metrics of `other`, but keeps this segment's identity.
    pub fn overwrite_metrics_from(&mut self, other: &RouteSegment) {
        self.geometry = other.geometry.clone();
        self.distance = other.distance;
        self.elevation_up = other.elevation_up;
        self.elevation_down = other.elevation_down;
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Coordinate,
    // The segment arriving here comes before the one leaving
    pub associated_segments: Vec<SegmentId>,
    pub role: Role,
}

impl Waypoint {
    pub fn new(id: WaypointId, position: Coordinate, role: Role) -> Waypoint {
        Waypoint {
            id,
            position,
            associated_segments: Vec::new(),
            role,
        }
    }

    pub fn is_associated_with(&self, segment: &SegmentId) -> bool {
        self.associated_segments.contains(segment)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct RouteTotals {
    pub distance: f64,
    pub elevation_up: f64,
    pub elevation_down: f64,
}

impl RouteTotals {
    pub fn add(&mut self, segment: &RouteSegment) {
        self.distance += segment.distance;
        self.elevation_up += segment.elevation_up;
        self.elevation_down += segment.elevation_down;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_based_ids_increase() {
        let a = WaypointId::time_based(None);
        let b = WaypointId::time_based(Some(a));
        let c = WaypointId::time_based(Some(b));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_overwrite_keeps_id() {
        let mut seg = RouteSegment {
            id: "S1".into(),
            geometry: LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            distance: 150.0,
            elevation_up: 3.0,
            elevation_down: 1.0,
        };
        let other = RouteSegment {
            id: "S9".into(),
            geometry: LineString::from(vec![(0.0, 0.0), (0.5, 0.5), (2.0, 2.0)]),
            distance: 400.0,
            elevation_up: 10.0,
            elevation_down: 0.0,
        };
        seg.overwrite_metrics_from(&other);
        assert_eq!(seg.id, SegmentId::from("S1"));
        assert_eq!(seg.geometry, other.geometry);
        assert_eq!(seg.distance, 400.0);
        assert_eq!(seg.last_pt(), Some(Coord { x: 2.0, y: 2.0 }));
    }
}
