use std::sync::Arc;

use geojson::{Feature, FeatureCollection, Geometry};
use indexmap::IndexMap;

use route_editor_model::{
    Coordinate, Role, RouteSegment, RouteTotals, SegmentId, Waypoint, WaypointId,
};

use crate::error::{inconsistent, Result};
use crate::events::RouteEvent;

/// The waypoints in traversal order, and the segments between them. Segment `k` always joins
/// waypoints `k` and `k + 1`. Segments are shared copy-on-write, so cloning a route doesn't copy
/// any geometry.
#[derive(Clone, Default, Debug)]
pub struct Route {
    waypoints: IndexMap<WaypointId, Waypoint>,
    segments: IndexMap<SegmentId, Arc<RouteSegment>>,
    // Queued until the editor commits the current edit
    pending: Vec<RouteEvent>,
}

/// Where a waypoint falls in a route with `len` waypoints
pub fn role_at(idx: usize, len: usize) -> Role {
    if idx == 0 {
        Role::Start
    } else if idx + 1 == len {
        Role::End
    } else {
        Role::Middle
    }
}

/// What detaching an endpoint took out of the route
pub(crate) struct DetachedEndpoint {
    pub waypoint: Waypoint,
    pub index: usize,
    /// The segment, its index, and the waypoint on its other end. None if the waypoint was alone.
    pub segment: Option<(usize, RouteSegment, WaypointId)>,
}

impl Route {
    pub fn new() -> Route {
        Route::default()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.values()
    }

    pub fn segments(&self) -> impl Iterator<Item = &RouteSegment> {
        self.segments.values().map(Arc::as_ref)
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn waypoint(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(&id)
    }

    pub fn waypoint_index(&self, id: WaypointId) -> Option<usize> {
        self.waypoints.get_index_of(&id)
    }

    pub fn waypoint_at(&self, idx: usize) -> Option<&Waypoint> {
        self.waypoints.get_index(idx).map(|(_, wp)| wp)
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&RouteSegment> {
        self.segments.get(id).map(Arc::as_ref)
    }

    pub fn segment_index(&self, id: &SegmentId) -> Option<usize> {
        self.segments.get_index_of(id)
    }

    pub fn segment_at(&self, idx: usize) -> Option<&RouteSegment> {
        self.segments.get_index(idx).map(|(_, seg)| seg.as_ref())
    }

    pub fn totals(&self) -> RouteTotals {
        let mut totals = RouteTotals::default();
        for segment in self.segments.values() {
            totals.add(segment);
        }
        totals
    }

    /// Rejects a segment from the gateway that can't be spliced into this route.
    pub fn validate_new_segment(&self, segment: &RouteSegment) -> Result<()> {
        if segment.geometry.0.is_empty() {
            return Err(inconsistent!("segment {} has no geometry", segment.id));
        }
        if self.segments.contains_key(&segment.id) {
            return Err(inconsistent!("segment id {} was reused", segment.id));
        }
        Ok(())
    }

    pub(crate) fn take_events(&mut self) -> Vec<RouteEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn insert_waypoint_at(&mut self, idx: usize, mut waypoint: Waypoint) -> Result<()> {
        if idx > self.waypoints.len() {
            return Err(inconsistent!(
                "can't insert waypoint at {idx}, only {} exist",
                self.waypoints.len()
            ));
        }
        if self.waypoints.contains_key(&waypoint.id) {
            return Err(inconsistent!("waypoint {} already exists", waypoint.id));
        }
        waypoint.role = role_at(idx, self.waypoints.len() + 1);
        self.pending.push(RouteEvent::MarkerAdded {
            id: waypoint.id,
            position: waypoint.position,
            role: waypoint.role,
        });
        self.waypoints.shift_insert(idx, waypoint.id, waypoint);
        Ok(())
    }

    pub(crate) fn remove_waypoint_at(&mut self, idx: usize) -> Result<Waypoint> {
        let (id, waypoint) = self
            .waypoints
            .shift_remove_index(idx)
            .ok_or_else(|| inconsistent!("no waypoint at {idx}"))?;
        self.pending.push(RouteEvent::MarkerRemoved(id));
        Ok(waypoint)
    }

    pub(crate) fn set_position(&mut self, id: WaypointId, position: Coordinate) -> Result<()> {
        let waypoint = self
            .waypoints
            .get_mut(&id)
            .ok_or_else(|| inconsistent!("no waypoint {id} to move"))?;
        waypoint.position = position;
        self.pending.push(RouteEvent::MarkerMoved { id, position });
        Ok(())
    }

    pub(crate) fn insert_segment_at(&mut self, idx: usize, segment: RouteSegment) -> Result<()> {
        if idx > self.segments.len() {
            return Err(inconsistent!(
                "can't insert segment at {idx}, only {} exist",
                self.segments.len()
            ));
        }
        if self.segments.contains_key(&segment.id) {
            return Err(inconsistent!("segment {} already exists", segment.id));
        }
        self.segments.shift_insert(idx, segment.id.clone(), Arc::new(segment));
        Ok(())
    }

    pub(crate) fn remove_segment(&mut self, id: &SegmentId) -> Result<(usize, RouteSegment)> {
        let (idx, _, segment) = self
            .segments
            .shift_remove_full(id)
            .ok_or_else(|| inconsistent!("no segment {id}"))?;
        Ok((idx, Arc::unwrap_or_clone(segment)))
    }

    /// Keeps the segment's identity, but replaces everything else.
    pub(crate) fn overwrite_segment(&mut self, id: &SegmentId, from: &RouteSegment) -> Result<()> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or_else(|| inconsistent!("no segment {id} to overwrite"))?;
        Arc::make_mut(segment).overwrite_metrics_from(from);
        Ok(())
    }

    /// Associates a segment with a waypoint. The segment must already be in place, so the
    /// associations can be kept in traversal order.
    pub(crate) fn link(&mut self, waypoint: WaypointId, segment: &SegmentId) -> Result<()> {
        let segments = &self.segments;
        if !segments.contains_key(segment) {
            return Err(inconsistent!("can't link missing segment {segment}"));
        }
        let waypoint = self
            .waypoints
            .get_mut(&waypoint)
            .ok_or_else(|| inconsistent!("can't link segment {segment} to missing {waypoint}"))?;
        if !waypoint.is_associated_with(segment) {
            waypoint.associated_segments.push(segment.clone());
            waypoint
                .associated_segments
                .sort_by_key(|s| segments.get_index_of(s));
        }
        Ok(())
    }

    pub(crate) fn unlink(&mut self, waypoint: WaypointId, segment: &SegmentId) -> Result<()> {
        let waypoint = self
            .waypoints
            .get_mut(&waypoint)
            .ok_or_else(|| inconsistent!("can't unlink {segment} from missing {waypoint}"))?;
        waypoint.associated_segments.retain(|s| s != segment);
        Ok(())
    }

    /// Recalculates every waypoint's role from its place in the sequence.
    pub(crate) fn derive_roles(&mut self) {
        let len = self.waypoints.len();
        for (idx, waypoint) in self.waypoints.values_mut().enumerate() {
            let role = role_at(idx, len);
            if waypoint.role != role {
                waypoint.role = role;
                self.pending.push(RouteEvent::MarkerRoleChanged {
                    id: waypoint.id,
                    role,
                });
            }
        }
    }

    /// Removes the first or last waypoint, along with the one segment touching it. Never needs
    /// to reroute anything.
    pub(crate) fn detach_endpoint(&mut self, id: WaypointId) -> Result<DetachedEndpoint> {
        let index = self
            .waypoint_index(id)
            .ok_or_else(|| inconsistent!("no waypoint {id}"))?;
        let len = self.waypoints.len();
        let associated = self.waypoints[index].associated_segments.clone();

        match associated.as_slice() {
            [] => {
                if len > 1 {
                    return Err(inconsistent!(
                        "{id} has no segments, but {} other waypoints exist",
                        len - 1
                    ));
                }
                let waypoint = self.remove_waypoint_at(index)?;
                Ok(DetachedEndpoint {
                    waypoint,
                    index,
                    segment: None,
                })
            }
            [segment_id] => {
                if index != 0 && index + 1 != len {
                    return Err(inconsistent!("{id} at {index} of {len} has only one segment"));
                }
                let waypoint = self.remove_waypoint_at(index)?;
                let (segment_idx, segment) = self.remove_segment(segment_id)?;
                // The surviving neighbor slid into the removed waypoint's slot, or is right
                // before it
                let neighbor = self
                    .waypoint_at(if index == 0 { 0 } else { index - 1 })
                    .map(|wp| wp.id)
                    .ok_or_else(|| inconsistent!("{id} had a segment but no neighbor"))?;
                self.unlink(neighbor, segment_id)?;
                Ok(DetachedEndpoint {
                    waypoint,
                    index,
                    segment: Some((segment_idx, segment, neighbor)),
                })
            }
            _ => Err(inconsistent!("{id} at {index} of {len} isn't an endpoint")),
        }
    }

    pub fn check_invariants(&self) -> Result<()> {
        let expected = self.waypoints.len().saturating_sub(1);
        if self.segments.len() != expected {
            return Err(inconsistent!(
                "{} waypoints, but {} segments",
                self.waypoints.len(),
                self.segments.len()
            ));
        }

        let len = self.waypoints.len();
        for (idx, waypoint) in self.waypoints.values().enumerate() {
            let mut adjacent = Vec::new();
            if idx > 0 {
                adjacent.push(self.segments.get_index(idx - 1).map(|(id, _)| id));
            }
            if idx + 1 < len {
                adjacent.push(self.segments.get_index(idx).map(|(id, _)| id));
            }
            let adjacent: Vec<&SegmentId> = adjacent.into_iter().flatten().collect();
            if waypoint.associated_segments.iter().collect::<Vec<_>>() != adjacent {
                return Err(inconsistent!(
                    "{} at {idx} is associated with {:?}, but sits between {:?}",
                    waypoint.id,
                    waypoint.associated_segments,
                    adjacent
                ));
            }
            if waypoint.role != role_at(idx, len) {
                return Err(inconsistent!(
                    "{} at {idx} of {len} has role {:?}",
                    waypoint.id,
                    waypoint.role
                ));
            }
        }
        Ok(())
    }

    /// Every segment as a LineString, then every waypoint as a Point.
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for segment in self.segments.values() {
            let mut f = Feature::from(Geometry::from(&segment.geometry));
            f.set_property("segment_id", segment.id.0.clone());
            f.set_property("distance", segment.distance);
            f.set_property("elevation_up", segment.elevation_up);
            f.set_property("elevation_down", segment.elevation_down);
            features.push(f);
        }
        for waypoint in self.waypoints.values() {
            let pt = waypoint.position;
            let mut f = Feature::from(Geometry::from(geojson::Value::Point(vec![pt.x, pt.y])));
            f.set_property("waypoint_id", waypoint.id.to_string());
            f.set_property("role", format!("{:?}", waypoint.role));
            features.push(f);
        }
        features.into_iter().collect()
    }
}
