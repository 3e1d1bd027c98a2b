use log::{debug, error, warn};

use route_editor_model::{Coordinate, Role, RouteSegment, Waypoint, WaypointId};

use crate::config::EditorConfig;
use crate::error::{inconsistent, EditError, Result};
use crate::events::{RouteEvent, RouteListener};
use crate::gateway::RoutingGateway;
use crate::route::Route;
use crate::undo::{IndexedSegment, RemovedSegments, UndoAction, UndoLog};

/// Owns a route and keeps it consistent through every edit. Each edit takes `&mut self` across
/// the wait for the gateway, so edits to one route can never interleave.
pub struct RouteEditor<G> {
    route: Route,
    undo_log: UndoLog,
    gateway: G,
    config: EditorConfig,
    listeners: Vec<Box<dyn RouteListener>>,
    last_waypoint_id: Option<WaypointId>,
}

impl<G: RoutingGateway> RouteEditor<G> {
    pub fn new(gateway: G) -> RouteEditor<G> {
        RouteEditor::with_config(gateway, EditorConfig::default())
    }

    pub fn with_config(gateway: G, config: EditorConfig) -> RouteEditor<G> {
        RouteEditor {
            route: Route::new(),
            undo_log: UndoLog::new(config.max_undo_depth),
            gateway,
            config,
            listeners: Vec::new(),
            last_waypoint_id: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo_log
    }

    #[cfg(test)]
    pub(crate) fn undo_log_mut(&mut self) -> &mut UndoLog {
        &mut self.undo_log
    }

    #[cfg(test)]
    pub(crate) fn route_mut(&mut self) -> &mut Route {
        &mut self.route
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Replaces the config from JSON. Missing fields take their defaults.
    pub fn set_config(&mut self, input: &str) -> Result<()> {
        let config = EditorConfig::from_json(input)?;
        self.undo_log.set_max_depth(config.max_undo_depth);
        self.config = config;
        Ok(())
    }

    pub fn add_listener(&mut self, listener: impl RouteListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Adds a waypoint to the start or end of the route. Returns its id.
    pub async fn insert_waypoint(
        &mut self,
        pt: Coordinate,
        at_end: bool,
        skip_routing: bool,
    ) -> Result<WaypointId> {
        let id = WaypointId::time_based(self.last_waypoint_id);

        let adjacent_idx = if at_end {
            self.route.len().checked_sub(1)
        } else {
            Some(0)
        };
        let Some(adjacent) = adjacent_idx
            .and_then(|idx| self.route.waypoint_at(idx))
            .cloned()
        else {
            self.commit(|route| {
                route.insert_waypoint_at(0, Waypoint::new(id, pt, Role::Start))?;
                route.derive_roles();
                Ok(())
            })?;
            self.last_waypoint_id = Some(id);
            self.undo_log.push(UndoAction::Add {
                waypoint: id,
                neighbor_old_position: None,
            });
            debug!("Started a route at {id}");
            return Ok(id);
        };

        let (from, to) = if at_end {
            (adjacent.position, pt)
        } else {
            (pt, adjacent.position)
        };
        let segment = self.route_between(from, to, !skip_routing).await?;
        self.route
            .validate_new_segment(&segment)
            .map_err(|err| self.report(err))?;

        let (mut new_pt, mut adjacent_pt) = (pt, adjacent.position);
        if self.config.snap_to_network {
            if let (Some(first), Some(last)) = (segment.first_pt(), segment.last_pt()) {
                (new_pt, adjacent_pt) = if at_end { (last, first) } else { (first, last) };
            }
        }
        // Only the second waypoint gets to snap the first
        let neighbor_old_position = (self.route.len() == 1 && adjacent_pt != adjacent.position)
            .then_some((adjacent.id, adjacent.position));

        let segment_id = segment.id.clone();
        self.commit(|route| {
            if neighbor_old_position.is_some() {
                route.set_position(adjacent.id, adjacent_pt)?;
            }
            let (waypoint_idx, segment_idx) = if at_end {
                (route.len(), route.num_segments())
            } else {
                (0, 0)
            };
            route.insert_segment_at(segment_idx, segment)?;
            route.insert_waypoint_at(waypoint_idx, Waypoint::new(id, new_pt, Role::Middle))?;
            route.link(adjacent.id, &segment_id)?;
            route.link(id, &segment_id)?;
            route.derive_roles();
            Ok(())
        })?;

        self.last_waypoint_id = Some(id);
        self.undo_log.push(UndoAction::Add {
            waypoint: id,
            neighbor_old_position,
        });
        debug!(
            "Added {id} at the {} with segment {segment_id}",
            if at_end { "end" } else { "start" }
        );
        Ok(id)
    }

    /// Removes any waypoint. Removing an interior waypoint reroutes between its neighbors.
    pub async fn remove_waypoint(&mut self, id: WaypointId) -> Result<()> {
        let index = self
            .route
            .waypoint_index(id)
            .ok_or(EditError::UnknownWaypoint(id))?;
        let waypoint = self
            .route
            .waypoint_at(index)
            .cloned()
            .ok_or(EditError::UnknownWaypoint(id))?;
        let len = self.route.len();

        let action = match waypoint.associated_segments.len() {
            0 | 1 => {
                let detached = self.commit(|route| {
                    let detached = route.detach_endpoint(id)?;
                    route.derive_roles();
                    Ok(detached)
                })?;
                let removed = match detached.segment {
                    None => RemovedSegments::Alone,
                    Some((index, segment, neighbor)) => RemovedSegments::Endpoint {
                        segment: IndexedSegment { index, segment },
                        neighbor,
                    },
                };
                UndoAction::Delete {
                    waypoint: detached.waypoint,
                    index: detached.index,
                    removed,
                }
            }
            2 => {
                if index == 0 || index + 1 == len {
                    return Err(self.report(inconsistent!(
                        "{id} at {index} of {len} is an endpoint with two segments"
                    )));
                }
                let (Some(left), Some(right)) = (
                    self.route.waypoint_at(index - 1).cloned(),
                    self.route.waypoint_at(index + 1).cloned(),
                ) else {
                    return Err(self.report(inconsistent!("{id} is missing a neighbor")));
                };
                let (Some(before), Some(after)) = (
                    self.route.segment_at(index - 1).cloned(),
                    self.route.segment_at(index).cloned(),
                ) else {
                    return Err(self.report(inconsistent!("{id} is missing a segment")));
                };
                if waypoint.associated_segments != [before.id.clone(), after.id.clone()] {
                    return Err(self.report(inconsistent!(
                        "{id} is associated with {:?}, but sits between {} and {}",
                        waypoint.associated_segments,
                        before.id,
                        after.id
                    )));
                }

                let merged = self
                    .route_between(left.position, right.position, true)
                    .await?;
                self.route
                    .validate_new_segment(&merged)
                    .map_err(|err| self.report(err))?;
                let merged_id = merged.id.clone();

                self.commit(|route| {
                    route.remove_waypoint_at(index)?;
                    route.remove_segment(&after.id)?;
                    route.remove_segment(&before.id)?;
                    route.insert_segment_at(index - 1, merged)?;
                    route.unlink(left.id, &before.id)?;
                    route.unlink(right.id, &after.id)?;
                    route.link(left.id, &merged_id)?;
                    route.link(right.id, &merged_id)?;
                    route.derive_roles();
                    Ok(())
                })?;

                UndoAction::Delete {
                    waypoint,
                    index,
                    removed: RemovedSegments::Interior {
                        segments: [
                            IndexedSegment {
                                index: index - 1,
                                segment: before,
                            },
                            IndexedSegment {
                                index,
                                segment: after,
                            },
                        ],
                        neighbors: [left.id, right.id],
                        merged: merged_id,
                    },
                }
            }
            n => {
                return Err(self.report(inconsistent!("{id} is associated with {n} segments")));
            }
        };

        self.undo_log.push(action);
        debug!("Removed {id} from {index}");
        Ok(())
    }

    /// Drops a waypoint somewhere new, rerouting the one or two segments touching it. The
    /// waypoint ends up snapped to wherever the first rerouted segment says it should be.
    pub async fn move_waypoint(&mut self, id: WaypointId, pt: Coordinate) -> Result<()> {
        let index = self
            .route
            .waypoint_index(id)
            .ok_or(EditError::UnknownWaypoint(id))?;
        let len = self.route.len();
        let waypoint = self
            .route
            .waypoint(id)
            .cloned()
            .ok_or(EditError::UnknownWaypoint(id))?;

        if waypoint.associated_segments.is_empty() && len > 1 {
            return Err(self.report(inconsistent!(
                "{id} has no segments, but {} other waypoints exist",
                len - 1
            )));
        }

        // Every reroute finishes before anything changes
        let mut position = pt;
        let mut rerouted: Vec<RouteSegment> = Vec::new();
        for (i, segment_id) in waypoint.associated_segments.iter().enumerate() {
            let Some(segment_idx) = self.route.segment_index(segment_id) else {
                return Err(self.report(inconsistent!("{id} has missing segment {segment_id}")));
            };
            // Segment k joins waypoints k and k+1
            let other_idx = if segment_idx == index {
                index + 1
            } else if segment_idx + 1 == index {
                index - 1
            } else {
                return Err(self.report(inconsistent!(
                    "{id} at {index} is associated with {segment_id} at {segment_idx}"
                )));
            };
            let Some(other) = self.route.waypoint_at(other_idx).map(|wp| wp.position) else {
                return Err(self.report(inconsistent!("{segment_id} has no other end")));
            };

            let forwards = index < other_idx;
            let (from, to) = if forwards {
                (position, other)
            } else {
                (other, position)
            };
            let mut fresh = self.route_between(from, to, true).await?;
            if fresh.geometry.0.is_empty() {
                return Err(self.report(inconsistent!("reroute of {segment_id} has no geometry")));
            }
            if i == 0 && self.config.snap_to_network {
                let snapped = if forwards {
                    fresh.first_pt()
                } else {
                    fresh.last_pt()
                };
                position = snapped.unwrap_or(position);
            }
            fresh.id = segment_id.clone();
            rerouted.push(fresh);
        }

        let old_segments = self.commit(|route| {
            let mut old_segments = Vec::new();
            for fresh in &rerouted {
                let old = route
                    .segment(&fresh.id)
                    .cloned()
                    .ok_or_else(|| inconsistent!("no segment {}", fresh.id))?;
                route.overwrite_segment(&fresh.id, fresh)?;
                old_segments.push(old);
            }
            route.set_position(id, position)?;
            Ok(old_segments)
        })?;

        self.undo_log.push(UndoAction::Move {
            waypoint: id,
            old_position: waypoint.position,
            old_segments,
        });
        debug!("Moved {id}, rerouting {} segments", rerouted.len());
        Ok(())
    }

    /// Reverses the most recent edit. False if there's nothing to undo. A failed undo is
    /// reported and its action is dropped; the route stays as it was.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(action) = self.undo_log.pop() else {
            return Ok(false);
        };
        match self.try_commit(|route| route.replay(&action)) {
            Ok(()) => {
                debug!("Undid {}", describe(&action));
                Ok(true)
            }
            Err(err) => {
                error!("Couldn't undo {action:?}: {err}");
                Err(match err {
                    EditError::UndoReplay(_) => err,
                    other => EditError::UndoReplay(other.to_string()),
                })
            }
        }
    }

    /// Forgets the route and all undo history.
    pub fn clear(&mut self) {
        let ids: Vec<WaypointId> = self.route.waypoints().map(|wp| wp.id).collect();
        self.route = Route::new();
        self.undo_log.clear();
        let mut events: Vec<RouteEvent> = ids.into_iter().map(RouteEvent::MarkerRemoved).collect();
        events.push(RouteEvent::SegmentsChanged);
        events.push(RouteEvent::TotalsChanged(self.route.totals()));
        self.dispatch(&events);
    }

    async fn route_between(
        &self,
        from: Coordinate,
        to: Coordinate,
        want_geometry: bool,
    ) -> Result<RouteSegment> {
        self.gateway
            .compute_segment(from, to, want_geometry)
            .await
            .map_err(|err| {
                warn!("Routing from {from:?} to {to:?} failed: {err:#}");
                EditError::Gateway(err)
            })
    }

    fn commit<T>(&mut self, mutate: impl FnOnce(&mut Route) -> Result<T>) -> Result<T> {
        self.try_commit(mutate).map_err(|err| self.report(err))
    }

    /// Applies a mutation to the route and checks the result. If anything goes wrong, the route
    /// reverts to exactly how it was, and the error is left for the caller to log. Listeners
    /// only hear about mutations that stick.
    fn try_commit<T>(&mut self, mutate: impl FnOnce(&mut Route) -> Result<T>) -> Result<T> {
        let before = self.route.clone();
        let result = mutate(&mut self.route);
        let result = result.and_then(|x| self.route.check_invariants().map(|()| x));
        match result {
            Ok(x) => {
                let mut events = self.route.take_events();
                events.push(RouteEvent::SegmentsChanged);
                events.push(RouteEvent::TotalsChanged(self.route.totals()));
                self.dispatch(&events);
                Ok(x)
            }
            Err(err) => {
                self.route = before;
                Err(err)
            }
        }
    }

    fn report(&self, err: EditError) -> EditError {
        if let EditError::ConsistencyViolation(_) = err {
            error!("{err}");
        }
        err
    }

    fn dispatch(&mut self, events: &[RouteEvent]) {
        for listener in &mut self.listeners {
            for event in events {
                listener.on_event(event);
            }
        }
    }
}

fn describe(action: &UndoAction) -> String {
    match action {
        UndoAction::Add { waypoint, .. } => format!("adding {waypoint}"),
        UndoAction::Delete { waypoint, .. } => format!("deleting {}", waypoint.id),
        UndoAction::Move { waypoint, .. } => format!("moving {waypoint}"),
    }
}
