use std::collections::VecDeque;

use route_editor_model::{Coordinate, RouteSegment, SegmentId, Waypoint, WaypointId};

use crate::error::{EditError, Result};
use crate::route::Route;

/// A segment as it was, and where it sat in the segment sequence.
#[derive(Clone, PartialEq, Debug)]
pub struct IndexedSegment {
    pub index: usize,
    pub segment: RouteSegment,
}

/// The inverse of one edit. Each variant holds enough to put the route back exactly as it was,
/// without asking the gateway for anything.
#[derive(Clone, PartialEq, Debug)]
pub enum UndoAction {
    Add {
        waypoint: WaypointId,
        /// Adding the second waypoint can snap the first one elsewhere; this is where it was.
        neighbor_old_position: Option<(WaypointId, Coordinate)>,
    },
    Delete {
        waypoint: Waypoint,
        index: usize,
        removed: RemovedSegments,
    },
    Move {
        waypoint: WaypointId,
        old_position: Coordinate,
        /// Copies of every segment the move rerouted, from before the move
        old_segments: Vec<RouteSegment>,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub enum RemovedSegments {
    /// The waypoint was alone
    Alone,
    Endpoint {
        segment: IndexedSegment,
        neighbor: WaypointId,
    },
    /// The two segments around an interior waypoint were merged into one rerouted segment
    Interior {
        // In ascending index order
        segments: [IndexedSegment; 2],
        neighbors: [WaypointId; 2],
        merged: SegmentId,
    },
}

/// Most recent action last.
#[derive(Default, Debug)]
pub struct UndoLog {
    actions: VecDeque<UndoAction>,
    max_depth: Option<usize>,
}

impl UndoLog {
    pub fn new(max_depth: Option<usize>) -> UndoLog {
        UndoLog {
            actions: VecDeque::new(),
            max_depth,
        }
    }

    pub fn push(&mut self, action: UndoAction) {
        if let Some(max) = self.max_depth {
            if max == 0 {
                return;
            }
            while self.actions.len() >= max {
                self.actions.pop_front();
            }
        }
        self.actions.push_back(action);
    }

    pub fn pop(&mut self) -> Option<UndoAction> {
        self.actions.pop_back()
    }

    pub fn peek(&self) -> Option<&UndoAction> {
        self.actions.back()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn set_max_depth(&mut self, max_depth: Option<usize>) {
        self.max_depth = max_depth;
        if let Some(max) = max_depth {
            while self.actions.len() > max {
                self.actions.pop_front();
            }
        }
    }
}

fn replay_failed(msg: impl Into<String>) -> EditError {
    EditError::UndoReplay(msg.into())
}

impl Route {
    /// Applies the inverse of an edit. The caller is responsible for rolling back if this fails
    /// partway.
    pub(crate) fn replay(&mut self, action: &UndoAction) -> Result<()> {
        match action {
            UndoAction::Add {
                waypoint,
                neighbor_old_position,
            } => {
                // Undo is LIFO, so anything added since has already been undone, and the waypoint
                // is still an endpoint
                self.detach_endpoint(*waypoint)?;
                if let Some((neighbor, pt)) = neighbor_old_position {
                    self.set_position(*neighbor, *pt)?;
                }
            }
            UndoAction::Delete {
                waypoint,
                index,
                removed,
            } => {
                self.restore_deleted(waypoint, *index, removed)?;
            }
            UndoAction::Move {
                waypoint,
                old_position,
                old_segments,
            } => {
                for segment in old_segments {
                    self.overwrite_segment(&segment.id, segment)?;
                }
                self.set_position(*waypoint, *old_position)?;
            }
        }
        self.derive_roles();
        Ok(())
    }

    fn restore_deleted(
        &mut self,
        waypoint: &Waypoint,
        index: usize,
        removed: &RemovedSegments,
    ) -> Result<()> {
        let mut waypoint = waypoint.clone();
        waypoint.associated_segments.clear();
        let id = waypoint.id;

        match removed {
            RemovedSegments::Alone => {
                if !self.is_empty() {
                    return Err(replay_failed(format!(
                        "{id} was the only waypoint, but {} exist now",
                        self.len()
                    )));
                }
                self.insert_waypoint_at(index, waypoint)?;
            }
            RemovedSegments::Endpoint { segment, neighbor } => {
                if self.waypoint(*neighbor).is_none() {
                    return Err(replay_failed(format!("neighbor {neighbor} of {id} is gone")));
                }
                self.insert_waypoint_at(index, waypoint)?;
                self.insert_segment_at(segment.index, segment.segment.clone())?;
                self.link(id, &segment.segment.id)?;
                self.link(*neighbor, &segment.segment.id)?;
            }
            RemovedSegments::Interior {
                segments: [before, after],
                neighbors: [left, right],
                merged,
            } => {
                if after.index != before.index + 1 {
                    return Err(replay_failed(format!(
                        "segments around {id} were recorded out of order, at {} and {}",
                        before.index, after.index
                    )));
                }
                if self.segment(merged).is_none() {
                    return Err(replay_failed(format!(
                        "merged segment {merged} around {id} is gone"
                    )));
                }
                self.remove_segment(merged)?;
                self.unlink(*left, merged)?;
                self.unlink(*right, merged)?;

                self.insert_waypoint_at(index, waypoint)?;
                self.insert_segment_at(before.index, before.segment.clone())?;
                self.insert_segment_at(after.index, after.segment.clone())?;
                self.link(*left, &before.segment.id)?;
                self.link(id, &before.segment.id)?;
                self.link(id, &after.segment.id)?;
                self.link(*right, &after.segment.id)?;
            }
        }
        Ok(())
    }
}
