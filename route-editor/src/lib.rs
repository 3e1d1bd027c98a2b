//! The state behind drawing a route on a map: waypoints placed by the user, joined by segments
//! that a routing service computes. Every edit can be undone exactly.

mod config;
mod editor;
mod error;
mod events;
mod gateway;
mod route;
mod undo;

pub use config::EditorConfig;
pub use editor::RouteEditor;
pub use error::{EditError, Result};
pub use events::{RouteEvent, RouteListener};
pub use gateway::{RoutingGateway, StraightLineGateway};
pub use route::{role_at, Route};
pub use undo::{IndexedSegment, RemovedSegments, UndoAction, UndoLog};

pub use route_editor_model::{
    Coordinate, Role, RouteSegment, RouteTotals, SegmentId, Waypoint, WaypointId,
};
