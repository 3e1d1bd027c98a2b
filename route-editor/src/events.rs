use route_editor_model::{Coordinate, Role, RouteTotals, WaypointId};

/// Something a map surface or summary panel should reflect. Emitted only after an edit has
/// fully committed.
#[derive(Clone, PartialEq, Debug)]
pub enum RouteEvent {
    MarkerAdded {
        id: WaypointId,
        position: Coordinate,
        role: Role,
    },
    MarkerRemoved(WaypointId),
    MarkerMoved {
        id: WaypointId,
        position: Coordinate,
    },
    MarkerRoleChanged {
        id: WaypointId,
        role: Role,
    },
    /// Redraw the whole segment sequence
    SegmentsChanged,
    /// Always the last event of an edit
    TotalsChanged(RouteTotals),
}

pub trait RouteListener {
    fn on_event(&mut self, event: &RouteEvent);
}

impl<F: FnMut(&RouteEvent)> RouteListener for F {
    fn on_event(&mut self, event: &RouteEvent) {
        self(event)
    }
}
