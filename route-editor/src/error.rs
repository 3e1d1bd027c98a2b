use route_editor_model::WaypointId;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("routing failed: {0}")]
    Gateway(#[source] anyhow::Error),

    #[error("route is inconsistent: {0}")]
    ConsistencyViolation(String),

    #[error("undo failed: {0}")]
    UndoReplay(String),

    #[error("no waypoint {0}")]
    UnknownWaypoint(WaypointId),

    #[error("bad config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EditError>;

macro_rules! inconsistent {
    ($($arg:tt)*) => {
        $crate::error::EditError::ConsistencyViolation(format!($($arg)*))
    };
}
pub(crate) use inconsistent;
