use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Oldest undo actions are forgotten past this many. Unlimited if unset.
    pub max_undo_depth: Option<usize>,
    /// Move waypoints onto the endpoints of the segments the gateway returns, so clicks land on
    /// the routable network.
    pub snap_to_network: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            max_undo_depth: None,
            snap_to_network: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json(input: &str) -> serde_json::Result<EditorConfig> {
        serde_json::from_str(input)
    }
}
