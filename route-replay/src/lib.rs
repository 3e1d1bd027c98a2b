use anyhow::{bail, Result};
use geo::Coord;
use geojson::FeatureCollection;
use log::{info, warn};
use serde::Deserialize;

use route_editor::{EditorConfig, RouteEditor, RoutingGateway, StraightLineGateway, WaypointId};

/// One user action. Waypoints are addressed by their current position in the route.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Insert {
        lon: f64,
        lat: f64,
        #[serde(default = "default_at_end")]
        at_end: bool,
        #[serde(default)]
        skip_routing: bool,
    },
    Remove {
        index: usize,
    },
    Move {
        index: usize,
        lon: f64,
        lat: f64,
    },
    Undo,
}

fn default_at_end() -> bool {
    true
}

pub struct Replayed {
    pub route: FeatureCollection,
    pub applied: usize,
    pub failed: usize,
}

/// Parses a JSON list of commands.
pub fn parse_script(input: &str) -> Result<Vec<Command>> {
    Ok(serde_json::from_str(input)?)
}

/// Replays a script against straight-line routing. Edits that fail are logged and skipped, the
/// same way an editing session carries on after an error.
pub fn replay_script(script: &str, config: Option<&str>) -> Result<Replayed> {
    let commands = parse_script(script)?;
    let config = match config {
        Some(json) => EditorConfig::from_json(json)?,
        None => EditorConfig::default(),
    };
    let mut editor = RouteEditor::with_config(StraightLineGateway::new(), config);
    pollster::block_on(replay(&mut editor, &commands))
}

pub async fn replay<G: RoutingGateway>(
    editor: &mut RouteEditor<G>,
    commands: &[Command],
) -> Result<Replayed> {
    let mut applied = 0;
    let mut failed = 0;
    for (step, cmd) in commands.iter().enumerate() {
        match apply(editor, cmd).await {
            Ok(()) => applied += 1,
            Err(err) => {
                warn!("Step {step} ({cmd:?}) failed: {err:#}");
                failed += 1;
            }
        }
    }

    let totals = editor.route().totals();
    info!(
        "Replayed {} steps ({failed} failed). {} waypoints, {:.1}m long",
        commands.len(),
        editor.route().len(),
        totals.distance
    );
    Ok(Replayed {
        route: editor.route().to_geojson(),
        applied,
        failed,
    })
}

async fn apply<G: RoutingGateway>(editor: &mut RouteEditor<G>, cmd: &Command) -> Result<()> {
    match *cmd {
        Command::Insert {
            lon,
            lat,
            at_end,
            skip_routing,
        } => {
            editor
                .insert_waypoint(Coord { x: lon, y: lat }, at_end, skip_routing)
                .await?;
        }
        Command::Remove { index } => {
            let id = waypoint_at(editor, index)?;
            editor.remove_waypoint(id).await?;
        }
        Command::Move { index, lon, lat } => {
            let id = waypoint_at(editor, index)?;
            editor.move_waypoint(id, Coord { x: lon, y: lat }).await?;
        }
        Command::Undo => {
            if !editor.undo()? {
                bail!("Nothing to undo");
            }
        }
    }
    Ok(())
}

fn waypoint_at<G: RoutingGateway>(editor: &RouteEditor<G>, index: usize) -> Result<WaypointId> {
    match editor.route().waypoint_at(index) {
        Some(wp) => Ok(wp.id),
        None => bail!(
            "No waypoint {index}; the route only has {}",
            editor.route().len()
        ),
    }
}
