use std::fs::File;
use std::io::BufWriter;

use anyhow::Result;
use clap::Parser;
use route_replay::replay_script;

#[derive(Parser)]
struct Args {
    /// Path to a JSON list of edits to replay
    #[arg(long)]
    input: String,

    /// Path to a JSON editor config
    #[arg(long)]
    config: Option<String>,

    /// GeoJSON file to write the final route to
    #[arg(long, default_value = "route.geojson")]
    output: String,
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let args = Args::parse();
    let config = args.config.map(std::fs::read_to_string).transpose()?;
    let replayed = replay_script(&std::fs::read_to_string(&args.input)?, config.as_deref())?;

    let output = BufWriter::new(File::create(args.output)?);
    serde_json::to_writer_pretty(output, &geojson::GeoJson::from(replayed.route))?;
    Ok(())
}
