use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Capacity boxes and footprints along a street network
#[derive(Parser, Debug)]
#[command(name = "streetbox", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build boxes and footprints and write the output layers
    Run(RunArgs),

    /// Print feature count, geometry mix and attributes of a GeoJSON layer
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Street centerlines (GeoJSON LineString / MultiLineString)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub streets: PathBuf,

    /// Demand points (GeoJSON Point)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub demands: PathBuf,

    /// Lots tagged with their street (points or polygons)
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "alignments")]
    pub lots: Option<PathBuf>,

    /// Building alignments; edge midpoints are used when no lots are given
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub alignments: Option<PathBuf>,

    /// Output location (directory)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// JSON configuration file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Box capacity (overrides the config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Buffer margin added to the street offset (overrides the config)
    #[arg(long)]
    pub margin: Option<f64>,

    /// Orphan absorption radius (overrides the config)
    #[arg(long)]
    pub radius: Option<f64>,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// GeoJSON layer to describe
    #[arg(value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}
