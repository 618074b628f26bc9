use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::cli::{Cli, RunArgs};
use crate::config::Config;
use crate::io::ensure_dir_exists;
use crate::io::layers::{read_alignments, read_demands, read_lots, read_streets, write_output};
use crate::pipeline::{Pipeline, Reference};

/// Config file (or defaults) with the command-line overrides applied.
pub fn resolve_config(args: &RunArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = args.threshold { config.threshold = threshold; }
    if let Some(margin) = args.margin { config.margin = margin; }
    if let Some(radius) = args.radius { config.orphan_radius = radius; }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn run(_cli: &Cli, args: &RunArgs) -> Result<()> {
    // Assert output path is not stdout
    if args.out == Path::new("-") { bail!("stdout is not supported."); }

    let config = resolve_config(args)?;
    info!(
        streets = %args.streets.display(),
        demands = %args.demands.display(),
        out = %args.out.display(),
        threshold = config.threshold,
        "run",
    );

    let streets = read_streets(&args.streets, &config.fields)?;
    let demands = read_demands(&args.demands, &config.fields)?;
    let reference = match (&args.lots, &args.alignments) {
        (Some(lots), _) => Reference::Points(read_lots(lots, &config.fields)?),
        (None, Some(alignments)) => Reference::Alignments(read_alignments(alignments)?),
        (None, None) => Reference::Streets,
    };

    let output = Pipeline::planar(config)?.run(streets, demands, reference)?;

    ensure_dir_exists(&args.out)?;
    write_output(&args.out, &output, args.force)?;

    for (kind, count) in output.diagnostics.counts() {
        warn!(kind, count, "diagnostics");
    }
    println!(
        "Wrote {} boxes, {} footprints ({} demands uncovered) -> {}",
        output.boxes.len(),
        output.footprints.len(),
        output.uncovered().count(),
        args.out.display(),
    );
    Ok(())
}
