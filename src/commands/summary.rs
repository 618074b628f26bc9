use anyhow::Result;

use crate::cli::{Cli, SummaryArgs};
use crate::io::geojson::read_features;
use crate::io::summary::LayerSummary;

pub fn run(_cli: &Cli, args: &SummaryArgs) -> Result<()> {
    let features = read_features(&args.file)?;
    print!("{}", LayerSummary::new(&features));
    Ok(())
}
