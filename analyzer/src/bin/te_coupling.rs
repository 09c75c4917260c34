use tracing::info;
use tracing_subscriber::EnvFilter;

use tlr_analyzer::helper_functions::project_root;
use tlr_analyzer::pipeline::coupling::{run, CouplingPaths};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the TE coupling analysis");

    let paths = CouplingPaths::under(&project_root());
    let report = run(&paths)?;

    for tp in &report.timepoints {
        info!(
            "{}: {} transcripts accepted, footprint at 100 TPM mRNA {:.2}",
            tp.timepoint,
            tp.accepted.len(),
            tp.predicted_footprint
        );
    }
    info!("Outputs in {}", paths.output_dir.display());
    Ok(())
}
