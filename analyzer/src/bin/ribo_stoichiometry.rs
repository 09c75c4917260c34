use tracing::info;
use tracing_subscriber::EnvFilter;

use tlr_analyzer::helper_functions::project_root;
use tlr_analyzer::pipeline::stoichiometry::{run, StoichiometryPaths};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the ribosomal stoichiometry analysis");

    let paths = StoichiometryPaths::under(&project_root());
    let report = run(&paths)?;

    info!(
        "{} conditions analysed, {} proteins with recurrent outliers",
        report.conditions.len(),
        report.colours.len()
    );
    info!("Outputs in {}", paths.output_dir.display());
    Ok(())
}
