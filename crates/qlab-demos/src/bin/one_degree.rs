//! Tabular Q-learning on a six-cell corridor

use anyhow::Result;
use qlab_demos::{config_path_from_args, init_tracing, load_config, run_one_degree, OneDegreeConfig};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let path = config_path_from_args();
    let config: OneDegreeConfig = load_config(path.as_deref())?;
    let (report, _agent) = run_one_degree(&config)?;

    for episode in &report.episodes {
        info!(episode = episode.index + 1, steps = episode.steps, "corridor episode");
    }
    Ok(())
}
