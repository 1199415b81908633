//! Tabular Q-learning at tic-tac-toe against a scripted opponent

use anyhow::Result;
use qlab_demos::{config_path_from_args, init_tracing, load_config, run_tictactoe, TicTacToeDemoConfig};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let path = config_path_from_args();
    let config: TicTacToeDemoConfig = load_config(path.as_deref())?;
    let (report, _agent) = run_tictactoe(&config)?;

    info!(mean_last_100 = report.mean_reward(100), "done");
    Ok(())
}
