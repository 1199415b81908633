//! DQN with replay memory and a target network on CartPole

use anyhow::Result;
use qlab_demos::{config_path_from_args, init_tracing, load_config, run_dqn_cartpole, CartPoleDemoConfig};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let path = config_path_from_args();
    let config: CartPoleDemoConfig = load_config(path.as_deref())?;
    let (report, agent) = run_dqn_cartpole(&config)?;

    info!(
        episodes = report.episodes.len(),
        best = report.episodes.iter().map(|e| e.steps).max(),
        mean_last_10 = report.mean_reward(10),
        loss_points = agent.loss_history().len(),
        "done"
    );
    Ok(())
}
