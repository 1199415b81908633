//! DQN on CartPole, end to end

use qlab_agent::{DqnAgent, DqnConfig, FunctionApproximator, Trainer, TrainerConfig};
use qlab_core::{Agent, Environment, ObservationSpace, TrackedEnvironment};
use qlab_env::{CartPoleConfig, CartPoleEnv, TimeLimit};

fn cartpole(seed: u64) -> TrackedEnvironment<TimeLimit<CartPoleEnv>> {
    let env = CartPoleEnv::new(CartPoleConfig {
        seed: Some(seed),
        ..CartPoleConfig::default()
    });
    TrackedEnvironment::new(TimeLimit::new(env, 200))
}

fn config(seed: u64) -> DqnConfig {
    DqnConfig {
        learning_rate: 0.01,
        batch_size: 32,
        memory_size: 200,
        seed: Some(seed),
        ..DqnConfig::default()
    }
}

#[test]
fn learns_once_memory_holds_a_batch() {
    let mut env = cartpole(1);
    let n_features = env.observation_space().flat_dim();
    let n_actions = env.action_space().n;
    let mut agent = DqnAgent::new(config(1), n_features, n_actions).unwrap();
    let mut trainer = Trainer::new(TrainerConfig {
        episodes: 20,
        log_every: 10,
        ..TrainerConfig::default()
    })
    .unwrap();

    let report = trainer.run(&mut env, &mut agent).unwrap();
    let total_steps = report.total_steps();
    assert!(total_steps >= 32);

    // One learning step per environment step from the 32nd on.
    assert_eq!(agent.learn_steps(), total_steps - 31);
    assert_eq!(agent.loss_history().len(), agent.learn_steps());
    assert!(agent.loss_history().iter().all(|l| l.is_finite()));
    assert_eq!(agent.memory().len(), total_steps.min(200));
    assert_eq!(agent.metrics().total_steps, total_steps);

    for episode in &report.episodes {
        // CartPole pays one per step.
        assert!((episode.total_reward - episode.steps as f64).abs() < 1e-9);
        assert!(episode.steps <= 200);
    }
    assert!(report.running_reward().unwrap().is_finite());
}

#[test]
fn target_matches_online_after_each_sync() {
    let mut env = cartpole(4);
    let mut agent = DqnAgent::new(
        DqnConfig {
            target_update_freq: Some(7),
            ..config(4)
        },
        4,
        2,
    )
    .unwrap();
    let mut trainer = Trainer::new(TrainerConfig {
        episodes: 1,
        ..TrainerConfig::default()
    })
    .unwrap();

    while agent.learn_steps() < 21 {
        trainer.run_episode(&mut env, &mut agent).unwrap();
    }
    // Syncs happen at multiples of 7 learning steps.
    let steps_since_sync = agent.learn_steps() % 7;
    if steps_since_sync == 0 {
        assert_eq!(agent.target().parameters(), agent.online().parameters());
    } else {
        assert_ne!(agent.target().parameters(), agent.online().parameters());
    }
}

#[test]
fn same_seed_same_run() {
    let run = |seed| {
        let mut env = cartpole(seed);
        let mut agent = DqnAgent::new(config(seed), 4, 2).unwrap();
        let mut trainer = Trainer::new(TrainerConfig {
            episodes: 5,
            ..TrainerConfig::default()
        })
        .unwrap();
        let report = trainer.run(&mut env, &mut agent).unwrap();
        (
            report.episodes.iter().map(|e| e.steps).collect::<Vec<_>>(),
            agent.online().parameters(),
        )
    };
    assert_eq!(run(12), run(12));
}
