//! Tabular learning against the scripted tic-tac-toe opponent

use qlab_agent::{TabularAgent, TabularConfig, Trainer, TrainerConfig};
use qlab_core::TrackedEnvironment;
use qlab_env::{Board, Opponent, Piece, TicTacToeConfig, TicTacToeEnv};

#[test]
fn plays_only_legal_moves_and_fills_table() {
    let env = TicTacToeEnv::new(TicTacToeConfig {
        opponent: Opponent::Opportunist,
        seed: Some(17),
        ..TicTacToeConfig::default()
    });
    let mut env = TrackedEnvironment::new(env);
    let config = TabularConfig {
        seed: Some(17),
        ..TabularConfig::default()
    };
    let mut agent: TabularAgent<Board> = TabularAgent::new(config, 9).unwrap();
    let mut trainer = Trainer::new(TrainerConfig {
        episodes: 300,
        log_every: 100,
        ..TrainerConfig::default()
    })
    .unwrap();

    // An illegal move would surface as an error from the environment.
    let report = trainer.run(&mut env, &mut agent).unwrap();
    assert_eq!(report.episodes.len(), 300);
    for episode in &report.episodes {
        // The agent moves at most five times in a game it opens.
        assert!((3..=5).contains(&episode.steps), "steps = {}", episode.steps);
        assert!(episode.total_reward <= 1.0);
        assert!(episode.total_reward >= -1.0 - 0.3 * 4.0);
    }
    assert!(agent.table().len() > 50);
    assert!(agent.table().contains(&Board::new()));
}

#[test]
fn strategic_opponent_games_run_to_completion() {
    let env = TicTacToeEnv::new(TicTacToeConfig {
        opponent: Opponent::Strategic,
        seed: Some(23),
        ..TicTacToeConfig::default()
    });
    let mut env = TrackedEnvironment::new(env);
    let config = TabularConfig {
        seed: Some(23),
        ..TabularConfig::default()
    };
    let mut agent: TabularAgent<Board> = TabularAgent::new(config, 9).unwrap();
    let mut trainer = Trainer::new(TrainerConfig {
        episodes: 200,
        log_every: 100,
        ..TrainerConfig::default()
    })
    .unwrap();

    let report = trainer.run(&mut env, &mut agent).unwrap();
    assert_eq!(report.episodes.len(), 200);
    for episode in &report.episodes {
        assert!((3..=5).contains(&episode.steps), "steps = {}", episode.steps);
    }
    // After a non-center opening the opponent always answers in the center.
    let mut replies = 0;
    for (board, _) in agent.table().iter() {
        if board.free_cells().len() == 7 && board.get(1, 1) != Piece::Circle {
            assert_eq!(board.get(1, 1), Piece::Cross, "{board}");
            replies += 1;
        }
    }
    assert!(replies > 0);
}
