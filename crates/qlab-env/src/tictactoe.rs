//! Tic-tac-toe against a scripted opponent
//!
//! The learning agent plays [`Piece::Circle`], the opponent plays
//! [`Piece::Cross`]. Actions are cell indices `row * 3 + col`. One
//! environment step is the agent's move followed, unless the game is
//! over, by the opponent's reply.

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use qlab_core::{
    DiscreteAction, DiscreteSpace, Environment, Observation, ObservationSpace, RLError, Result,
    Step, StepInfo,
};

/// Board side length
pub const SIZE: usize = 3;
/// Number of cells
pub const CELLS: usize = SIZE * SIZE;

const CENTER: usize = 4;
/// Top-left, bottom-left, bottom-right, top-right
const CORNERS: [usize; 4] = [0, 6, 8, 2];
const EDGES: [usize; 4] = [1, 3, 5, 7];

/// Rows, then columns, then the two diagonals
const LINES: [[usize; SIZE]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Content of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Piece {
    /// Free cell
    Empty,
    /// The agent's piece
    Circle,
    /// The opponent's piece
    Cross,
}

impl Piece {
    /// The other player's piece
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::Circle => Self::Cross,
            Self::Cross => Self::Circle,
            Self::Empty => Self::Empty,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Empty => '-',
            Self::Circle => 'O',
            Self::Cross => 'X',
        }
    }
}

/// A 3x3 board
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    cells: [Piece; CELLS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty board
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: [Piece::Empty; CELLS],
        }
    }

    /// Piece at `row`, `col`
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Piece {
        self.cells[row * SIZE + col]
    }

    /// Board with `piece` placed at `index`, or `None` if the cell is taken
    #[must_use]
    pub fn place(&self, index: usize, piece: Piece) -> Option<Self> {
        if !self.is_free(index) {
            return None;
        }
        let mut next = self.clone();
        next.cells[index] = piece;
        Some(next)
    }

    /// Whether `index` is on the board and free
    #[must_use]
    pub fn is_free(&self, index: usize) -> bool {
        self.cells.get(index) == Some(&Piece::Empty)
    }

    /// Free cell indices in ascending order
    #[must_use]
    pub fn free_cells(&self) -> Vec<usize> {
        (0..CELLS).filter(|&i| self.cells[i] == Piece::Empty).collect()
    }

    /// No free cell left
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != Piece::Empty)
    }

    /// Whether `piece` owns a full line
    #[must_use]
    pub fn has_won(&self, piece: Piece) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.cells[i] == piece))
    }

    /// The winning piece, if any
    #[must_use]
    pub fn winner(&self) -> Option<Piece> {
        [Piece::Circle, Piece::Cross]
            .into_iter()
            .find(|&p| self.has_won(p))
    }

    /// Free cell that completes a line for `piece`, first line first
    #[must_use]
    pub fn winning_move(&self, piece: Piece) -> Option<usize> {
        LINES.iter().find_map(|line| {
            let owned = line.iter().filter(|&&i| self.cells[i] == piece).count();
            let free = line.iter().find(|&&i| self.cells[i] == Piece::Empty);
            match free {
                Some(&i) if owned == SIZE - 1 => Some(i),
                _ => None,
            }
        })
    }

    /// Whether `piece` is one move away from winning
    #[must_use]
    pub fn threatens(&self, piece: Piece) -> bool {
        self.winning_move(piece).is_some()
    }

    /// Game over by win or full board
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.winner().is_some() || self.is_full()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIZE {
            for col in 0..SIZE {
                write!(f, "{}", self.get(row, col).symbol())?;
            }
            if row + 1 < SIZE {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl Observation for Board {
    fn to_vec(&self) -> Vec<f64> {
        self.cells
            .iter()
            .map(|c| match c {
                Piece::Empty => 0.0,
                Piece::Circle => 1.0,
                Piece::Cross => -1.0,
            })
            .collect()
    }

    fn shape(&self) -> Vec<usize> {
        vec![SIZE, SIZE]
    }
}

/// Space of all boards
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardSpace;

impl ObservationSpace for BoardSpace {
    type Observation = Board;

    fn contains(&self, _obs: &Self::Observation) -> bool {
        true
    }

    fn shape(&self) -> Vec<usize> {
        vec![SIZE, SIZE]
    }
}

/// How the scripted opponent plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opponent {
    /// Uniformly random free cell
    Random,
    /// Completes its own line when it can, random otherwise
    #[default]
    Opportunist,
    /// Wins, blocks, then sets up forks from the center and corners
    Strategic,
}

type Strategy = fn(&Board, Piece, &mut dyn RngCore) -> Option<usize>;

/// Tried in order; the first free cell proposed is played
const STRATEGIES: [Strategy; 5] = [
    final_attack,
    final_defense,
    two_side_defense,
    center_corner_attack,
    two_side_attack,
];

/// Move for `piece` from the first strategy that proposes a free cell
fn strategic_move(board: &Board, piece: Piece, rng: &mut dyn RngCore) -> Option<usize> {
    STRATEGIES.iter().find_map(|strategy| {
        strategy(board, piece, &mut *rng).filter(|&cell| board.is_free(cell))
    })
}

fn opposite_corner(corner: usize) -> usize {
    CELLS - 1 - corner
}

fn first_free(board: &Board, cells: &[usize]) -> Option<usize> {
    cells.iter().copied().find(|&i| board.is_free(i))
}

fn final_attack(board: &Board, piece: Piece, _rng: &mut dyn RngCore) -> Option<usize> {
    board.winning_move(piece)
}

fn final_defense(board: &Board, piece: Piece, _rng: &mut dyn RngCore) -> Option<usize> {
    board.winning_move(piece.opponent())
}

/// Hold the center and keep the opponent from owning two crossing lines
fn two_side_defense(board: &Board, piece: Piece, _rng: &mut dyn RngCore) -> Option<usize> {
    if board.is_free(CENTER) {
        return Some(CENTER);
    }
    if board.cells[CENTER] != piece {
        return None;
    }
    let other = piece.opponent();
    let owns = |i: usize| board.cells[i] == other;
    if (owns(0) && owns(8)) || (owns(6) && owns(2)) {
        if let Some(edge) = first_free(board, &EDGES) {
            return Some(edge);
        }
    }

    let in_row = |row: usize| (0..SIZE).any(|col| owns(row * SIZE + col));
    let in_col = |col: usize| (0..SIZE).any(|row| owns(row * SIZE + col));
    match (in_row(0), in_row(2), in_col(0), in_col(2)) {
        (true, _, true, _) => Some(0),
        (_, true, true, _) => Some(6),
        (true, _, _, true) => Some(2),
        (_, true, _, true) => Some(8),
        _ => None,
    }
}

/// From the center, take an edge next to an owned corner, else claim corners
fn center_corner_attack(board: &Board, piece: Piece, rng: &mut dyn RngCore) -> Option<usize> {
    if board.is_free(CENTER) {
        return Some(CENTER);
    }
    if board.cells[CENTER] == piece {
        let edges = CORNERS
            .iter()
            .find(|&&c| board.cells[c] == piece)
            .map(|&c| match c {
                0 => [1, 3],
                6 => [3, 7],
                8 => [5, 7],
                _ => [1, 5],
            });
        if let Some(edge) = edges.and_then(|e| first_free(board, &e)) {
            return Some(edge);
        }
    }

    for pair in [[0, 8], [6, 2]] {
        if pair.iter().all(|&c| board.is_free(c)) {
            return pair.choose(&mut *rng).copied();
        }
    }
    first_free(board, &CORNERS)
}

/// Take the corner opposite an owned one, else any corner
fn two_side_attack(board: &Board, piece: Piece, _rng: &mut dyn RngCore) -> Option<usize> {
    CORNERS
        .iter()
        .find(|&&c| board.cells[c] == piece)
        .map(|&c| opposite_corner(c))
        .filter(|&c| board.is_free(c))
        .or_else(|| first_free(board, &CORNERS))
}

/// Tic-tac-toe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicTacToeConfig {
    /// Reward for the agent completing a line
    pub win_reward: f64,
    /// Reward when the agent's move leaves the opponent one move from winning
    pub threat_penalty: f64,
    /// Reward when the opponent completes a line
    pub loss_reward: f64,
    /// Whether the agent opens the game
    pub agent_first: bool,
    /// Opponent strategy
    pub opponent: Opponent,
    /// Seed for the opponent's choices
    pub seed: Option<u64>,
}

impl Default for TicTacToeConfig {
    fn default() -> Self {
        Self {
            win_reward: 1.0,
            threat_penalty: -0.3,
            loss_reward: -1.0,
            agent_first: true,
            opponent: Opponent::default(),
            seed: None,
        }
    }
}

/// Tic-tac-toe environment
pub struct TicTacToeEnv {
    board: Board,
    config: TicTacToeConfig,
    rng: StdRng,
}

impl TicTacToeEnv {
    /// Create a new game
    #[must_use]
    pub fn new(config: TicTacToeConfig) -> Self {
        Self {
            board: Board::new(),
            rng: crate::make_rng(config.seed),
            config,
        }
    }

    /// Current board
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    fn opponent_move(&mut self) -> Option<usize> {
        let scripted = match self.config.opponent {
            Opponent::Opportunist => self.board.winning_move(Piece::Cross),
            Opponent::Strategic => strategic_move(&self.board, Piece::Cross, &mut self.rng),
            Opponent::Random => None,
        };
        scripted.or_else(|| self.board.free_cells().choose(&mut self.rng).copied())
    }

    fn play_opponent(&mut self) {
        if let Some(next) = self
            .opponent_move()
            .and_then(|cell| self.board.place(cell, Piece::Cross))
        {
            self.board = next;
        }
    }
}

impl Environment for TicTacToeEnv {
    type Observation = Board;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(BoardSpace)
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(CELLS)
    }

    fn legal_actions(&self) -> Vec<DiscreteAction> {
        self.board.free_cells().into_iter().map(DiscreteAction).collect()
    }

    fn reset(&mut self) -> Result<Self::Observation> {
        self.board = Board::new();
        if !self.config.agent_first {
            self.play_opponent();
        }
        Ok(self.board.clone())
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<Self::Observation>> {
        if self.board.is_over() {
            return Err(RLError::Environment(
                "game already over, call reset".to_string(),
            ));
        }
        self.board = self
            .board
            .place(action.0, Piece::Circle)
            .ok_or_else(|| RLError::InvalidAction(format!("cell {} is not free", action.0)))?;

        let (reward, winner) = if self.board.has_won(Piece::Circle) {
            (self.config.win_reward, Some(Piece::Circle))
        } else if self.board.is_full() {
            (0.0, None)
        } else {
            let shaped = if self.board.threatens(Piece::Cross) {
                self.config.threat_penalty
            } else {
                0.0
            };
            self.play_opponent();
            if self.board.has_won(Piece::Cross) {
                (self.config.loss_reward, Some(Piece::Cross))
            } else {
                (shaped, None)
            }
        };

        let done = self.board.is_over();
        if done {
            debug!(?winner, board = %self.board, "game over");
        }

        let mut step = Step::new(self.board.clone(), reward, done);
        if let Some(piece) = winner {
            step.info = StepInfo::default().with("winner", piece.symbol().to_string());
        }
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn board(layout: &str) -> Board {
        let mut b = Board::new();
        for (i, c) in layout.chars().filter(|c| !c.is_whitespace()).enumerate() {
            b.cells[i] = match c {
                'O' => Piece::Circle,
                'X' => Piece::Cross,
                _ => Piece::Empty,
            };
        }
        b
    }

    #[test]
    fn test_detects_every_line() {
        for line in LINES {
            let mut b = Board::new();
            for i in line {
                b.cells[i] = Piece::Cross;
            }
            assert_eq!(b.winner(), Some(Piece::Cross));
            assert!(!b.has_won(Piece::Circle));
        }
    }

    #[test]
    fn test_winning_move() {
        let b = board("OO- X-- X--");
        assert_eq!(b.winning_move(Piece::Circle), Some(2));
        assert_eq!(b.winning_move(Piece::Cross), None);
        assert!(!b.threatens(Piece::Cross));

        let b = board("O-- -X- --X");
        assert!(!b.threatens(Piece::Cross));
        let b = board("--- -X- --X");
        assert_eq!(b.winning_move(Piece::Cross), Some(0));
    }

    #[test]
    fn test_blocked_line_is_no_threat() {
        let b = board("XOX --- ---");
        assert!(!b.threatens(Piece::Cross));
    }

    #[test]
    fn test_place_rejects_taken_cell() {
        let b = board("O-- --- ---");
        assert!(b.place(0, Piece::Cross).is_none());
        assert!(b.place(9, Piece::Cross).is_none());
        assert_eq!(b.place(1, Piece::Cross).unwrap().get(0, 1), Piece::Cross);
    }

    #[test]
    fn test_display() {
        assert_eq!(board("OX- --- --O").to_string(), "OX-\n---\n--O");
    }

    #[test]
    fn test_opponent_replies_and_legal_actions_shrink() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            seed: Some(3),
            ..TicTacToeConfig::default()
        });
        env.reset().unwrap();
        assert_eq!(env.legal_actions().len(), 9);

        let step = env.step(DiscreteAction(4)).unwrap();
        assert!(!step.done);
        assert_eq!(step.observation.free_cells().len(), 7);
        assert_eq!(env.legal_actions().len(), 7);
        assert!(matches!(env.step(DiscreteAction(4)), Err(RLError::InvalidAction(_))));
    }

    #[test]
    fn test_agent_win_pays() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig::default());
        env.board = board("OO- XX- ---");
        let step = env.step(DiscreteAction(2)).unwrap();
        assert!(step.done);
        assert!((step.reward.0 - 1.0).abs() < 1e-12);
        assert!(step.info.fields.contains_key("winner"));
    }

    #[test]
    fn test_opportunist_punishes_open_threat() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            seed: Some(9),
            ..TicTacToeConfig::default()
        });
        env.board = board("XX- O-- ---");
        let step = env.step(DiscreteAction(8)).unwrap();
        assert!(step.done);
        assert_eq!(step.observation.winner(), Some(Piece::Cross));
        assert!((step.reward.0 + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threat_penalty() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            opponent: Opponent::Random,
            seed: Some(5),
            ..TicTacToeConfig::default()
        });
        env.board = board("XX- O-- ---");
        let step = env.step(DiscreteAction(8)).unwrap();
        if step.observation.winner() == Some(Piece::Cross) {
            assert!((step.reward.0 + 1.0).abs() < 1e-12);
        } else {
            assert!(!step.done);
            assert!((step.reward.0 + 0.3).abs() < 1e-12);
        }
    }

    #[test]
    fn test_opponent_can_open() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            agent_first: false,
            seed: Some(1),
            ..TicTacToeConfig::default()
        });
        let obs = env.reset().unwrap();
        assert_eq!(obs.free_cells().len(), 8);
    }

    #[test]
    fn test_partial_json_config() {
        let config: TicTacToeConfig =
            serde_json::from_str(r#"{"opponent": "random", "threat_penalty": -0.5}"#).unwrap();
        assert_eq!(config.opponent, Opponent::Random);
        assert!((config.threat_penalty + 0.5).abs() < f64::EPSILON);
        assert!((config.win_reward - 1.0).abs() < f64::EPSILON);
        assert!(config.agent_first);
    }

    fn strategic(layout: &str) -> Option<usize> {
        let mut rng = StdRng::seed_from_u64(0);
        strategic_move(&board(layout), Piece::Cross, &mut rng)
    }

    #[test]
    fn test_strategic_prefers_own_win_over_block() {
        assert_eq!(strategic("OO- XX- ---"), Some(5));
        assert_eq!(strategic("OO- -X- ---"), Some(2));
    }

    #[test]
    fn test_strategic_takes_center() {
        assert_eq!(strategic("O-- --- ---"), Some(CENTER));
        assert_eq!(strategic("--- --- ---"), Some(CENTER));
    }

    #[test]
    fn test_strategic_answers_opposite_corners_with_edge() {
        assert_eq!(strategic("O-- -X- --O"), Some(1));
        assert_eq!(strategic("--O -X- O--"), Some(1));
    }

    #[test]
    fn test_strategic_builds_from_center_and_corner() {
        // Diagonal is blocked and the containment corner is taken.
        assert_eq!(strategic("X-- -X- --O"), Some(1));
    }

    #[test]
    fn test_two_side_attack_takes_opposite_corner() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(two_side_attack(&board("X-- --- ---"), Piece::Cross, &mut rng), Some(8));
        assert_eq!(two_side_attack(&board("X-- --- --O"), Piece::Cross, &mut rng), Some(6));
        assert_eq!(two_side_attack(&board("XOX OXO XOX"), Piece::Cross, &mut rng), None);
    }

    #[test]
    fn test_strategic_opens_in_center() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            agent_first: false,
            opponent: Opponent::Strategic,
            seed: Some(2),
            ..TicTacToeConfig::default()
        });
        let obs = env.reset().unwrap();
        assert_eq!(obs.get(1, 1), Piece::Cross);
        assert_eq!(obs.free_cells().len(), 8);
    }

    #[test]
    fn test_strategic_only_plays_free_cells() {
        let mut env = TicTacToeEnv::new(TicTacToeConfig {
            opponent: Opponent::Strategic,
            seed: Some(11),
            ..TicTacToeConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            env.reset().unwrap();
            loop {
                let legal = env.legal_actions();
                let action = legal[rng.gen_range(0..legal.len())];
                let step = env.step(action).unwrap();
                let cells = &step.observation.cells;
                let count = |piece: Piece| cells.iter().filter(|&&c| c == piece).count();
                let (circles, crosses) = (count(Piece::Circle), count(Piece::Cross));
                if step.done {
                    assert!(circles == crosses || circles == crosses + 1);
                    break;
                }
                assert_eq!(circles, crosses);
            }
        }
    }

    #[test]
    fn test_strategic_config_name() {
        let config: TicTacToeConfig =
            serde_json::from_str(r#"{"opponent": "strategic"}"#).unwrap();
        assert_eq!(config.opponent, Opponent::Strategic);
    }
}
