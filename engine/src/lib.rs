//! Async adapter around a UCI chess engine.
//!
//! [`EngineSession`] owns one engine process and layers bounded, single-shot
//! queries (best move, hint, evaluation) on top of the engine's unbounded
//! line-oriented output stream. Classification of that stream lives in
//! [`uci`], the process plumbing in [`stockfish`], difficulty presets in
//! [`difficulty`].
//!
//! The crate deliberately contains no chess logic: move tokens are validated
//! structurally (squares on the board, promotion piece in range) and handed to
//! callers as [`cozy_chess::Move`] values; legality is the rules library's
//! business.

pub mod difficulty;
pub mod session;
pub mod stockfish;
pub mod uci;

pub use difficulty::Difficulty;
pub use session::{EngineError, EngineSession, Hint};
pub use stockfish::StockfishEngine;
pub use uci::{UciError, UciMessage};

use cozy_chess::Move;

/// Commands sent to the engine process.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    SetPosition { fen: String, moves: Vec<Move> },
    SetOption { name: String, value: Option<String> },
    Go(GoParams),
    IsReady,
    Stop,
    Quit,
}

/// Parameters for the "go" command.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,     // Search depth
}

/// Events produced from the engine's output stream.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// `uciok` or `readyok` — the engine acknowledged a handshake step.
    Ready,
    /// Terminal result of a search. `None` when the engine reported
    /// `bestmove (none)` (no legal move in the position).
    BestMove(Option<Move>),
    Info(EngineInfo),
}

/// Engine analysis information from an `info` line.
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u8>,
    pub currmove: Option<Move>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}

/// Raw score as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32), // Negative for being mated
}

/// A score in user-facing units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Decimal pawns, positive favours White (UCI convention).
    Pawns(f64),
    /// Forced mate in N moves; the sign marks the winning side.
    MateIn(i32),
}

impl From<Score> for Evaluation {
    fn from(score: Score) -> Self {
        match score {
            Score::Centipawns(cp) => Evaluation::Pawns(f64::from(cp) / 100.0),
            Score::Mate(n) => Evaluation::MateIn(n),
        }
    }
}
