//! Bounded request/response queries over the engine's push stream.
//!
//! UCI is push-based: the engine may emit any number of `info` lines before a
//! terminal `bestmove`, or nothing at all if it was misconfigured.
//! [`EngineSession`] turns that stream into single-shot queries with a
//! deadline and a defined empty result. Every query takes `&mut self`, so at
//! most one request is in flight per session and a second concurrent request
//! is a compile error rather than a silently discarded listener. Output left
//! over from an expired request is drained before the next command goes out,
//! and the session counts every search it stopped so the forced terminal
//! `bestmove`, whenever it arrives, is discarded instead of answering a
//! newer query.

use std::path::Path;
use std::time::Duration;

use cozy_chess::Move;
use tokio::time::{timeout_at, Instant};

use crate::difficulty::Difficulty;
use crate::stockfish::StockfishEngine;
use crate::{EngineCommand, EngineEvent, Evaluation, GoParams};

/// Extra wait beyond the requested movetime before a search is written off.
const BESTMOVE_GRACE: Duration = Duration::from_millis(500);

/// Depth bound for hint searches. Shallower than a real search, so hints are
/// fast but noticeably weaker analysis.
const HINT_DEPTH: u8 = 6;
const HINT_TIMEOUT: Duration = Duration::from_secs(1);

const EVAL_DEPTH: u8 = 12;
const EVAL_TIMEOUT: Duration = Duration::from_secs(3);
/// An evaluation resolves early once this many score samples have arrived.
const EVAL_SAMPLES: usize = 5;

/// Baseline options applied once during connection, before any search.
const BASELINE_OPTIONS: [(&str, &str); 3] = [("Threads", "1"), ("Hash", "16"), ("Contempt", "0")];

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be reached: spawn or handshake failed, or the
    /// session has been shut down.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    /// The engine process went away mid-conversation.
    #[error("engine process disconnected")]
    Disconnected,
}

/// A shallow-search move suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub mv: Move,
    /// Depth at which the suggestion was found.
    pub depth: u8,
}

/// One engine connection with its current difficulty.
///
/// Timeouts are normal outcomes here, not errors: every query resolves
/// `Ok(None)` when its bound elapses. Only connection-level failures
/// ([`EngineError`]) come back as `Err`.
pub struct EngineSession {
    engine: Option<StockfishEngine>,
    difficulty: Difficulty,
    /// Searches this session told to `stop` whose terminal `bestmove` has
    /// not been observed yet. Each `go` produces exactly one terminal, so
    /// this many incoming `bestmove` events belong to abandoned searches
    /// and must be discarded, not resolved.
    stopped_searches: usize,
}

impl EngineSession {
    /// Spawn the engine, run the handshake, apply the baseline options and
    /// the default difficulty. Any failure here is fatal to the session and
    /// surfaced to the caller.
    pub async fn connect(stockfish_path: Option<&Path>) -> Result<Self, EngineError> {
        let engine = StockfishEngine::spawn(stockfish_path).await?;
        Self::apply_baseline(&engine).await?;

        let mut session = Self {
            engine: Some(engine),
            difficulty: Difficulty::default(),
            stopped_searches: 0,
        };
        let default_level = session.difficulty.level;
        session.set_difficulty(default_level).await;
        Ok(session)
    }

    async fn apply_baseline(engine: &StockfishEngine) -> Result<(), EngineError> {
        for (name, value) in BASELINE_OPTIONS {
            engine
                .send_command(EngineCommand::SetOption {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                })
                .await?;
        }
        Ok(())
    }

    /// Select a difficulty level (1..=4; anything else falls back to 2) and
    /// push the matching `Skill Level` option to the engine. The selected
    /// search bounds apply to subsequent queries; there is no direct
    /// acknowledgement from the engine.
    pub async fn set_difficulty(&mut self, level: u8) {
        self.difficulty = Difficulty::for_level(level);
        tracing::info!(
            level = self.difficulty.level,
            skill = self.difficulty.skill_level,
            "setting difficulty"
        );
        if let Some(engine) = &self.engine {
            let cmd = EngineCommand::SetOption {
                name: "Skill Level".to_string(),
                value: Some(self.difficulty.skill_level.to_string()),
            };
            if let Err(e) = engine.send_command(cmd).await {
                tracing::error!("failed to apply skill level: {e}");
            }
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether [`shutdown`](Self::shutdown) has not yet been called.
    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    /// Ask for the best move from `fen`, searching for `move_time`.
    ///
    /// Resolves `None` when the engine reports no legal move, or when no
    /// `bestmove` arrives within `move_time` plus a grace period. The timeout
    /// path sends `stop` once so the engine does not keep searching for an
    /// answer nobody is waiting on.
    pub async fn best_move(
        &mut self,
        fen: &str,
        move_time: Duration,
    ) -> Result<Option<Move>, EngineError> {
        self.drain_stale();
        let deadline = Instant::now() + move_time + BESTMOVE_GRACE;
        let (engine, stopped) = self.engine_parts()?;
        engine
            .send_command(EngineCommand::SetPosition {
                fen: fen.to_string(),
                moves: vec![],
            })
            .await?;
        engine
            .send_command(EngineCommand::Go(GoParams {
                movetime: Some(move_time.as_millis() as u64),
                ..Default::default()
            }))
            .await?;

        loop {
            match timeout_at(deadline, engine.recv_event()).await {
                Ok(Some(EngineEvent::BestMove(mv))) => {
                    if *stopped > 0 {
                        *stopped -= 1;
                        tracing::debug!("discarded terminal from a stopped search");
                        continue;
                    }
                    tracing::info!(result = ?mv, "bestmove resolved");
                    return Ok(mv);
                }
                Ok(Some(_)) => continue,
                Ok(None) => return Err(EngineError::Disconnected),
                Err(_) => {
                    tracing::info!(?move_time, "bestmove search timed out");
                    engine.send_command(EngineCommand::Stop).await?;
                    *stopped += 1;
                    return Ok(None);
                }
            }
        }
    }

    /// [`best_move`](Self::best_move) with the current difficulty's think
    /// time.
    pub async fn best_move_for_difficulty(
        &mut self,
        fen: &str,
    ) -> Result<Option<Move>, EngineError> {
        let move_time = Duration::from_millis(self.difficulty.move_time_ms);
        self.best_move(fen, move_time).await
    }

    /// A quick move suggestion: the first principal variation reported by a
    /// shallow depth-bounded search, or `None` if nothing usable arrives
    /// within a second.
    pub async fn hint(&mut self, fen: &str) -> Result<Option<Hint>, EngineError> {
        self.drain_stale();
        let deadline = Instant::now() + HINT_TIMEOUT;
        let (engine, stopped) = self.engine_parts()?;
        engine
            .send_command(EngineCommand::SetPosition {
                fen: fen.to_string(),
                moves: vec![],
            })
            .await?;
        engine
            .send_command(EngineCommand::Go(GoParams {
                depth: Some(HINT_DEPTH),
                ..Default::default()
            }))
            .await?;

        loop {
            match timeout_at(deadline, engine.recv_event()).await {
                Ok(Some(EngineEvent::Info(info))) => {
                    if let (Some(&mv), Some(depth)) = (info.pv.first(), info.depth) {
                        tracing::info!(hint = %crate::uci::format_uci_move(&mv), depth, "hint resolved");
                        return Ok(Some(Hint { mv, depth }));
                    }
                }
                Ok(Some(EngineEvent::BestMove(_))) => {
                    if *stopped > 0 {
                        *stopped -= 1;
                        continue;
                    }
                    // Search ended without a usable pv line.
                    return Ok(None);
                }
                Ok(Some(_)) => continue,
                Ok(None) => return Err(EngineError::Disconnected),
                Err(_) => {
                    engine.send_command(EngineCommand::Stop).await?;
                    *stopped += 1;
                    return Ok(None);
                }
            }
        }
    }

    /// Evaluate `fen`. Score samples are accumulated from the info stream;
    /// the query resolves with the latest sample once enough have been seen,
    /// or with whatever was last observed when the search ends or the outer
    /// deadline hits. `None` means no sample arrived at all.
    pub async fn evaluation(&mut self, fen: &str) -> Result<Option<Evaluation>, EngineError> {
        self.drain_stale();
        let deadline = Instant::now() + EVAL_TIMEOUT;
        let (engine, stopped) = self.engine_parts()?;
        engine
            .send_command(EngineCommand::SetPosition {
                fen: fen.to_string(),
                moves: vec![],
            })
            .await?;
        engine
            .send_command(EngineCommand::Go(GoParams {
                depth: Some(EVAL_DEPTH),
                ..Default::default()
            }))
            .await?;

        let mut last = None;
        let mut samples = 0usize;
        loop {
            match timeout_at(deadline, engine.recv_event()).await {
                Ok(Some(EngineEvent::Info(info))) => {
                    if let Some(score) = info.score {
                        last = Some(Evaluation::from(score));
                        samples += 1;
                        if samples >= EVAL_SAMPLES {
                            engine.send_command(EngineCommand::Stop).await?;
                            *stopped += 1;
                            return Ok(last);
                        }
                    }
                }
                Ok(Some(EngineEvent::BestMove(_))) => {
                    if *stopped > 0 {
                        *stopped -= 1;
                        continue;
                    }
                    return Ok(last);
                }
                Ok(Some(_)) => continue,
                Ok(None) => return Err(EngineError::Disconnected),
                Err(_) => {
                    engine.send_command(EngineCommand::Stop).await?;
                    *stopped += 1;
                    return Ok(last);
                }
            }
        }
    }

    /// Tear the session down: `quit` the engine and reap the process. Later
    /// calls are no-ops; queries after shutdown fail with
    /// [`EngineError::Unavailable`].
    pub async fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            tracing::info!("shutting down engine session");
            engine.shutdown().await;
        }
    }

    fn engine_parts(&mut self) -> Result<(&mut StockfishEngine, &mut usize), EngineError> {
        match self.engine.as_mut() {
            Some(engine) => Ok((engine, &mut self.stopped_searches)),
            None => Err(EngineError::Unavailable("session has been shut down".into())),
        }
    }

    /// Discard output left over from a previous request. Must run before the
    /// next command is sent, so an expired search cannot answer a new query.
    /// A stopped search's terminal observed here settles its debt.
    fn drain_stale(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let mut discarded = 0usize;
        while let Some(event) = engine.try_recv_event() {
            if matches!(event, EngineEvent::BestMove(_)) {
                self.stopped_searches = self.stopped_searches.saturating_sub(1);
            }
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "dropped stale engine events");
        }
    }
}
