//! Process transport for a UCI engine.
//!
//! Spawns the engine binary, pumps its stdin from a command channel and its
//! stdout into an event channel, and performs the `uci`/`isready` handshake.
//! Everything above this layer talks typed [`EngineCommand`]s and
//! [`EngineEvent`]s; raw protocol text only exists here and in the parser.

use crate::session::EngineError;
use crate::uci::{format_uci_move, parse_uci_message, UciMessage};
use crate::{EngineCommand, EngineEvent, GoParams};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CHANNEL_CAPACITY: usize = 32;

/// Handle on a running engine process.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) leaves
/// the child to be reaped by tokio; `shutdown` is the polite path (`quit`,
/// short wait, kill).
pub struct StockfishEngine {
    process: Option<Child>,
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl StockfishEngine {
    /// Spawn an engine process and complete the UCI handshake.
    ///
    /// `path_override` takes precedence over discovery on the usual install
    /// locations. Every failure on this path is [`EngineError::Unavailable`]:
    /// the caller decides whether to retry.
    #[tracing::instrument(level = "info", skip(path_override))]
    pub async fn spawn(path_override: Option<&Path>) -> Result<Self, EngineError> {
        let path = match path_override {
            Some(p) => p.to_path_buf(),
            None => find_stockfish_path()
                .ok_or_else(|| EngineError::Unavailable("stockfish binary not found".into()))?,
        };
        tracing::info!("spawning engine at {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to spawn engine: {e}")))?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine has no stdin".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine has no stdout".into()))?;

        let (command_tx, mut command_rx) = mpsc::channel::<EngineCommand>(CHANNEL_CAPACITY);
        let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(CHANNEL_CAPACITY);

        // Output reader task: one classified event per recognised line.
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("engine stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("uci << {trimmed}");
                        if let Some(event) = classify_line(trimmed) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("error reading engine stdout: {e}");
                        break;
                    }
                }
            }
            tracing::debug!("output reader task exiting");
        });

        // Kick off the handshake before handing stdin to the writer task.
        stdin
            .write_all(b"uci\n")
            .await
            .map_err(|e| EngineError::Unavailable(format!("failed to write to stdin: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| EngineError::Unavailable(format!("failed to flush stdin: {e}")))?;
        await_ready(&mut event_rx).await?;

        // Stdin writer task: formats commands into protocol lines.
        tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                let mut line = format_command(&cmd);
                tracing::trace!("uci >> {line}");
                line.push('\n');

                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    tracing::error!("failed to write to engine stdin: {e}");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("failed to flush engine stdin: {e}");
                    break;
                }
                if matches!(cmd, EngineCommand::Quit) {
                    break;
                }
            }
            tracing::debug!("stdin writer task exiting");
        });

        command_tx
            .send(EngineCommand::IsReady)
            .await
            .map_err(|_| EngineError::Unavailable("engine closed during handshake".into()))?;
        await_ready(&mut event_rx).await?;

        tracing::info!("engine handshake complete");
        Ok(Self {
            process: Some(process),
            command_tx,
            event_rx,
        })
    }

    /// Queue a command for the engine.
    pub async fn send_command(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        tracing::debug!("queueing command: {:?}", cmd);
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::Disconnected)
    }

    /// Receive the next engine event; `None` once the engine is gone.
    pub async fn recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    /// Non-blocking receive, used to drain leftovers between requests.
    pub fn try_recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Ask the engine to quit, then make sure the process is gone.
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let _ = self.send_command(EngineCommand::Quit).await;
        if let Some(mut process) = self.process.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), process.wait()).await;
            let _ = process.kill().await;
        }
    }
}

/// Classify one line of engine output into the event the session layer
/// consumes. Unrecognised lines yield `None` and are skipped, which keeps the
/// transport tolerant of engine output this crate does not use.
pub fn classify_line(line: &str) -> Option<EngineEvent> {
    match parse_uci_message(line) {
        Ok(UciMessage::UciOk | UciMessage::ReadyOk) => Some(EngineEvent::Ready),
        Ok(UciMessage::BestMove { mv, .. }) => Some(EngineEvent::BestMove(mv)),
        Ok(UciMessage::Info(info)) => Some(EngineEvent::Info(info)),
        Ok(UciMessage::Id { .. }) => None,
        Err(e) => {
            tracing::trace!("ignoring engine line: {e}");
            None
        }
    }
}

/// Render a command as one UCI line (without the trailing newline).
fn format_command(cmd: &EngineCommand) -> String {
    match cmd {
        EngineCommand::SetPosition { fen, moves } => {
            let mut line = format!("position fen {fen}");
            if !moves.is_empty() {
                line.push_str(" moves");
                for mv in moves {
                    line.push(' ');
                    line.push_str(&format_uci_move(mv));
                }
            }
            line
        }
        EngineCommand::SetOption { name, value } => match value {
            Some(v) => format!("setoption name {name} value {v}"),
            None => format!("setoption name {name}"),
        },
        EngineCommand::Go(GoParams { movetime, depth }) => {
            if let Some(ms) = movetime {
                format!("go movetime {ms}")
            } else if let Some(d) = depth {
                format!("go depth {d}")
            } else {
                // Bound the search even when the caller forgot to.
                "go movetime 1000".to_string()
            }
        }
        EngineCommand::IsReady => "isready".to_string(),
        EngineCommand::Stop => "stop".to_string(),
        EngineCommand::Quit => "quit".to_string(),
    }
}

/// Wait for the next handshake acknowledgement, bounded by
/// [`HANDSHAKE_TIMEOUT`].
async fn await_ready(event_rx: &mut mpsc::Receiver<EngineEvent>) -> Result<(), EngineError> {
    let wait = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(event) = event_rx.recv().await {
            if matches!(event, EngineEvent::Ready) {
                return true;
            }
        }
        false
    })
    .await;

    match wait {
        Ok(true) => Ok(()),
        Ok(false) => Err(EngineError::Unavailable(
            "engine closed before completing the handshake".into(),
        )),
        Err(_) => Err(EngineError::Unavailable(
            "timed out waiting for engine handshake".into(),
        )),
    }
}

/// Look for a Stockfish executable in common install locations, then on PATH.
fn find_stockfish_path() -> Option<PathBuf> {
    const CANDIDATES: [&str; 4] = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    for candidate in CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join("stockfish"))
        .find(|p| p.is_file())
}

/// Far end of a channel-backed engine, standing in for the process in tests.
#[cfg(test)]
pub(crate) struct LoopbackEngine {
    command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
}

#[cfg(test)]
impl LoopbackEngine {
    /// Feed one raw output line through the same classification path the
    /// process reader uses.
    pub(crate) async fn feed_line(&self, line: &str) {
        if let Some(event) = classify_line(line) {
            self.event_tx.send(event).await.expect("session hung up");
        }
    }

    /// Take every command the session has issued so far.
    pub(crate) fn drain_commands(&mut self) -> Vec<EngineCommand> {
        let mut commands = Vec::new();
        while let Ok(cmd) = self.command_rx.try_recv() {
            commands.push(cmd);
        }
        commands
    }
}

#[cfg(test)]
impl StockfishEngine {
    /// A handle wired to in-memory channels instead of a process.
    pub(crate) fn loopback() -> (Self, LoopbackEngine) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                process: None,
                command_tx,
                event_rx,
            },
            LoopbackEngine {
                command_rx,
                event_tx,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::parse_uci_move;

    #[test]
    fn test_format_position_with_moves() {
        let cmd = EngineCommand::SetPosition {
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            moves: vec![
                parse_uci_move("e2e4").unwrap(),
                parse_uci_move("e7e5").unwrap(),
            ],
        };
        assert_eq!(
            format_command(&cmd),
            "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1 moves e2e4 e7e5"
        );
    }

    #[test]
    fn test_format_go_variants() {
        let movetime = EngineCommand::Go(GoParams {
            movetime: Some(2000),
            ..Default::default()
        });
        assert_eq!(format_command(&movetime), "go movetime 2000");

        let depth = EngineCommand::Go(GoParams {
            depth: Some(6),
            ..Default::default()
        });
        assert_eq!(format_command(&depth), "go depth 6");

        let unbounded = EngineCommand::Go(GoParams::default());
        assert_eq!(format_command(&unbounded), "go movetime 1000");
    }

    #[test]
    fn test_format_setoption() {
        let cmd = EngineCommand::SetOption {
            name: "Skill Level".to_string(),
            value: Some("5".to_string()),
        };
        assert_eq!(format_command(&cmd), "setoption name Skill Level value 5");
    }

    #[test]
    fn test_classify_skips_noise() {
        assert!(classify_line("option name Threads type spin default 1").is_none());
        assert!(classify_line("id name Stockfish 16").is_none());
        assert!(classify_line("").is_none());
        assert!(classify_line("uciok").is_some());
    }
}
