//! sfplay - play against, or query, a Stockfish engine from the terminal.
//!
//! Four subcommands over one [`EngineSession`]:
//! - `play`: interactive game, moves in long algebraic form, engine replies
//!   at the configured difficulty.
//! - `best-move`: one-shot best move for a FEN.
//! - `hint`: quick shallow-search suggestion for a FEN.
//! - `eval`: engine evaluation of a FEN in pawns (White-positive).
//!
//! The engine binary is discovered on the usual install paths; set
//! `SFPLAY_STOCKFISH_PATH` to point somewhere else (see [`config`]).

mod config;
mod play;

use std::time::Duration;

use clap::{Parser, Subcommand};
use engine::uci::format_uci_move;
use engine::EngineSession;

#[derive(Parser)]
#[command(name = "sfplay", about = "Stockfish-backed play and analysis at the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game against the engine.
    Play {
        /// Starting position as FEN; standard start position when omitted.
        #[arg(long)]
        fen: Option<String>,
        /// Difficulty level, 1 (weakest) to 4.
        #[arg(long, default_value_t = 2)]
        level: u8,
        /// Take the black pieces.
        #[arg(long)]
        black: bool,
    },
    /// Print the engine's best move for a position.
    BestMove {
        fen: String,
        /// Difficulty level, 1 (weakest) to 4.
        #[arg(long, default_value_t = 2)]
        level: u8,
        /// Think time in milliseconds, overriding the difficulty's.
        #[arg(long)]
        movetime_ms: Option<u64>,
    },
    /// Print a quick shallow-search move suggestion.
    Hint { fen: String },
    /// Print the engine's evaluation of a position.
    Eval { fen: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stockfish_path = config::stockfish_path();

    let mut session = EngineSession::connect(stockfish_path.as_deref()).await?;
    tracing::debug!("engine session established");

    let result = run(&mut session, cli.command).await;
    session.shutdown().await;
    result
}

async fn run(session: &mut EngineSession, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Play { fen, level, black } => {
            session.set_difficulty(level).await;
            play::run(session, fen.as_deref(), black).await
        }
        Commands::BestMove {
            fen,
            level,
            movetime_ms,
        } => {
            session.set_difficulty(level).await;
            let move_time = movetime_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_millis(session.difficulty().move_time_ms));
            match session.best_move(&fen, move_time).await? {
                Some(mv) => println!("{}", format_uci_move(&mv)),
                None => println!("(none)"),
            }
            Ok(())
        }
        Commands::Hint { fen } => {
            match session.hint(&fen).await? {
                Some(hint) => {
                    println!("{} (depth {})", format_uci_move(&hint.mv), hint.depth)
                }
                None => println!("no suggestion"),
            }
            Ok(())
        }
        Commands::Eval { fen } => {
            match session.evaluation(&fen).await? {
                Some(eval) => println!("{}", play::format_eval(eval)),
                None => println!("no evaluation"),
            }
            Ok(())
        }
    }
}
