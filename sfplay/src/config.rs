//! Environment-variable tunables for sfplay.
//!
//! `SFPLAY_STOCKFISH_PATH` points at the engine binary, bypassing discovery
//! on the usual install locations.

use std::path::PathBuf;

/// Explicit engine binary path, if configured.
pub fn stockfish_path() -> Option<PathBuf> {
    std::env::var_os("SFPLAY_STOCKFISH_PATH").map(PathBuf::from)
}
