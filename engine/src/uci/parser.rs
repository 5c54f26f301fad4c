use crate::uci::UciError;
use crate::{EngineInfo, Score};
use cozy_chess::{File, Move, Piece, Rank, Square};

/// Incoming message from a UCI engine, classified by its leading token.
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id {
        name: String,
        value: String,
    },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)` (also accepted as `bestmove
    /// null`), which engines emit for positions with no legal move.
    BestMove {
        mv: Option<Move>,
        ponder: Option<Move>,
    },
    Info(EngineInfo),
}

/// Parse one line of engine output.
///
/// This is prefix classification, not a full UCI grammar: lines that do not
/// start with a known token come back as [`UciError::UnknownMessage`] and
/// callers are expected to skip them.
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            let token = tokens
                .get(1)
                .ok_or_else(|| UciError::MalformedMessage(line.to_string()))?;
            let mv = match *token {
                "(none)" | "null" => None,
                tok => Some(parse_uci_move(tok)?),
            };
            let ponder = if tokens.len() >= 4 && tokens[2] == "ponder" {
                parse_uci_move(tokens[3]).ok()
            } else {
                None
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse the body of an "info" line. Unknown keywords are skipped, so this
/// never fails; an empty body yields an empty [`EngineInfo`].
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "seldepth" => {
                i += 1;
                info.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                info.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                info.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "pv" => {
                // Collect all moves until next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if let Ok(mv) = parse_uci_move(tokens[i]) {
                        info.pv.push(mv);
                    }
                    i += 1;
                }
                continue; // Don't increment i again
            }
            "multipv" => {
                i += 1;
                info.multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "currmove" => {
                i += 1;
                info.currmove = tokens.get(i).and_then(|s| parse_uci_move(s).ok());
            }
            "hashfull" => {
                i += 1;
                info.hashfull = tokens.get(i).and_then(|s| s.parse().ok());
            }
            _ => {
                // Unknown keyword, skip
            }
        }
        i += 1;
    }

    info
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
    )
}

/// Parse a UCI move token (e2e4, e7e8q).
///
/// The token must be exactly 4 or 5 ASCII characters, both squares must be on
/// the board, and a promotion character must name a real piece. Anything else
/// is rejected here so an invalid move is never constructed.
pub fn parse_uci_move(s: &str) -> Result<Move, UciError> {
    if !s.is_ascii() || (s.len() != 4 && s.len() != 5) {
        return Err(UciError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            _ => return Err(UciError::InvalidPromotion(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(s: &str) -> Result<Square, UciError> {
    let mut chars = s.chars();

    let file = match chars.next() {
        Some('a') => File::A,
        Some('b') => File::B,
        Some('c') => File::C,
        Some('d') => File::D,
        Some('e') => File::E,
        Some('f') => File::F,
        Some('g') => File::G,
        Some('h') => File::H,
        _ => return Err(UciError::InvalidSquare(s.to_string())),
    };

    let rank = match chars.next() {
        Some('1') => Rank::First,
        Some('2') => Rank::Second,
        Some('3') => Rank::Third,
        Some('4') => Rank::Fourth,
        Some('5') => Rank::Fifth,
        Some('6') => Rank::Sixth,
        Some('7') => Rank::Seventh,
        Some('8') => Rank::Eighth,
        _ => return Err(UciError::InvalidSquare(s.to_string())),
    };

    Ok(Square::new(file, rank))
}

/// Format a move for UCI (cozy-chess Move → "e2e4").
pub fn format_uci_move(mv: &Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(match promo {
            Piece::Queen => 'q',
            Piece::Rook => 'r',
            Piece::Bishop => 'b',
            Piece::Knight => 'n',
            _ => unreachable!(),
        });
    }
    s
}

fn format_square(sq: Square) -> String {
    let file = match sq.file() {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    };
    let rank = match sq.rank() {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    };
    format!("{}{}", file, rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove { mv, ponder } => {
                assert_eq!(format_uci_move(&mv.unwrap()), "e2e4");
                assert_eq!(format_uci_move(&ponder.unwrap()), "e7e5");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_promotion() {
        let msg = parse_uci_message("bestmove e7e8q").unwrap();
        match msg {
            UciMessage::BestMove { mv: Some(mv), .. } => {
                assert_eq!(format_square(mv.from), "e7");
                assert_eq!(format_square(mv.to), "e8");
                assert_eq!(mv.promotion, Some(Piece::Queen));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_none() {
        for line in ["bestmove (none)", "bestmove null"] {
            let msg = parse_uci_message(line).unwrap();
            match msg {
                UciMessage::BestMove { mv, .. } => assert!(mv.is_none()),
                _ => panic!("Wrong message type"),
            }
        }
    }

    #[test]
    fn test_parse_info() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert!(matches!(info.score, Some(Score::Centipawns(35))));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv.len(), 2);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info_mate_score() {
        let msg = parse_uci_message("info depth 20 score mate -3 nodes 99").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert!(matches!(info.score, Some(Score::Mate(-3))));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_info_line_carries_score_and_pv_together() {
        // One line can answer an evaluation query and a hint query at once.
        let msg =
            parse_uci_message("info depth 12 seldepth 16 score cp -35 nodes 4242 pv e7e5 g1f3")
                .unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert!(matches!(info.score, Some(Score::Centipawns(-35))));
                assert_eq!(format_uci_move(&info.pv[0]), "e7e5");
                assert_eq!(info.depth, Some(12));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_reject_malformed_move_tokens() {
        assert!(parse_uci_move("e2e").is_err());
        assert!(parse_uci_move("e2e4x9").is_err());
        assert!(parse_uci_move("i9e4").is_err());
        assert!(parse_uci_move("e0e4").is_err());
        assert!(parse_uci_move("e7e8k").is_err());
        assert!(parse_uci_move("♔2e4").is_err());
    }

    #[test]
    fn test_unknown_line_is_an_error() {
        assert!(matches!(
            parse_uci_message("option name Hash type spin default 16"),
            Err(UciError::UnknownMessage(_))
        ));
    }
}
