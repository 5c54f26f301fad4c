//! Interactive game loop against the engine.
//!
//! Legality, turn order, and game-end detection all come from the rules
//! library; the engine session is only asked for moves and evaluations.

use cozy_chess::{Board, Color, File, GameStatus, Move, Piece, Rank, Square};
use engine::uci::{format_uci_move, parse_uci_move};
use engine::{EngineSession, Evaluation};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn run(
    session: &mut EngineSession,
    fen: Option<&str>,
    play_black: bool,
) -> anyhow::Result<()> {
    let mut board = match fen {
        Some(f) => f
            .parse::<Board>()
            .map_err(|_| anyhow::anyhow!("invalid FEN: {f}"))?,
        None => Board::default(),
    };
    let human = if play_black {
        Color::Black
    } else {
        Color::White
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Moves in long algebraic form (e2e4, e7e8q). 'hint' asks the engine, 'quit' leaves.");

    loop {
        println!("\n{}", render_board(&board));

        match board.status() {
            GameStatus::Won => {
                // The side to move has been mated.
                let winner = match board.side_to_move() {
                    Color::White => "Black",
                    Color::Black => "White",
                };
                println!("Checkmate. {winner} wins.");
                break;
            }
            GameStatus::Drawn => {
                println!("Draw.");
                break;
            }
            GameStatus::Ongoing => {}
        }
        if !board.checkers().is_empty() {
            println!("Check.");
        }

        if board.side_to_move() == human {
            stdout.write_all(b"your move> ").await?;
            stdout.flush().await?;
            let Some(line) = input.next_line().await? else {
                break;
            };
            let token = line.trim();
            match token {
                "" => continue,
                "quit" => break,
                "hint" => {
                    match session.hint(&board.to_string()).await? {
                        Some(hint) => println!(
                            "try {} (depth {})",
                            format_uci_move(&hint.mv),
                            hint.depth
                        ),
                        None => println!("no suggestion right now"),
                    }
                    continue;
                }
                _ => {}
            }
            let Ok(parsed) = parse_uci_move(token) else {
                println!("could not read '{token}', use long algebraic form");
                continue;
            };
            match find_legal(&board, parsed) {
                Some(mv) => board.play_unchecked(mv),
                None => {
                    println!("illegal move: {token}");
                    continue;
                }
            }
        } else {
            println!("engine is thinking...");
            let reply = session.best_move_for_difficulty(&board.to_string()).await?;
            match reply.and_then(|mv| find_legal(&board, mv)) {
                Some(mv) => {
                    println!("engine plays {}", format_uci_move(&mv));
                    board.play_unchecked(mv);
                }
                None => {
                    println!("engine has nothing to offer; stopping.");
                    break;
                }
            }
            if let Some(eval) = session.evaluation(&board.to_string()).await? {
                println!("eval: {}", format_eval(eval));
            }
        }
    }

    Ok(())
}

/// Match a parsed UCI token against the position's legal moves.
///
/// Translates UCI castling (king two squares) into cozy-chess king-takes-rook
/// form, and fills in a queen when a bare promotion token reaches the last
/// rank. Returns `None` when nothing legal matches.
fn find_legal(board: &Board, mv: Move) -> Option<Move> {
    let mut legal = Vec::new();
    board.generate_moves(|moves| {
        legal.extend(moves);
        false
    });

    let mv = convert_uci_castling(mv, &legal);
    if legal.contains(&mv) {
        return Some(mv);
    }
    if mv.promotion.is_none() {
        let queening = Move {
            promotion: Some(Piece::Queen),
            ..mv
        };
        if legal.contains(&queening) {
            return Some(queening);
        }
    }
    None
}

/// Convert UCI castling notation to cozy-chess notation.
///
/// UCI writes castling as the king moving two squares (e1g1, e1c1, e8g8,
/// e8c8); cozy-chess encodes it king-to-rook (e1h1, e1a1, e8h8, e8a8). The
/// converted move is only used if it actually appears in the legal move list.
fn convert_uci_castling(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let king_start = matches!(mv.from.file(), File::E);
    let castle_target = matches!(mv.to.file(), File::G | File::C);

    if is_back_rank && king_start && castle_target && mv.promotion.is_none() {
        let rook_file = match mv.to.file() {
            File::G => File::H,
            _ => File::A,
        };
        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };
        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

const RANKS_TOP_DOWN: [Rank; 8] = [
    Rank::Eighth,
    Rank::Seventh,
    Rank::Sixth,
    Rank::Fifth,
    Rank::Fourth,
    Rank::Third,
    Rank::Second,
    Rank::First,
];

const FILES: [File; 8] = [
    File::A,
    File::B,
    File::C,
    File::D,
    File::E,
    File::F,
    File::G,
    File::H,
];

/// ASCII board, White at the bottom, uppercase for White pieces.
fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for &rank in &RANKS_TOP_DOWN {
        out.push(rank_label(rank));
        out.push(' ');
        for &file in &FILES {
            let sq = Square::new(file, rank);
            let c = match (board.piece_on(sq), board.color_on(sq)) {
                (Some(piece), Some(color)) => piece_char(piece, color),
                _ => '.',
            };
            out.push(c);
            out.push(' ');
        }
        out.push('\n');
    }
    out.push_str("  a b c d e f g h");
    out
}

fn rank_label(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

fn piece_char(piece: Piece, color: Color) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    match color {
        Color::White => c.to_ascii_uppercase(),
        Color::Black => c,
    }
}

pub fn format_eval(eval: Evaluation) -> String {
    match eval {
        Evaluation::Pawns(p) => format!("{p:+.2}"),
        Evaluation::MateIn(n) if n > 0 => format!("mate in {n}"),
        Evaluation::MateIn(n) => format!("mated in {}", -n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_castling_token_is_translated() {
        // White to move with both castles available.
        let board: Board = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let mv = find_legal(&board, parse_uci_move("e1g1").unwrap()).unwrap();
        assert_eq!(format_uci_move(&mv), "e1h1");
        let mv = find_legal(&board, parse_uci_move("e1c1").unwrap()).unwrap();
        assert_eq!(format_uci_move(&mv), "e1a1");
    }

    #[test]
    fn test_bare_promotion_token_defaults_to_queen() {
        let board: Board = "8/4P3/8/8/8/8/2k5/K7 w - - 0 1".parse().unwrap();
        let mv = find_legal(&board, parse_uci_move("e7e8").unwrap()).unwrap();
        assert_eq!(mv.promotion, Some(Piece::Queen));
    }

    #[test]
    fn test_illegal_token_is_rejected() {
        let board = Board::default();
        assert!(find_legal(&board, parse_uci_move("e2e5").unwrap()).is_none());
        assert!(find_legal(&board, parse_uci_move("e7e5").unwrap()).is_none());
    }

    #[test]
    fn test_render_start_position() {
        let rendered = render_board(&Board::default());
        assert!(rendered.starts_with("8 r n b q k b n r"));
        assert!(rendered.contains("1 R N B Q K B N R"));
        assert!(rendered.ends_with("  a b c d e f g h"));
    }

    #[test]
    fn test_format_eval() {
        assert_eq!(format_eval(Evaluation::Pawns(-0.35)), "-0.35");
        assert_eq!(format_eval(Evaluation::Pawns(1.0)), "+1.00");
        assert_eq!(format_eval(Evaluation::MateIn(3)), "mate in 3");
        assert_eq!(format_eval(Evaluation::MateIn(-2)), "mated in 2");
    }
}
