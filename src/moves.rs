use chess::{Board, ChessMove, Color, MoveGen, Piece};

/// A legal move annotated with everything ordering and the heuristic tables
/// want to know about it: who moves, what moves, what (if anything) dies.
///
/// The inner [`ChessMove`] is the equality key used across all heuristic
/// tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedMove {
    pub mv: ChessMove,
    pub side: Color,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub is_castle: bool,
    pub is_en_passant: bool,
}

impl TaggedMove {
    pub fn new(board: &Board, mv: ChessMove) -> TaggedMove {
        let side = board.side_to_move();
        // legal moves always have a mover on their source square
        let piece = board.piece_on(mv.get_source()).unwrap();

        let file_changed = mv.get_source().get_file() != mv.get_dest().get_file();
        let is_en_passant =
            piece == Piece::Pawn && file_changed && board.piece_on(mv.get_dest()).is_none();

        let captured = if is_en_passant {
            Some(Piece::Pawn)
        } else {
            board.piece_on(mv.get_dest())
        };

        let from_file = mv.get_source().get_file().to_index() as i32;
        let to_file = mv.get_dest().get_file().to_index() as i32;
        let is_castle = piece == Piece::King && (from_file - to_file).abs() == 2;

        TaggedMove {
            mv,
            side,
            piece,
            captured,
            is_castle,
            is_en_passant,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.captured.is_none()
    }

    pub fn is_promotion(&self) -> bool {
        self.mv.get_promotion().is_some()
    }
}

/// All legal moves in the position, annotated, in the oracle's generation
/// order.
pub fn annotate_legal_moves(board: &Board) -> Vec<TaggedMove> {
    MoveGen::new_legal(board)
        .map(|mv| TaggedMove::new(board, mv))
        .collect()
}

#[cfg(test)]
use std::str::FromStr;

#[test]
fn startpos_has_twenty_quiet_moves() {
    let moves = annotate_legal_moves(&Board::default());

    assert_eq!(moves.len(), 20);
    assert!(moves.iter().all(|tm| tm.is_quiet()));
    assert!(moves.iter().all(|tm| tm.side == Color::White));
}

#[test]
fn captures_record_their_victim() {
    let board = Board::from_str("k7/8/8/3q4/4P3/8/8/7K w - - 0 1").unwrap();
    let moves = annotate_legal_moves(&board);

    let capture = moves
        .iter()
        .find(|tm| tm.captured.is_some())
        .expect("pawn takes queen exists");

    assert_eq!(capture.piece, Piece::Pawn);
    assert_eq!(capture.captured, Some(Piece::Queen));
    assert!(!capture.is_en_passant);
}

#[test]
fn en_passant_is_flagged_as_a_pawn_capture() {
    let board =
        Board::from_str("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3").unwrap();
    let moves = annotate_legal_moves(&board);

    let ep = moves
        .iter()
        .find(|tm| tm.is_en_passant)
        .expect("en passant capture exists");

    assert_eq!(ep.piece, Piece::Pawn);
    assert_eq!(ep.captured, Some(Piece::Pawn));
    assert_eq!(ep.mv.get_dest().to_string(), "f6");
}

#[test]
fn applying_a_move_never_disturbs_the_parent() {
    // Copy-make discipline: the parent snapshot must serialize identically
    // after every child has been built from it.
    let fens = [
        Board::default().to_string(),
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1".to_string(),
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3".to_string(),
    ];

    for fen in fens {
        let board = Board::from_str(&fen).unwrap();
        let before = board.to_string();

        for mv in MoveGen::new_legal(&board) {
            let child = board.make_move_new(mv);
            assert_ne!(child.to_string(), before);
            assert_eq!(board.to_string(), before, "parent changed after {mv}");
        }
    }
}

#[test]
fn castling_is_flagged_and_quiet() {
    let board = Board::from_str("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let moves = annotate_legal_moves(&board);

    let castle = moves
        .iter()
        .find(|tm| tm.is_castle)
        .expect("kingside castle exists");

    assert_eq!(castle.piece, Piece::King);
    assert!(castle.is_quiet());
}
