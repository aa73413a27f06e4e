//! Mutable move-ordering state scoped to one search session.
//!
//! None of these tables are reset between iterative-deepening iterations:
//! ordering information gathered at shallow depth is deliberately carried
//! into deeper ones.

use chess::{ChessMove, Color, Piece, Square};

use crate::searcher::MAX_DEPTH;

/// Two quiet cutoff moves per ply, newest first.
pub struct KillerMoves {
    slots: Vec<(Option<ChessMove>, Option<ChessMove>)>,
}

impl KillerMoves {
    pub fn new() -> KillerMoves {
        KillerMoves {
            slots: vec![(None, None); MAX_DEPTH],
        }
    }

    /// FIFO overwrite: the new move takes slot 0, slot 0 shifts to slot 1.
    pub fn store(&mut self, ply: usize, m: ChessMove) {
        if let Some(slots) = self.slots.get_mut(ply) {
            slots.1 = slots.0;
            slots.0 = Some(m);
        }
    }

    pub fn primary(&self, ply: usize) -> Option<ChessMove> {
        self.slots.get(ply).and_then(|s| s.0)
    }

    pub fn secondary(&self, ply: usize) -> Option<ChessMove> {
        self.slots.get(ply).and_then(|s| s.1)
    }
}

impl Default for KillerMoves {
    fn default() -> Self {
        KillerMoves::new()
    }
}

/// Accumulated quiet-move success per (side, piece, destination).
pub struct HistoryTable {
    scores: Box<[[[i32; 64]; 6]; 2]>,
}

impl HistoryTable {
    pub fn new() -> HistoryTable {
        HistoryTable {
            scores: Box::new([[[0; 64]; 6]; 2]),
        }
    }

    pub fn bump(&mut self, side: Color, piece: Piece, dest: Square, depth: u32) {
        self.scores[side.to_index()][piece.to_index()][dest.to_index()] += depth as i32;
    }

    pub fn get(&self, side: Color, piece: Piece, dest: Square) -> i32 {
        self.scores[side.to_index()][piece.to_index()][dest.to_index()]
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        HistoryTable::new()
    }
}

/// The quiet move that last refuted a given move, keyed by that move's
/// origin and destination. One slot, overwritten.
pub struct CounterMoves {
    table: Box<[[Option<ChessMove>; 64]; 64]>,
}

impl CounterMoves {
    pub fn new() -> CounterMoves {
        CounterMoves {
            table: Box::new([[None; 64]; 64]),
        }
    }

    pub fn store(&mut self, refuted: ChessMove, counter: ChessMove) {
        let from = refuted.get_source().to_index();
        let to = refuted.get_dest().to_index();
        self.table[from][to] = Some(counter);
    }

    pub fn get(&self, refuted: ChessMove) -> Option<ChessMove> {
        let from = refuted.get_source().to_index();
        let to = refuted.get_dest().to_index();
        self.table[from][to]
    }
}

impl Default for CounterMoves {
    fn default() -> Self {
        CounterMoves::new()
    }
}

#[cfg(test)]
use std::str::FromStr;

#[cfg(test)]
fn mv(uci: &str) -> ChessMove {
    let from = Square::from_str(&uci[..2]).unwrap();
    let to = Square::from_str(&uci[2..4]).unwrap();
    ChessMove::new(from, to, None)
}

#[test]
fn killer_slots_shift_fifo() {
    let a = mv("a2a3");
    let b = mv("b2b3");
    let c = mv("c2c3");

    let mut killers = KillerMoves::new();

    killers.store(3, a);
    assert_eq!(killers.primary(3), Some(a));
    assert_eq!(killers.secondary(3), None);

    killers.store(3, b);
    assert_eq!(killers.primary(3), Some(b));
    assert_eq!(killers.secondary(3), Some(a));

    killers.store(3, c);
    assert_eq!(killers.primary(3), Some(c));
    assert_eq!(killers.secondary(3), Some(b));

    // other plies are untouched
    assert_eq!(killers.primary(2), None);
}

#[test]
fn history_accumulates_per_key() {
    let mut history = HistoryTable::new();
    let dest = Square::from_str("e4").unwrap();

    history.bump(Color::White, Piece::Knight, dest, 3);
    history.bump(Color::White, Piece::Knight, dest, 2);

    assert_eq!(history.get(Color::White, Piece::Knight, dest), 5);
    assert_eq!(history.get(Color::Black, Piece::Knight, dest), 0);
    assert_eq!(history.get(Color::White, Piece::Bishop, dest), 0);
}

#[test]
fn countermove_slot_is_overwritten() {
    let refuted = mv("e2e4");
    let first = mv("e7e5");
    let second = mv("c7c5");

    let mut counters = CounterMoves::new();

    counters.store(refuted, first);
    assert_eq!(counters.get(refuted), Some(first));

    counters.store(refuted, second);
    assert_eq!(counters.get(refuted), Some(second));
}
