//! Negamax search with fail-hard alpha-beta pruning.
//!
//! One [`Searcher`] owns every piece of mutable search state — PV table,
//! killer/history/countermove tables, ply and node counters — so searches
//! are independent of each other. Positions travel down the recursion as
//! immutable snapshots: a child is produced with `make_move_new` and the
//! parent is untouched on every exit path, cutoffs included.

use chess::{Board, ChessMove};
use log::info;

use crate::cache::{CachedMove, PositionCache};
use crate::error::SearchError;
use crate::eval::evaluate;
use crate::heuristics::{CounterMoves, HistoryTable, KillerMoves};
use crate::moves::{annotate_legal_moves, TaggedMove};
use crate::ordering::{order_moves, OrderingContext};
use crate::zobrist::fingerprint;

pub const INFINITY_SCORE: i32 = 50_000;
pub const MAX_DEPTH: usize = 64;

const NULL_MOVE_MIN_DEPTH: u32 = 3;
// the forfeit probe searches at depth - 3
const NULL_MOVE_DEPTH_CUT: u32 = 3;
const LMR_FULL_DEPTH_MOVES: usize = 4;
const LMR_MIN_DEPTH: u32 = 3;

/// Whether the persisted cache may be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Normal operation: a cache hit short-circuits the node.
    Evaluate,
    /// Training: always recompute, so the caller can record fresh results.
    Record,
}

/// Per-feature pruning switches, mainly for comparing pruned and unpruned
/// searches against each other.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub null_move: bool,
    pub lmr: bool,
    pub pvs: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            null_move: true,
            lmr: true,
            pvs: true,
        }
    }
}

/// Outcome of one iterative-deepening run.
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// `None` exactly when the root position has no legal move.
    pub best_move: Option<ChessMove>,
    pub score: i32,
    /// Nodes visited during the final iteration.
    pub nodes: u64,
    pub depth: u32,
    pub pv: Vec<ChessMove>,
}

/// Triangular principal-variation table: row `ply` holds the best line
/// found from that ply, terminated by `None`.
pub struct PVTable {
    table: Box<[Option<ChessMove>]>,
}

impl Default for PVTable {
    fn default() -> Self {
        let size = MAX_DEPTH * (MAX_DEPTH + 1) / 2;
        PVTable {
            table: vec![None; size].into_boxed_slice(),
        }
    }
}

impl PVTable {
    fn idx_from_ply(ply: usize) -> usize {
        ply * (2 * MAX_DEPTH + 1 - ply) / 2
    }

    pub fn get(&self, ply: usize) -> Option<ChessMove> {
        self.table[PVTable::idx_from_ply(ply)]
    }

    fn clear(&mut self, ply: usize) {
        if ply < MAX_DEPTH {
            self.table[PVTable::idx_from_ply(ply)] = None;
        }
    }

    /// Install `m` as the best move at `ply` and pull up the child line
    /// from the row below.
    fn set(&mut self, ply: usize, m: ChessMove) {
        let ply_idx = PVTable::idx_from_ply(ply);
        self.table[ply_idx] = Some(m);

        let next_ply_idx = PVTable::idx_from_ply(ply + 1);
        let end = next_ply_idx + MAX_DEPTH - ply - 1;
        self.table.copy_within(next_ply_idx..end, ply_idx + 1);
    }

    pub fn line(&self) -> Vec<ChessMove> {
        self.table.iter().map_while(|m| *m).collect()
    }
}

pub struct Searcher<'a> {
    cache: &'a PositionCache,
    mode: SearchMode,
    params: SearchParams,
    pv_table: PVTable,
    // the previous iteration's line, used for PV-first ordering
    pv_line: Vec<ChessMove>,
    killers: KillerMoves,
    history: HistoryTable,
    counters: CounterMoves,
    follow_pv: bool,
    ply: usize,
    nodes: u64,
}

impl<'a> Searcher<'a> {
    pub fn new(cache: &'a PositionCache, mode: SearchMode) -> Searcher<'a> {
        Searcher::with_params(cache, mode, SearchParams::default())
    }

    pub fn with_params(
        cache: &'a PositionCache,
        mode: SearchMode,
        params: SearchParams,
    ) -> Searcher<'a> {
        Searcher {
            cache,
            mode,
            params,
            pv_table: PVTable::default(),
            pv_line: Vec::new(),
            killers: KillerMoves::new(),
            history: HistoryTable::new(),
            counters: CounterMoves::new(),
            follow_pv: false,
            ply: 0,
            nodes: 0,
        }
    }

    /// Iterative-deepening driver: search depth 1 up to `max_depth` with a
    /// full window, carrying the heuristic tables (but not the PV) from
    /// each iteration into the next.
    pub fn search(&mut self, board: &Board, max_depth: u32) -> Result<SearchReport, SearchError> {
        if max_depth == 0 || max_depth as usize >= MAX_DEPTH {
            return Err(SearchError::InvalidDepth(max_depth));
        }

        let mut score = 0;

        for depth in 1..=max_depth {
            self.pv_line = self.pv_table.line();
            self.follow_pv = true;
            self.nodes = 0;
            self.ply = 0;

            score = self.negamax(board, depth, -INFINITY_SCORE, INFINITY_SCORE, None);

            info!(
                target: "search",
                "depth {depth} score {score} nodes {} pv {}",
                self.nodes,
                format_line(&self.pv_table.line()),
            );
        }

        Ok(SearchReport {
            best_move: self.pv_table.get(0),
            score,
            nodes: self.nodes,
            depth: max_depth,
            pv: self.pv_table.line(),
        })
    }

    fn negamax(
        &mut self,
        board: &Board,
        depth: u32,
        mut alpha: i32,
        beta: i32,
        prev: Option<ChessMove>,
    ) -> i32 {
        self.nodes += 1;

        if depth == 0 {
            return evaluate(board, board.side_to_move());
        }

        self.pv_table.clear(self.ply);

        if self.mode == SearchMode::Evaluate {
            if let Some(entry) = self.cache.probe(fingerprint(board)) {
                let entry = *entry;
                return self.cached_node(&entry, depth, beta, prev);
            }
        }

        let in_check = board.checkers().popcnt() > 0;

        // Forfeit the turn and search shallow with a closed window; a fail
        // high means the real moves are not worth expanding. Unsound in
        // zugzwang — there is no verification search.
        if self.params.null_move && depth >= NULL_MOVE_MIN_DEPTH && self.ply > 0 && !in_check {
            if let Some(null_board) = board.null_move() {
                self.ply += 1;
                let score = -self.negamax(
                    &null_board,
                    depth - NULL_MOVE_DEPTH_CUT,
                    -beta,
                    -beta + 1,
                    None,
                );
                self.ply -= 1;

                if score >= beta {
                    return beta;
                }
            }
        }

        let moves = annotate_legal_moves(board);

        if moves.is_empty() {
            // the ply bias prefers quick mates delivered and slow mates
            // suffered, and survives the negamax sign flip
            return if in_check {
                -INFINITY_SCORE + self.ply as i32
            } else {
                0
            };
        }

        let pv_move = if self.follow_pv {
            self.enter_pv_node(&moves)
        } else {
            None
        };

        let ordered = order_moves(
            moves,
            &OrderingContext {
                killers: &self.killers,
                history: &self.history,
                counters: &self.counters,
                ply: self.ply,
                prev,
                pv_move,
            },
        );

        for (index, tm) in ordered.iter().enumerate() {
            let child = board.make_move_new(tm.mv);

            self.ply += 1;
            let score = if index == 0 {
                -self.negamax(&child, depth - 1, -beta, -alpha, Some(tm.mv))
            } else {
                self.late_move(&child, tm, index, depth, alpha, beta, in_check)
            };
            self.ply -= 1;

            if score >= beta {
                if tm.is_quiet() {
                    self.killers.store(self.ply, tm.mv);
                    if let Some(prev) = prev {
                        self.counters.store(prev, tm.mv);
                    }
                }
                return beta;
            }

            if score > alpha {
                if tm.is_quiet() {
                    self.history.bump(tm.side, tm.piece, tm.mv.get_dest(), depth);
                }
                alpha = score;
                self.pv_table.set(self.ply, tm.mv);
            }
        }

        alpha
    }

    /// Probing ladder for every move after the first: reduced depth for
    /// late quiet moves, then a closed-window verification at full depth,
    /// then the full-window search only while the move still looks like a
    /// new best. Called with `self.ply` already at the child's ply.
    #[allow(clippy::too_many_arguments)]
    fn late_move(
        &mut self,
        child: &Board,
        tm: &TaggedMove,
        index: usize,
        depth: u32,
        alpha: i32,
        beta: i32,
        in_check: bool,
    ) -> i32 {
        let reducible = self.params.lmr
            && index >= LMR_FULL_DEPTH_MOVES
            && depth >= LMR_MIN_DEPTH
            && !in_check
            && tm.is_quiet()
            && !tm.is_promotion();

        let mut score = if reducible {
            -self.negamax(child, depth - 2, -alpha - 1, -alpha, Some(tm.mv))
        } else {
            // no reduction applies: go straight to the verification probe
            alpha + 1
        };

        if score > alpha {
            if self.params.pvs {
                score = -self.negamax(child, depth - 1, -alpha - 1, -alpha, Some(tm.mv));
                if score > alpha && score < beta {
                    score = -self.negamax(child, depth - 1, -beta, -alpha, Some(tm.mv));
                }
            } else {
                score = -self.negamax(child, depth - 1, -beta, -alpha, Some(tm.mv));
            }
        }

        score
    }

    /// A cache hit stands in for the whole node, including the ordering
    /// side effects the cached move would have produced had it been
    /// searched normally.
    fn cached_node(
        &mut self,
        entry: &CachedMove,
        depth: u32,
        beta: i32,
        prev: Option<ChessMove>,
    ) -> i32 {
        if entry.eval >= beta {
            if entry.is_quiet() {
                self.killers.store(self.ply, entry.mv);
                if let Some(prev) = prev {
                    self.counters.store(prev, entry.mv);
                }
            }
            return beta;
        }

        if entry.is_quiet() {
            self.history
                .bump(entry.side, entry.piece, entry.mv.get_dest(), depth);
        }

        // the cached move becomes this node's PV candidate, with no tail
        self.pv_table.clear(self.ply + 1);
        self.pv_table.set(self.ply, entry.mv);

        entry.eval
    }

    /// Still on the previous iteration's line: stay on it only if its move
    /// for this ply is playable here, and hand that move to the orderer.
    fn enter_pv_node(&mut self, moves: &[TaggedMove]) -> Option<ChessMove> {
        self.follow_pv = false;

        let target = self.pv_line.get(self.ply).copied()?;
        if moves.iter().any(|tm| tm.mv == target) {
            self.follow_pv = true;
            Some(target)
        } else {
            None
        }
    }
}

fn format_line(line: &[ChessMove]) -> String {
    line.iter().fold(String::new(), |acc, m| {
        if acc.is_empty() {
            m.to_string()
        } else {
            format!("{acc} {m}")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Color, MoveGen, Piece, Square};
    use std::str::FromStr;

    const MATE_IN_ONE: &str = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";
    const STALEMATE: &str = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
    const HANGING_QUEEN: &str = "k7/8/8/3q4/4P3/8/8/7K w - - 0 1";

    fn mv(uci: &str) -> ChessMove {
        let from = Square::from_str(&uci[..2]).unwrap();
        let to = Square::from_str(&uci[2..4]).unwrap();
        ChessMove::new(from, to, None)
    }

    fn run(fen: &str, depth: u32) -> SearchReport {
        run_with(fen, depth, SearchParams::default())
    }

    fn run_with(fen: &str, depth: u32, params: SearchParams) -> SearchReport {
        let board = Board::from_str(fen).unwrap();
        let cache = PositionCache::new();
        let mut searcher = Searcher::with_params(&cache, SearchMode::Evaluate, params);
        searcher.search(&board, depth).unwrap()
    }

    #[test]
    fn rejects_zero_depth() {
        let cache = PositionCache::new();
        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);

        assert!(matches!(
            searcher.search(&Board::default(), 0),
            Err(SearchError::InvalidDepth(0))
        ));
    }

    #[test]
    fn rejects_excessive_depth() {
        let cache = PositionCache::new();
        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);

        assert!(matches!(
            searcher.search(&Board::default(), MAX_DEPTH as u32),
            Err(SearchError::InvalidDepth(_))
        ));
    }

    #[test]
    fn startpos_depth_one_picks_a_legal_move() {
        let report = run("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 1);

        let best = report.best_move.expect("a move exists");
        let legal: Vec<ChessMove> = MoveGen::new_legal(&Board::default()).collect();
        assert!(legal.contains(&best));
        assert_eq!(legal.len(), 20);

        assert!(report.score.abs() < 100);
        assert!(report.nodes > 0);
    }

    #[test]
    fn back_rank_mate_in_one_is_found() {
        for depth in [2, 3, 4] {
            let report = run(MATE_IN_ONE, depth);

            assert_eq!(report.best_move, Some(mv("a1a8")), "depth {depth}");
            assert_eq!(report.score, INFINITY_SCORE - 1, "depth {depth}");
            assert_eq!(report.pv.first(), Some(&mv("a1a8")));
        }
    }

    #[test]
    fn stalemate_scores_zero_with_no_move() {
        let report = run(STALEMATE, 3);

        assert_eq!(report.best_move, None);
        assert_eq!(report.score, 0);
        assert!(report.pv.is_empty());
    }

    #[test]
    fn hanging_queen_is_taken() {
        let report = run(HANGING_QUEEN, 3);

        assert_eq!(report.best_move, Some(mv("e4d5")));
        assert!(report.score > 0);
    }

    #[test]
    fn pruning_features_preserve_results_on_tactical_positions() {
        let all_off = SearchParams {
            null_move: false,
            lmr: false,
            pvs: false,
        };
        let toggles = [
            all_off,
            SearchParams {
                null_move: false,
                ..SearchParams::default()
            },
            SearchParams {
                lmr: false,
                ..SearchParams::default()
            },
            SearchParams {
                pvs: false,
                ..SearchParams::default()
            },
        ];

        for (fen, depth) in [
            (MATE_IN_ONE, 2),
            (MATE_IN_ONE, 3),
            (MATE_IN_ONE, 4),
            (HANGING_QUEEN, 2),
            (HANGING_QUEEN, 3),
        ] {
            let reference = run(fen, depth);

            for params in toggles {
                let candidate = run_with(fen, depth, params);

                assert_eq!(
                    candidate.best_move, reference.best_move,
                    "{fen} at depth {depth} with {params:?}"
                );
                assert_eq!(
                    candidate.score, reference.score,
                    "{fen} at depth {depth} with {params:?}"
                );
            }
        }
    }

    #[test]
    fn closed_window_verification_is_exact_at_startpos() {
        let pvs_off = SearchParams {
            pvs: false,
            ..SearchParams::default()
        };

        for depth in [1, 2] {
            let with_pvs = run("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", depth);
            let without = run_with(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                depth,
                pvs_off,
            );

            assert_eq!(with_pvs.best_move, without.best_move, "depth {depth}");
            assert_eq!(with_pvs.score, without.score, "depth {depth}");
        }
    }

    #[test]
    fn pv_is_a_playable_line() {
        let report = run("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4", 3);

        assert!(!report.pv.is_empty());
        assert!(report.pv.len() <= 3);
        assert_eq!(report.pv.first().copied(), report.best_move);

        let mut board =
            Board::from_str("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4")
                .unwrap();
        for m in &report.pv {
            assert!(MoveGen::new_legal(&board).any(|legal| legal == *m));
            board = board.make_move_new(*m);
        }
    }

    #[test]
    fn ply_returns_to_root_after_search() {
        let cache = PositionCache::new();
        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);

        searcher.search(&Board::default(), 3).unwrap();
        assert_eq!(searcher.ply, 0);
    }

    #[test]
    fn cache_hit_short_circuits_the_root() {
        let board = Board::from_str(MATE_IN_ONE).unwrap();

        let decoy = CachedMove {
            mv: mv("h2h3"),
            side: Color::White,
            piece: Piece::Pawn,
            captured: false,
            eval: 17,
        };

        let mut cache = PositionCache::new();
        cache.record(fingerprint(&board), decoy);

        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);
        let report = searcher.search(&board, 3).unwrap();

        // the cached answer wins over the over-the-board mate
        assert_eq!(report.best_move, Some(decoy.mv));
        assert_eq!(report.score, 17);
        assert_eq!(report.nodes, 1);
    }

    #[test]
    fn record_mode_bypasses_the_cache() {
        let board = Board::from_str(MATE_IN_ONE).unwrap();

        let decoy = CachedMove {
            mv: mv("h2h3"),
            side: Color::White,
            piece: Piece::Pawn,
            captured: false,
            eval: 17,
        };

        let mut cache = PositionCache::new();
        cache.record(fingerprint(&board), decoy);

        let mut searcher = Searcher::new(&cache, SearchMode::Record);
        let report = searcher.search(&board, 3).unwrap();

        assert_eq!(report.best_move, Some(mv("a1a8")));
        assert_eq!(report.score, INFINITY_SCORE - 1);
    }

    #[test]
    fn quiet_cache_hit_still_feeds_the_history_table() {
        let board = Board::from_str(MATE_IN_ONE).unwrap();

        let decoy = CachedMove {
            mv: mv("h2h3"),
            side: Color::White,
            piece: Piece::Pawn,
            captured: false,
            eval: 17,
        };

        let mut cache = PositionCache::new();
        cache.record(fingerprint(&board), decoy);

        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);
        searcher.search(&board, 3).unwrap();

        // one bump per iteration, by the remaining depth: 1 + 2 + 3
        let dest = Square::from_str("h3").unwrap();
        assert_eq!(searcher.history.get(Color::White, Piece::Pawn, dest), 6);
    }

    #[test]
    fn cutoff_cache_hit_updates_killers_and_countermoves() {
        let board = Board::from_str("k7/8/8/8/8/8/8/7K w - - 0 1").unwrap();

        let refuting = CachedMove {
            mv: mv("h1g1"),
            side: Color::White,
            piece: Piece::King,
            captured: false,
            eval: 500,
        };

        let mut cache = PositionCache::new();
        cache.record(fingerprint(&board), refuting);

        let prev = mv("a7a8");
        let mut searcher = Searcher::new(&cache, SearchMode::Evaluate);
        let score = searcher.negamax(&board, 2, -100, 100, Some(prev));

        // fail-hard: the bound comes back, not the cached score
        assert_eq!(score, 100);
        assert_eq!(searcher.killers.primary(0), Some(refuting.mv));
        assert_eq!(searcher.counters.get(prev), Some(refuting.mv));
    }

    #[test]
    fn pv_table_round_trips_a_line() {
        let mut pv_table = PVTable::default();
        let line: Vec<ChessMove> = vec![mv("e2e4"), mv("e7e5"), mv("g1f3")];

        for (ply, m) in line.iter().enumerate().rev() {
            pv_table.set(ply, *m);
        }

        assert_eq!(pv_table.line(), line);
        assert_eq!(pv_table.get(0), Some(mv("e2e4")));
        assert_eq!(pv_table.get(1), Some(mv("e7e5")));
        assert_eq!(pv_table.get(2), Some(mv("g1f3")));
    }
}
