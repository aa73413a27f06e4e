//! Move ordering.
//!
//! Priorities, highest first: the principal-variation move, quiet moves
//! backed by the killer/countermove/history tables, then captures by
//! MVV-LVA. Captures never receive quiet bonuses and vice versa.

use chess::ChessMove;

use crate::heuristics::{CounterMoves, HistoryTable, KillerMoves};
use crate::moves::TaggedMove;

pub const PV_MOVE_SCORE: i32 = 20_000;
pub const KILLER_PRIMARY_SCORE: i32 = 9_000;
pub const KILLER_SECONDARY_SCORE: i32 = 8_000;
pub const COUNTER_MOVE_SCORE: i32 = 9_000;

/// MVV-LVA, indexed `[attacker][victim]` with pieces ordered
/// pawn/knight/bishop/rook/queen/king. Bigger victims dominate; cheaper
/// attackers break the tie.
pub const MVV_LVA: [[i32; 6]; 6] = [
    [105, 205, 305, 405, 505, 605],
    [104, 204, 304, 404, 504, 604],
    [103, 203, 303, 403, 503, 603],
    [102, 202, 302, 402, 502, 602],
    [101, 201, 301, 401, 501, 601],
    [100, 200, 300, 400, 500, 600],
];

/// Read-only view of the heuristic state one ordering pass needs.
pub struct OrderingContext<'a> {
    pub killers: &'a KillerMoves,
    pub history: &'a HistoryTable,
    pub counters: &'a CounterMoves,
    pub ply: usize,
    /// The move that led to this node, if any.
    pub prev: Option<ChessMove>,
    /// The recorded principal-variation move for this ply, when the search
    /// is still following the line from the previous iteration.
    pub pv_move: Option<ChessMove>,
}

pub fn score_move(tm: &TaggedMove, ctx: &OrderingContext) -> i32 {
    if let Some(victim) = tm.captured {
        return MVV_LVA[tm.piece.to_index()][victim.to_index()];
    }

    let mut score = 0;

    if ctx.killers.primary(ctx.ply) == Some(tm.mv) {
        score += KILLER_PRIMARY_SCORE;
    } else if ctx.killers.secondary(ctx.ply) == Some(tm.mv) {
        score += KILLER_SECONDARY_SCORE;
    }

    // additive with a killer bonus; a move can be both
    if let Some(prev) = ctx.prev {
        if ctx.counters.get(prev) == Some(tm.mv) {
            score += COUNTER_MOVE_SCORE;
        }
    }

    score + ctx.history.get(tm.side, tm.piece, tm.mv.get_dest())
}

/// Sort `moves` by descending priority. At most one move — the first one
/// matching `ctx.pv_move` — takes the PV score. The sort is stable, so
/// equal priorities keep the oracle's generation order.
pub fn order_moves(moves: Vec<TaggedMove>, ctx: &OrderingContext) -> Vec<TaggedMove> {
    let mut pv_pending = ctx.pv_move;

    let mut scored: Vec<(TaggedMove, i32)> = moves
        .into_iter()
        .map(|tm| {
            if pv_pending == Some(tm.mv) {
                pv_pending = None;
                (tm, PV_MOVE_SCORE)
            } else {
                (tm, score_move(&tm, ctx))
            }
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored.into_iter().map(|(tm, _)| tm).collect()
}
