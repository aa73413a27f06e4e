//! Position fingerprinting.
//!
//! A fingerprint covers piece placement, castling rights and the side to
//! move — nothing else. Positions that differ only in their en passant
//! target or move counters share a fingerprint on purpose: the cache treats
//! them as the same position, so consumers must not rely on the hash for
//! full-state identity.

use chess::{Board, Color, Piece};
use lazy_static::lazy_static;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;

// Fixed seed keeps fingerprints identical across runs, which the persisted
// cache depends on.
const KEY_SEED: u64 = 183752091247;

struct Keys {
    pieces: [[u64; 64]; 12],
    // white kingside, white queenside, black kingside, black queenside
    castling: [u64; 4],
    side: [u64; 2],
}

impl Keys {
    fn new() -> Keys {
        let mut prng = ChaCha20Rng::seed_from_u64(KEY_SEED);

        let mut pieces = [[0u64; 64]; 12];
        for table in pieces.iter_mut() {
            for key in table.iter_mut() {
                *key = prng.gen();
            }
        }

        let mut castling = [0u64; 4];
        for key in castling.iter_mut() {
            *key = prng.gen();
        }

        let side = [prng.gen(), prng.gen()];

        Keys {
            pieces,
            castling,
            side,
        }
    }
}

lazy_static! {
    static ref KEYS: Keys = Keys::new();
}

fn piece_index(colour: Color, piece: Piece) -> usize {
    colour.to_index() * 6 + piece.to_index()
}

pub fn fingerprint(board: &Board) -> u64 {
    let mut hash = 0u64;

    for sq in *board.combined() {
        let (Some(piece), Some(colour)) = (board.piece_on(sq), board.color_on(sq)) else {
            continue;
        };
        hash ^= KEYS.pieces[piece_index(colour, piece)][sq.to_index()];
    }

    let white = board.castle_rights(Color::White);
    if white.has_kingside() {
        hash ^= KEYS.castling[0];
    }
    if white.has_queenside() {
        hash ^= KEYS.castling[1];
    }

    let black = board.castle_rights(Color::Black);
    if black.has_kingside() {
        hash ^= KEYS.castling[2];
    }
    if black.has_queenside() {
        hash ^= KEYS.castling[3];
    }

    hash ^= KEYS.side[board.side_to_move().to_index()];

    hash
}

#[cfg(test)]
use std::str::FromStr;

#[test]
fn identical_positions_hash_identically() {
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    let a = Board::from_str(fen).unwrap();
    let b = Board::from_str(fen).unwrap();

    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn side_to_move_changes_the_fingerprint() {
    let white = Board::from_str("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let black = Board::from_str("4k3/8/8/8/8/8/8/4K2R b K - 0 1").unwrap();

    assert_ne!(fingerprint(&white), fingerprint(&black));
}

#[test]
fn castling_rights_change_the_fingerprint() {
    let all = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let some = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w Kkq - 0 1").unwrap();

    assert_ne!(fingerprint(&all), fingerprint(&some));
}

#[test]
fn move_counters_do_not_change_the_fingerprint() {
    let a = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let b = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 40 60").unwrap();

    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn en_passant_only_differences_collide() {
    // Same placement, rights and side; only the en passant field differs.
    let with_ep =
        Board::from_str("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3").unwrap();
    let without_ep =
        Board::from_str("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 3").unwrap();

    assert_eq!(fingerprint(&with_ep), fingerprint(&without_ep));
}
