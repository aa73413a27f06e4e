//! The persisted position cache.
//!
//! Not a within-search transposition table: entries are produced by earlier
//! training sessions, loaded at startup, and only read during normal
//! search. A hit is trusted as an exact score no matter what depth produced
//! it, and nothing is ever evicted.
//!
//! On disk the cache is a JSON document with a `magic` string, a format
//! `version`, an XOR-folded `checksum`, and a map from decimal fingerprint
//! strings to single best-move records. Any defect — wrong magic, unknown
//! version, checksum mismatch, undecodable entry — rejects the whole file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chess::{ChessMove, Color, Piece, ALL_SQUARES};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::moves::TaggedMove;

pub const CACHE_MAGIC: &str = "woodpusher-cache";
pub const CACHE_VERSION: u32 = 1;

/// A decoded record, ready for the search to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedMove {
    pub mv: ChessMove,
    pub side: Color,
    pub piece: Piece,
    pub captured: bool,
    pub eval: i32,
}

impl CachedMove {
    pub fn from_search(tm: &TaggedMove, eval: i32) -> CachedMove {
        CachedMove {
            mv: tm.mv,
            side: tm.side,
            piece: tm.piece,
            captured: tm.captured.is_some(),
            eval,
        }
    }

    pub fn is_quiet(&self) -> bool {
        !self.captured
    }
}

/// One record as serialized: squares as 0-63 indices, pieces and sides as
/// single letters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskEntry {
    from: u8,
    to: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promotion: Option<char>,
    side: char,
    piece: char,
    captured: bool,
    eval: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskCache {
    magic: String,
    version: u32,
    checksum: u64,
    entries: HashMap<String, DiskEntry>,
}

#[derive(Default)]
pub struct PositionCache {
    entries: HashMap<u64, CachedMove>,
}

impl PositionCache {
    pub fn new() -> PositionCache {
        PositionCache {
            entries: HashMap::new(),
        }
    }

    /// Load and fully validate a cache file.
    pub fn load(path: &Path) -> Result<PositionCache, CacheError> {
        let text = fs::read_to_string(path)?;
        let disk: DiskCache = serde_json::from_str(&text)?;

        if disk.magic != CACHE_MAGIC {
            return Err(CacheError::BadMagic(disk.magic));
        }
        if disk.version != CACHE_VERSION {
            return Err(CacheError::BadVersion(disk.version));
        }

        let mut entries = HashMap::with_capacity(disk.entries.len());
        let mut checksum = 0u64;

        for (key, entry) in &disk.entries {
            let fingerprint: u64 = key.parse().map_err(|_| CacheError::BadEntry(key.clone()))?;
            checksum ^= entry_digest(fingerprint, entry.eval);
            entries.insert(fingerprint, decode_entry(key, entry)?);
        }

        if checksum != disk.checksum {
            return Err(CacheError::ChecksumMismatch);
        }

        Ok(PositionCache { entries })
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        let mut checksum = 0u64;

        for (fingerprint, cached) in &self.entries {
            checksum ^= entry_digest(*fingerprint, cached.eval);
            entries.insert(fingerprint.to_string(), encode_entry(cached));
        }

        let disk = DiskCache {
            magic: CACHE_MAGIC.to_string(),
            version: CACHE_VERSION,
            checksum,
            entries,
        };

        fs::write(path, serde_json::to_string_pretty(&disk)?)?;
        Ok(())
    }

    pub fn probe(&self, fingerprint: u64) -> Option<&CachedMove> {
        self.entries.get(&fingerprint)
    }

    /// Insert or overwrite a training result. Entries are never evicted.
    pub fn record(&mut self, fingerprint: u64, entry: CachedMove) {
        self.entries.insert(fingerprint, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_digest(fingerprint: u64, eval: i32) -> u64 {
    fingerprint.rotate_left(17) ^ (eval as i64 as u64)
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

fn piece_from_letter(letter: char) -> Option<Piece> {
    match letter {
        'p' => Some(Piece::Pawn),
        'n' => Some(Piece::Knight),
        'b' => Some(Piece::Bishop),
        'r' => Some(Piece::Rook),
        'q' => Some(Piece::Queen),
        'k' => Some(Piece::King),
        _ => None,
    }
}

fn encode_entry(cached: &CachedMove) -> DiskEntry {
    DiskEntry {
        from: cached.mv.get_source().to_index() as u8,
        to: cached.mv.get_dest().to_index() as u8,
        promotion: cached.mv.get_promotion().map(piece_letter),
        side: match cached.side {
            Color::White => 'w',
            Color::Black => 'b',
        },
        piece: piece_letter(cached.piece),
        captured: cached.captured,
        eval: cached.eval,
    }
}

fn decode_entry(key: &str, entry: &DiskEntry) -> Result<CachedMove, CacheError> {
    let bad = || CacheError::BadEntry(key.to_string());

    let from = ALL_SQUARES
        .get(entry.from as usize)
        .copied()
        .ok_or_else(bad)?;
    let to = ALL_SQUARES.get(entry.to as usize).copied().ok_or_else(bad)?;

    let promotion = match entry.promotion {
        None => None,
        Some(letter) => Some(piece_from_letter(letter).ok_or_else(bad)?),
    };

    let side = match entry.side {
        'w' => Color::White,
        'b' => Color::Black,
        _ => return Err(bad()),
    };

    let piece = piece_from_letter(entry.piece).ok_or_else(bad)?;

    Ok(CachedMove {
        mv: ChessMove::new(from, to, promotion),
        side,
        piece,
        captured: entry.captured,
        eval: entry.eval,
    })
}
