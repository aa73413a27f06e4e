use std::env::args;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use chess::{Board, File, Rank, Square};
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use woodpusher::cache::{CachedMove, PositionCache};
use woodpusher::error::PositionError;
use woodpusher::moves::TaggedMove;
use woodpusher::searcher::{SearchMode, Searcher};
use woodpusher::zobrist;

struct Options {
    depth: u32,
    debug: bool,
    train: bool,
    cache_path: PathBuf,
}

fn parse_args() -> Result<Options, String> {
    let mut opts = Options {
        depth: 4,
        debug: false,
        train: false,
        cache_path: PathBuf::from("position_cache.json"),
    };

    let mut iter = args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" => opts.debug = true,
            "--train" => opts.train = true,
            "--depth" => {
                let value = iter.next().ok_or("--depth needs a value")?;
                opts.depth = value
                    .parse()
                    .map_err(|_| format!("invalid depth {value:?}"))?;
            }
            "--cache" => {
                opts.cache_path = PathBuf::from(iter.next().ok_or("--cache needs a path")?);
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }

    Ok(opts)
}

fn render(board: &Board) -> String {
    let mut out = String::new();

    for rank in (0..8).rev() {
        out.push_str(&format!("{} ", rank + 1));
        for file in 0..8 {
            let sq = Square::make_square(Rank::from_index(rank), File::from_index(file));
            match (board.piece_on(sq), board.color_on(sq)) {
                (Some(piece), Some(colour)) => out.push_str(&piece.to_string(colour)),
                _ => out.push('.'),
            }
            out.push(' ');
        }
        out.push('\n');
    }
    out.push_str("  a b c d e f g h");

    out
}

fn load_cache(path: &PathBuf) -> PositionCache {
    if !path.exists() {
        return PositionCache::new();
    }

    match PositionCache::load(path) {
        Ok(cache) => {
            info!(target: "cache", "loaded {} cached positions", cache.len());
            cache
        }
        Err(err) => {
            warn!(target: "cache", "ignoring cache file: {err}");
            PositionCache::new()
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let opts = parse_args()?;

    let level = if opts.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let mode = if opts.train {
        SearchMode::Record
    } else {
        SearchMode::Evaluate
    };

    let mut cache = load_cache(&opts.cache_path);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Enter FEN value: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let fen = line?;
        let fen = fen.trim();
        if fen.is_empty() {
            break;
        }

        let board = Board::from_str(fen).map_err(|e| PositionError::Parse(e.to_string()))?;

        println!("{}", render(&board));

        let mut searcher = Searcher::new(&cache, mode);
        let report = searcher.search(&board, opts.depth)?;

        match report.best_move {
            Some(best) => println!("best move: {best}"),
            None if board.checkers().popcnt() > 0 => println!("no legal move: checkmate"),
            None => println!("no legal move: stalemate"),
        }

        if opts.debug {
            println!("nodes searched: {}", report.nodes);
            println!("evaluation: {}", report.score);
            let pv_line = report
                .pv
                .iter()
                .fold(String::new(), |acc, m| format!("{acc}{m} "));
            println!("pv: {}", pv_line.trim_end());
        }

        // training results only reach disk alongside the debug flag
        if let (true, true, Some(best)) = (opts.debug, opts.train, report.best_move) {
            let tagged = TaggedMove::new(&board, best);
            cache.record(
                zobrist::fingerprint(&board),
                CachedMove::from_search(&tagged, report.score),
            );
            cache.save(&opts.cache_path)?;
            info!(target: "cache", "recorded {} positions to {}", cache.len(), opts.cache_path.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[test]
fn render_shows_both_sides() {
    let board = Board::default();
    let picture = render(&board);

    assert!(picture.contains('K'));
    assert!(picture.contains('k'));
    assert!(picture.starts_with("8 r n b q k b n r"));
    assert!(picture.ends_with("  a b c d e f g h"));
}

#[test]
fn piece_letters_follow_color() {
    let board = Board::from_str("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let picture = render(&board);

    assert!(picture.contains('R'));
    assert!(!picture.contains('r'));
    assert!(picture.contains('k'));
}
