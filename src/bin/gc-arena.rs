use gc_arena::gc::SLOT_SIZE;
use gc_arena::logging::{init_dev_logging, init_logging, LogConfig};
use gc_arena::{ArenaError, ArenaId, ArenaStats, Config, Runtime};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

/// Pixel size of one grid cell
const CELL_SIZE: usize = 48;
/// Cells visible at once along each axis
const SCREEN_CELLS: usize = 16;
/// Label bytes reserved per cell
const LABEL_BYTES: usize = 32;

#[derive(Debug)]
struct Options {
    dim: usize,
    frames: usize,
    config: Option<PathBuf>,
    json: bool,
    verbose: bool,
}

impl Options {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let prog = args.first().map(String::as_str).unwrap_or("gc-arena");

        let mut options = Self {
            dim: 128,
            frames: 60,
            config: None,
            json: false,
            verbose: false,
        };

        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(Self::usage(prog)),
                "--json" => options.json = true,
                "--verbose" | "-v" => options.verbose = true,
                "--dim" => options.dim = Self::number(arg, iter.next())?,
                "--frames" => options.frames = Self::number(arg, iter.next())?,
                "--config" => {
                    let path = iter.next().ok_or_else(|| format!("{} expects a path", arg))?;
                    options.config = Some(PathBuf::from(path));
                }
                opt => return Err(format!("Unknown option: {}\n\n{}", opt, Self::usage(prog))),
            }
        }

        if options.dim < SCREEN_CELLS {
            return Err(format!("--dim must be at least {}", SCREEN_CELLS));
        }
        if level_size(options.dim).is_none() {
            return Err(format!("--dim {} is too large\n\n{}", options.dim, Self::usage(prog)));
        }
        Ok(options)
    }

    fn number(flag: &str, value: Option<&String>) -> Result<usize, String> {
        value
            .ok_or_else(|| format!("{} expects a number", flag))?
            .parse()
            .map_err(|e| format!("invalid value for {}: {}", flag, e))
    }

    fn usage(prog: &str) -> String {
        format!(
            "gc-arena - region allocation demo\n\n\
            Builds a grid level inside a long-lived arena, then renders frames\n\
            from a scratch arena that is reset every frame.\n\n\
            USAGE:\n    {} [OPTIONS]\n\n\
            OPTIONS:\n    \
            -h, --help         Print help information\n    \
            --dim <N>          Grid cells per side (default 128)\n    \
            --frames <N>       Frames to render (default 60)\n    \
            --config <PATH>    Load settings from a TOML file\n    \
            --json             Print the report as JSON\n    \
            -v, --verbose      Debug logging to stderr, ignoring [logging]\n\n\
            EXAMPLES:\n    \
            {} --dim 256 --frames 120\n    \
            {} --config gc-arena.toml --json",
            prog, prog, prog
        )
    }
}

/// One drawable cell: a solid and a label, each a host object
struct Cell {
    x: usize,
    y: usize,
    label: *mut u8,
    label_len: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    dim: usize,
    frames: usize,
    build_ms: f64,
    avg_frame_ms: f64,
    max_frame_ms: f64,
    level: ArenaStats,
    scratch: ArenaStats,
}

/// Append `text` to a growable arena string
unsafe fn push_str(rt: &mut Runtime, buf: *mut u8, len: usize, text: &[u8]) -> Result<*mut u8, ArenaError> {
    let grown = rt.realloc(buf, len + text.len());
    if grown.is_null() {
        return Err(ArenaError::OutOfMemory { requested: len + text.len() });
    }
    grown.add(len).copy_from_nonoverlapping(text.as_ptr(), text.len());
    Ok(grown)
}

/// Cells, objects and storage bytes for a `dim` x `dim` level
fn level_size(dim: usize) -> Option<(usize, usize, usize)> {
    let cells = dim.checked_mul(dim)?;
    let objects = cells.checked_mul(2)?;
    let storage = cells.checked_mul(LABEL_BYTES)?;
    // The object slots are carved from the same initial page.
    let _page = objects.checked_mul(SLOT_SIZE)?.checked_add(storage)?;
    Some((cells, objects, storage))
}

fn build_level(rt: &mut Runtime, dim: usize) -> Result<(ArenaId, Vec<Cell>), ArenaError> {
    let (cells, objects, storage) =
        level_size(dim).ok_or(ArenaError::OutOfMemory { requested: usize::MAX })?;
    let level = rt.allocate(objects, storage)?;

    let grid = rt.eval(level, |rt| -> Result<Vec<Cell>, ArenaError> {
        let mut grid = Vec::with_capacity(cells);
        for x in 0..dim {
            for y in 0..dim {
                rt.new_object()?;
                rt.new_object()?;

                // Built piecewise so the label grows in place.
                let mut label = rt.malloc(1);
                let mut len = 0;
                for part in [format!("({}", x), format!(", {})", y)] {
                    label = unsafe { push_str(rt, label, len, part.as_bytes())? };
                    len += part.len();
                }
                grid.push(Cell { x, y, label, label_len: len });
            }
        }
        Ok(grid)
    })??;

    info!(cells, "level built");
    Ok((level, grid))
}

fn render_frame(rt: &mut Runtime, scratch: ArenaId, grid: &[Cell], dim: usize, frame: usize) -> Result<usize, ArenaError> {
    let origin = frame % (dim - SCREEN_CELLS + 1);

    let drawn = rt.eval(scratch, |rt| -> Result<usize, ArenaError> {
        let mut drawn = 0;
        for column in grid.chunks(dim).skip(origin).take(SCREEN_CELLS) {
            for cell in column.iter().skip(origin).take(SCREEN_CELLS) {
                // Shifted copy of the cell's primitives, discarded at reset.
                rt.new_object()?;
                rt.new_object()?;
                let rect = rt.malloc(4 * core::mem::size_of::<usize>()) as *mut usize;
                if rect.is_null() {
                    return Err(ArenaError::OutOfMemory { requested: 32 });
                }
                let label = rt.malloc(cell.label_len);
                unsafe {
                    rect.copy_from_nonoverlapping(
                        [cell.x * CELL_SIZE, cell.y * CELL_SIZE, CELL_SIZE, CELL_SIZE].as_ptr(),
                        4,
                    );
                    if !label.is_null() {
                        label.copy_from_nonoverlapping(cell.label, cell.label_len);
                    }
                }
                drawn += 1;
            }
        }
        Ok(drawn)
    })??;

    Ok(drawn)
}

fn run(options: &Options, config: Config) -> Result<Report, ArenaError> {
    let mut rt = Runtime::new(config);

    let start = Instant::now();
    let (level, grid) = build_level(&mut rt, options.dim)?;
    let build_ms = start.elapsed().as_secs_f64() * 1000.0;

    let visible = SCREEN_CELLS * SCREEN_CELLS;
    let scratch = rt.allocate(visible * 2, visible * 64)?;

    let mut total_ms = 0.0;
    let mut max_frame_ms: f64 = 0.0;
    let mut scratch_stats = rt.stats(scratch)?;
    for frame in 0..options.frames {
        let frame_start = Instant::now();
        let drawn = render_frame(&mut rt, scratch, &grid, options.dim, frame)?;
        scratch_stats = rt.stats(scratch)?;
        rt.reset(scratch)?;

        let frame_ms = frame_start.elapsed().as_secs_f64() * 1000.0;
        total_ms += frame_ms;
        max_frame_ms = max_frame_ms.max(frame_ms);
        debug!(frame, drawn, frame_ms, "frame rendered");
    }

    let report = Report {
        dim: options.dim,
        frames: options.frames,
        build_ms,
        avg_frame_ms: if options.frames == 0 { 0.0 } else { total_ms / options.frames as f64 },
        max_frame_ms,
        level: rt.stats(level)?,
        scratch: scratch_stats,
    };

    rt.release(scratch)?;
    rt.release(level)?;
    Ok(report)
}

fn print_stats(name: &str, stats: &ArenaStats) {
    println!("{}:", name);
    println!("  pages:         {}", stats.pages);
    println!("  objects:       {} live / {} free / {} total", stats.live_objects, stats.free_objects, stats.total_objects);
    println!("  storage:       {} used / {} free / {} total bytes", stats.used_storage, stats.free_storage, stats.total_storage);
}

fn main() {
    let options = match Options::from_args() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => Config::load(path),
        None => Ok(Config::discover()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let _guard = if options.verbose {
        init_dev_logging()
    } else {
        let log_config = config.logging.to_log_config().unwrap_or_else(|e| {
            eprintln!("{}; using default logging", e);
            LogConfig::default()
        });
        init_logging(log_config)
    };

    info!(dim = options.dim, frames = options.frames, "gc-arena demo starting");

    let report = match run(&options, config) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "demo failed");
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if options.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("failed to serialize report: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("grid {}x{}, {} frames", report.dim, report.dim, report.frames);
    println!("  build:         {:.2}ms", report.build_ms);
    println!("  frame:         {:.3}ms avg / {:.3}ms max", report.avg_frame_ms, report.max_frame_ms);
    print_stats("level arena", &report.level);
    print_stats("scratch arena (last frame)", &report.scratch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_size_scales_with_dim() {
        assert_eq!(level_size(16), Some((256, 512, 256 * LABEL_BYTES)));
    }

    #[test]
    fn level_size_rejects_overflowing_dims() {
        assert_eq!(level_size(usize::MAX), None);
        assert_eq!(level_size(1 << (usize::BITS / 2)), None);
        // cells fits but the slot bytes do not
        let dim = ((usize::MAX / (2 * SLOT_SIZE)) as f64).sqrt() as usize + 2;
        assert!(dim.checked_mul(dim).is_some());
        assert_eq!(level_size(dim), None);
    }

    #[test]
    fn build_level_reports_overflow_as_out_of_memory() {
        let mut rt = Runtime::new(Config::default());
        assert!(matches!(
            build_level(&mut rt, usize::MAX),
            Err(ArenaError::OutOfMemory { .. })
        ));
    }
}
