use clap::{value_parser, Arg, ArgAction, Command as ClapCommand};
use log::{error, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use orthotiler::commands::{CommandFactory, OrthotilerCommandFactory};
use orthotiler::utils::logger::Logger;

/// Run log written into the output folder unless `--run-log` is given
const RUN_LOG_NAME: &str = "orthotiler-run.log";

fn cli() -> ClapCommand {
    ClapCommand::new("orthotiler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cut a georeferenced orthomosaic into masked tiles and build a tile pyramid")
        .arg(
            Arg::new("source")
                .help("Source raster (GeoTIFF or VRT)")
                .required_unless_present("inventory")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .help("Output folder")
                .required_unless_present("inventory")
                .index(2),
        )
        .arg(
            Arg::new("window")
                .help("Level-0 tile rectangle: startColumn startRow widthInTiles heightInTiles (default 0 0 32 32)")
                .value_names(["START_COLUMN", "START_ROW", "WIDTH", "HEIGHT"])
                .num_args(1..=4)
                .value_parser(value_parser!(u32))
                .index(3),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("TOML configuration file with [tiler] and [gdal] tables")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("levels")
                .long("levels")
                .help("Number of pyramid levels above the base tiles")
                .value_name("N")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("tile-size")
                .long("tile-size")
                .help("Side length of a base tile in pixels")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("workers")
                .short('j')
                .long("workers")
                .help("Tiles or blocks processed concurrently")
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("digits")
                .long("digits")
                .help("Zero-pad width of row and column numbers in tile names")
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("delete-original")
                .long("delete-original")
                .help("Delete the unmasked crop instead of keeping it as <tile>_old.tif")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("abort-on-failure")
                .long("abort-on-failure")
                .help("Stop the run after the first failed tile or block")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-skip-existing")
                .long("no-skip-existing")
                .help("Rebuild tiles even when complete outputs exist")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("full-grid")
                .long("full-grid")
                .help("Tile the whole source raster, ignoring the window")
                .action(ArgAction::SetTrue)
                .conflicts_with("window"),
        )
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .help("Count the tiles of an output folder and exit")
                .value_name("FOLDER")
                .conflicts_with_all(["source", "output", "window"]),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Write every log record to this file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("run-log")
                .long("run-log")
                .help("File receiving the per-level summary and failed commands")
                .value_name("FILE"),
        )
}

/// Run log of a tiling run, appended to across invocations
fn open_run_log(matches: &clap::ArgMatches) -> std::io::Result<Logger> {
    let output = match matches.get_one::<String>("output") {
        Some(output) => output,
        None => return Ok(Logger::console_only(LevelFilter::Off)),
    };

    let path = match matches.get_one::<String>("run-log") {
        Some(path) => PathBuf::from(path),
        None => {
            fs::create_dir_all(output)?;
            Path::new(output).join(RUN_LOG_NAME)
        }
    };
    Logger::append(&path)
}

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = matches.get_one::<String>("log-file").map(PathBuf::from);
    if let Err(e) = Logger::init_global_logger(log_file.as_deref(), level) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let run_log = match open_run_log(&matches) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error opening run log: {}", e);
            process::exit(1);
        }
    };

    let factory = OrthotilerCommandFactory::new();

    let command_result = factory.create_command(&matches, &run_log);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
